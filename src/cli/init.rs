//! `ng init` command
//!
//! Initializes a knowledge base.
//!
//! # Usage
//! ```bash
//! ng init                    # Initialize in current directory
//! ng init ~/notes            # Initialize in specific path
//! ng init --folder notes     # Default folder for new notes
//! ng init --persist-index    # Keep the search index on disk
//! ```

use anyhow::{bail, Result};
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Config, CONFIG_FILE, STATE_DIR};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path to initialize (default: current directory)
    pub path: Option<PathBuf>,

    /// Default folder for new notes
    #[arg(long)]
    pub folder: Option<String>,

    /// Store the search index in .notegraph/search.db
    #[arg(long)]
    pub persist_index: bool,

    /// Force re-initialization
    #[arg(short, long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let base_path = args.path.unwrap_or_else(|| PathBuf::from("."));
    let state_dir = base_path.join(STATE_DIR);

    if is_initialized(&base_path) && !args.force {
        bail!(
            "Directory {} is already a knowledge base. Use --force to reinitialize.",
            base_path.display()
        );
    }

    println!("🚀 Initializing notegraph in: {}", base_path.display());

    fs::create_dir_all(&state_dir)?;

    let mut config = Config::default();
    if let Some(folder) = args.folder {
        config.kb.default_folder = folder;
    }
    if args.persist_index {
        config.search.database = Some(PathBuf::from(STATE_DIR).join("search.db"));
    }
    let config_path = state_dir.join(CONFIG_FILE);
    config.save_to(&config_path)?;

    println!("\n✅ Initialized knowledge base");
    println!("   Config: {}", config_path.display());
    if let Some(db) = config.search_db(&base_path) {
        println!("   Search index: {}", db.display());
    }
    println!("\nNext steps:");
    println!("  ng write \"My First Note\" \"- [idea] Notes link with [[Other Note]]\"");
    println!("  ng search \"idea\"");
    println!("  ng ls");

    Ok(())
}

fn is_initialized(path: &Path) -> bool {
    path.join(STATE_DIR).join(CONFIG_FILE).exists()
}
