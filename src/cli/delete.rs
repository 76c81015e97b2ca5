//! `ng delete` command
//!
//! Deletes a note and its file. Relations pointing at it become pending again.
//!
//! # Usage
//! ```bash
//! ng delete "Coffee Brewing"
//! ng delete food/coffee-brewing
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::utils::{open_graph, print_json};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Title, permalink, memory:// URL or file path
    pub identifier: String,

    /// Output format (pretty, json)
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

pub fn run(args: DeleteArgs, config: &Config) -> Result<()> {
    let graph = open_graph(config)?;
    let removed = graph.delete(&args.identifier)?;

    match args.format.as_str() {
        "json" => print_json(&removed)?,
        _ => {
            println!("🗑  Deleted {}", removed.permalink.red());
            println!("   File: {}", removed.file_path.dimmed());
        }
    }

    Ok(())
}
