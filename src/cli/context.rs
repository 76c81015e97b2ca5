//! `ng context` command
//!
//! Shows the notes reachable from a note by following its relations.
//!
//! # Usage
//! ```bash
//! ng context "Coffee Brewing"             # Direct relations
//! ng context food/coffee-brewing -d 3     # Up to three hops
//! ng context "Coffee Brewing" --format json
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::utils::{open_graph, print_json};
use crate::config::Config;
use crate::core::context::ContextEntry;

#[derive(Args, Debug)]
pub struct ContextArgs {
    /// Start note: title, permalink, memory:// URL or file path
    pub identifier: String,

    /// Maximum hops (default from config, capped by context.max_depth)
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Output format (pretty, json)
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

pub fn run(args: ContextArgs, config: &Config) -> Result<()> {
    let graph = open_graph(config)?;
    let depth = args.depth.unwrap_or(config.context.default_depth);
    let entries = graph.build_context(&args.identifier, depth)?;

    match args.format.as_str() {
        "json" => print_json(&entries)?,
        _ => print_pretty(&entries),
    }

    Ok(())
}

fn print_pretty(entries: &[ContextEntry]) {
    for entry in entries {
        let indent = "  ".repeat(entry.depth);
        match &entry.via {
            None => println!(
                "📂 {} {}",
                entry.entity.title.cyan().bold(),
                entry.entity.permalink.dimmed()
            ),
            Some(via) => println!(
                "{}└─ {} {} {}",
                indent,
                via.relation_type.yellow(),
                entry.entity.title.bold(),
                entry.entity.permalink.dimmed()
            ),
        }
    }

    let reached = entries.len().saturating_sub(1);
    println!("\n{} related note(s)", reached);
}
