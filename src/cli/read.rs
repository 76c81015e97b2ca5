//! `ng read` command
//!
//! Prints a note by title, permalink, `memory://` URL or file path.
//!
//! # Usage
//! ```bash
//! ng read "Coffee Brewing"
//! ng read food/coffee-brewing
//! ng read memory://food/coffee-brewing --format entity
//! ng read "Coffee Brewing" --backlinks
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::utils::{open_graph, print_json};
use crate::config::Config;
use crate::core::entity::Entity;

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Title, permalink, memory:// URL or file path
    pub identifier: String,

    /// Output format (raw, pretty, json)
    #[arg(short, long, default_value = "raw")]
    pub format: String,

    /// Also list notes linking here
    #[arg(short, long)]
    pub backlinks: bool,
}

pub fn run(args: ReadArgs, config: &Config) -> Result<()> {
    let graph = open_graph(config)?;

    match args.format.as_str() {
        "json" => {
            let entity = graph.get(&args.identifier)?;
            if args.backlinks {
                let backlinks = graph.backlinks(&args.identifier)?;
                print_json(&serde_json::json!({ "entity": entity, "backlinks": backlinks }))?;
            } else {
                print_json(&entity)?;
            }
            return Ok(());
        }
        "pretty" => print_pretty(&graph.get(&args.identifier)?),
        _ => print!("{}", graph.read(&args.identifier)?),
    }

    if args.backlinks {
        let backlinks = graph.backlinks(&args.identifier)?;
        println!("\n{} ({})", "Backlinks".cyan().bold(), backlinks.len());
        for summary in backlinks {
            println!("  ← {} {}", summary.title, summary.permalink.dimmed());
        }
    }

    Ok(())
}

fn print_pretty(entity: &Entity) {
    println!("{}", entity.title.cyan().bold());
    println!("   Permalink: {}", entity.permalink);
    println!("   Type: {}", entity.entity_type);
    println!("   File: {}", entity.file_path);
    if !entity.tags.is_empty() {
        println!("   Tags: {}", entity.tags.join(", "));
    }
    println!(
        "   Updated: {}",
        entity.updated_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
    );

    if !entity.observations.is_empty() {
        println!("\n{}", "Observations".bold());
        for observation in &entity.observations {
            println!("  • {}", observation);
        }
    }

    if !entity.relations.is_empty() {
        println!("\n{}", "Relations".bold());
        for relation in &entity.relations {
            let marker = if relation.target.is_resolved() {
                "→".green()
            } else {
                "…".yellow()
            };
            println!("  {} {}", marker, relation);
        }
    }
}
