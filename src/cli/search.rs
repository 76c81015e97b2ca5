//! `ng search` command
//!
//! Full-text search over titles, bodies, tags and observations.
//!
//! # Usage
//! ```bash
//! ng search "coffee"
//! ng search "pour over" --path food
//! ng search "auth" --type spec,decision --limit 5
//! ng search "coffee" --format json
//! ```
//!
//! # Architecture
//! - SQLite FTS5 with BM25 ranking
//! - Hits reflect the latest committed write

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::utils::{open_graph, print_json, split_list};
use crate::config::Config;
use crate::core::search::{SearchHit, SearchQuery};

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query (FTS5 syntax)
    pub query: String,

    /// Filter by permalink prefix
    #[arg(short, long)]
    pub path: Option<String>,

    /// Filter by entity type (comma-separated)
    #[arg(short = 't', long = "type", value_delimiter = ',')]
    pub entity_types: Option<Vec<String>>,

    /// Maximum results (default from config)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output format (pretty, json, compact)
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

pub fn run(args: SearchArgs, config: &Config) -> Result<()> {
    let graph = open_graph(config)?;

    let mut query = SearchQuery::new(&args.query)
        .with_limit(args.limit.unwrap_or(config.search.default_limit));
    if let Some(prefix) = args.path {
        query = query.with_path(prefix);
    }
    if let Some(types) = args.entity_types {
        query = query.with_types(split_list(&types));
    }

    let hits = graph.search(&query)?;

    match args.format.as_str() {
        "json" => print_json(&hits)?,
        "compact" => print_compact(&hits),
        _ => print_pretty(&hits),
    }

    Ok(())
}

fn print_pretty(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results found.");
        return;
    }

    println!("\n📚 Found {} result(s):\n", hits.len());

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. {} {}",
            i + 1,
            hit.title.cyan().bold(),
            format!("[{}]", hit.entity_type).dimmed()
        );
        println!("   {}", hit.permalink.green());
        if !hit.excerpt.is_empty() {
            println!("   {}", hit.excerpt);
        }
        println!("   score: {:.3}\n", hit.score);
    }
}

fn print_compact(hits: &[SearchHit]) {
    for hit in hits {
        println!("{}\t{}", hit.permalink, hit.title);
    }
}
