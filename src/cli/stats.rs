//! Stats command - Show knowledge-base statistics

use clap::Args;

use super::utils::{open_graph, print_json};
use crate::config::Config;

/// Stats command arguments
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute stats command
pub fn execute(args: StatsArgs, config: &Config) -> anyhow::Result<()> {
    let graph = open_graph(config)?;
    let stats = graph.stats()?;

    if args.json {
        return print_json(&stats);
    }

    println!("📊 Knowledge Base Statistics\n");
    println!("  Notes:          {}", stats.entities);
    println!("  Observations:   {}", stats.observations);
    println!("  Relations:      {}", stats.relations);
    println!(
        "  ├── Resolved:   {} ({}%)",
        stats.resolved,
        percent(stats.resolved, stats.relations)
    );
    println!(
        "  └── Pending:    {} ({}%)",
        stats.relations - stats.resolved,
        percent(stats.relations - stats.resolved, stats.relations)
    );
    println!("  Indexed:        {}", stats.documents);

    if !stats.by_type.is_empty() {
        println!("\n📂 By type:");
        for (entity_type, count) in &stats.by_type {
            println!("  {} ({} notes)", entity_type, count);
        }
    }

    println!("\n📁 Root: {}", config.kb_root()?.display());

    Ok(())
}

fn percent(part: usize, total: usize) -> usize {
    if total > 0 {
        part * 100 / total
    } else {
        0
    }
}
