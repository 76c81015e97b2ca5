//! `ng rebuild` command
//!
//! Rebuilds entities, links and the search index from the Markdown files.
//! Missing or outdated frontmatter is completed in place.
//!
//! # Usage
//! ```bash
//! ng rebuild
//! ng rebuild --verify
//! ng rebuild --format json
//! ```

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use super::utils::{print_json, unloaded_graph};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct RebuildArgs {
    /// Check store, links and search agree afterwards
    #[arg(long)]
    pub verify: bool,

    /// Output format (pretty, json)
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

pub fn run(args: RebuildArgs, config: &Config) -> Result<()> {
    let graph = unloaded_graph(config)?;
    let report = graph.rebuild_index()?;
    let problems = if args.verify { graph.verify()? } else { Vec::new() };

    if args.format == "json" {
        print_json(&serde_json::json!({ "report": report, "problems": problems }))?;
    } else {
        println!("✅ Rebuilt knowledge base\n");
        println!("  Files:       {}", report.files);
        println!("  Entities:    {}", report.entities);
        println!("  Links:       {}", report.edges);
        println!("  Pending:     {}", report.pending);
        println!("  Rewritten:   {}", report.rewritten);
        if report.warnings > 0 {
            println!("  Warnings:    {}", report.warnings.to_string().yellow());
        }
        if args.verify && problems.is_empty() {
            println!("\n{}", "Consistency check passed".green());
        }
        for problem in &problems {
            println!("  {} {}", "✗".red(), problem);
        }
    }

    if !problems.is_empty() {
        bail!("{} consistency problem(s) found", problems.len());
    }
    Ok(())
}
