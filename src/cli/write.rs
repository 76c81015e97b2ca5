//! `ng write` command
//!
//! Creates a note, or replaces one with `--replace`.
//!
//! # Usage
//! ```bash
//! ng write -e "Coffee Brewing" "- [method] Pour over #coffee\n- pairs_with [[Croissant]]"
//! ng write "Coffee Brewing" --file brewing.md --folder food
//! ng write "Coffee Brewing" --tags coffee,morning --type guide
//! cat updated.md | ng write "Coffee Brewing" --replace food/coffee-brewing
//! ```

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::io::Read;
use std::path::PathBuf;

use super::utils::{open_graph, print_json, split_list};
use crate::config::Config;
use crate::core::graph::{NoteInput, WriteOutcome};

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Note title
    pub title: String,

    /// Note body (Markdown). Read from stdin when omitted and no --file is given
    pub content: Option<String>,

    /// Interpret `\n` in the content argument as a newline; the body is taken verbatim otherwise
    #[arg(short, long)]
    pub escapes: bool,

    /// Read the body from a file
    #[arg(long, conflicts_with = "content")]
    pub file: Option<PathBuf>,

    /// Folder for a new note (default from config)
    #[arg(long)]
    pub folder: Option<String>,

    /// Tags (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub tags: Option<Vec<String>>,

    /// Entity type
    #[arg(long = "type")]
    pub entity_type: Option<String>,

    /// Replace the note with this title, permalink or path
    #[arg(short, long)]
    pub replace: Option<String>,

    /// Output format (pretty, json)
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

fn content_argument(text: &str, escapes: bool) -> String {
    if escapes {
        text.replace("\\n", "\n")
    } else {
        text.to_string()
    }
}

pub fn run(args: WriteArgs, config: &Config) -> Result<()> {
    let content = match (&args.content, &args.file) {
        (Some(text), _) => content_argument(text, args.escapes),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read note body from stdin")?;
            buffer
        }
    };

    let mut input = NoteInput::new(args.title, content);
    if let Some(folder) = args.folder {
        input = input.in_folder(folder);
    }
    if let Some(tags) = args.tags {
        input = input.with_tags(split_list(&tags));
    }
    if let Some(entity_type) = args.entity_type {
        input = input.with_type(entity_type);
    }
    if let Some(identifier) = args.replace {
        input = input.replacing(identifier);
    }

    let graph = open_graph(config)?;
    let outcome = graph.write(input)?;

    match args.format.as_str() {
        "json" => print_json(&outcome)?,
        _ => print_pretty(&outcome),
    }

    Ok(())
}

fn print_pretty(outcome: &WriteOutcome) {
    let verb = if outcome.created { "Created" } else { "Updated" };
    println!("✅ {} {}", verb, outcome.permalink.green().bold());
    println!("   File: {}", outcome.file_path);
    println!("   ID: {}", outcome.id.to_string().dimmed());

    let resolved = outcome.relations.iter().filter(|r| r.target.is_resolved()).count();
    println!(
        "   {} observation(s), {} relation(s) ({} resolved, {} pending)",
        outcome.observations.len(),
        outcome.relations.len(),
        resolved,
        outcome.relations.len() - resolved
    );

    for warning in &outcome.warnings {
        println!(
            "   {} line {}: {:?} {}",
            "⚠".yellow(),
            warning.line,
            warning.kind,
            warning.text.dimmed()
        );
    }
}
