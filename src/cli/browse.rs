//! `ng ls` and `ng tree` commands
//!
//! Browse the note folders.
//!
//! # Usage
//! ```bash
//! ng ls                   # Notes in the root folder
//! ng ls food              # Notes in food/
//! ng ls food --depth 2    # Include one level of subfolders
//!
//! ng tree                 # Folder tree
//! ng tree food --depth 2  # Subtree, limited depth
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::collections::BTreeMap;

use super::utils::{open_graph, print_json};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct LsArgs {
    /// Folder to list (default: root)
    #[arg(default_value = "")]
    pub path: String,

    /// Depth of listing (1 = direct children only)
    #[arg(short, long, default_value = "1")]
    pub depth: usize,

    /// Output format (pretty, json)
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

pub fn run_ls(args: LsArgs, config: &Config) -> Result<()> {
    let graph = open_graph(config)?;
    let prefix = args.path.trim_matches('/');
    let listings = graph.list_entities(prefix, args.depth)?;

    if args.format == "json" {
        return print_json(&listings);
    }

    if listings.is_empty() {
        println!("No notes found under: {}/", prefix);
        return Ok(());
    }

    println!("📂 {}/\n", prefix);

    for listing in &listings {
        let display_path = listing
            .path
            .strip_prefix(prefix)
            .unwrap_or(&listing.path)
            .trim_start_matches('/');
        match &listing.entity {
            Some(summary) => println!(
                "  {}  {} {}",
                display_path,
                summary.title.bold(),
                format!("[{}]", summary.entity_type).dimmed()
            ),
            None => println!("  {}  {}", display_path, "(not indexed)".yellow()),
        }
    }

    Ok(())
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Folder to show tree for (default: root)
    #[arg(default_value = "")]
    pub path: String,

    /// Maximum depth
    #[arg(short, long, default_value = "3")]
    pub depth: usize,
}

pub fn run_tree(args: TreeArgs, config: &Config) -> Result<()> {
    let graph = open_graph(config)?;
    let prefix = args.path.trim_matches('/');
    let listings = graph.list_entities(prefix, args.depth)?;

    if listings.is_empty() {
        println!("No notes found under: {}/", prefix);
        return Ok(());
    }

    let mut tree = PathTree::new();
    for listing in &listings {
        let relative = listing
            .path
            .strip_prefix(prefix)
            .unwrap_or(&listing.path);
        tree.add_path(relative);
    }

    println!("📂 {}/", prefix);
    tree.print_level("");
    println!("\n{} notes total", listings.len());

    Ok(())
}

/// Folder tree for display
#[derive(Default)]
struct PathTree {
    children: BTreeMap<String, PathTree>,
}

impl PathTree {
    fn new() -> Self {
        Self::default()
    }

    fn add_path(&mut self, path: &str) {
        let mut node = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            node = node.children.entry(segment.to_string()).or_default();
        }
    }

    fn print_level(&self, indent: &str) {
        let count = self.children.len();
        for (i, (key, child)) in self.children.iter().enumerate() {
            let is_last = i + 1 == count;
            let branch = if is_last { "└── " } else { "├── " };
            if child.children.is_empty() {
                println!("{}{}{}", indent, branch, key);
            } else {
                println!("{}{}{}/", indent, branch, key.cyan());
            }

            let next = format!("{}{}", indent, if is_last { "    " } else { "│   " });
            child.print_level(&next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_tree_nests_folders() {
        let mut tree = PathTree::new();
        tree.add_path("food/coffee.md");
        tree.add_path("food/tea.md");
        tree.add_path("/readme.md");

        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children["food"].children.len(), 2);
        assert!(tree.children["readme.md"].children.is_empty());
    }
}
