//! CLI module - Command definitions and handlers

use clap::{Parser, Subcommand};

pub mod browse;
pub mod context;
pub mod delete;
pub mod init;
pub mod read;
pub mod rebuild;
pub mod search;
pub mod stats;
pub mod utils;
pub mod write;

/// ng - Knowledge graph over Markdown notes
///
/// Notes are plain Markdown files; observations, relations and the search
/// index are derived from them.
#[derive(Parser, Debug)]
#[command(name = "ng")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, env = "NOTEGRAPH_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a knowledge base
    Init(init::InitArgs),

    /// Create or replace a note
    Write(write::WriteArgs),

    /// Print a note by title, permalink or path
    Read(read::ReadArgs),

    /// Full-text search
    Search(search::SearchArgs),

    /// Show the notes reachable from a note
    Context(context::ContextArgs),

    /// List notes under a folder
    Ls(browse::LsArgs),

    /// Show folder tree
    Tree(browse::TreeArgs),

    /// Delete a note
    Delete(delete::DeleteArgs),

    /// Rebuild all derived state from the Markdown files
    Rebuild(rebuild::RebuildArgs),

    /// Show knowledge-base statistics
    Stats(stats::StatsArgs),
}
