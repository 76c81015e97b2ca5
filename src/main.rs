//! ng CLI - Entry point
//!
//! Usage: ng <command> [options]

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use notegraph::cli::{Cli, Commands};
use notegraph::config::Config;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so stdout stays parseable
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config_path = cli.config.as_deref().map(Path::new);
    let load = || Config::load(config_path);

    // Run command
    match cli.command {
        Commands::Init(args) => notegraph::cli::init::run(args),
        Commands::Write(args) => notegraph::cli::write::run(args, &load()?),
        Commands::Read(args) => notegraph::cli::read::run(args, &load()?),
        Commands::Search(args) => notegraph::cli::search::run(args, &load()?),
        Commands::Context(args) => notegraph::cli::context::run(args, &load()?),
        Commands::Ls(args) => notegraph::cli::browse::run_ls(args, &load()?),
        Commands::Tree(args) => notegraph::cli::browse::run_tree(args, &load()?),
        Commands::Delete(args) => notegraph::cli::delete::run(args, &load()?),
        Commands::Rebuild(args) => notegraph::cli::rebuild::run(args, &load()?),
        Commands::Stats(args) => notegraph::cli::stats::execute(args, &load()?),
    }
}
