//! CLI utility functions
//!
//! Common helpers shared across CLI commands:
//! - Opening the knowledge graph described by the config
//! - Printing values as JSON

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::core::graph::KnowledgeGraph;

/// Open the knowledge graph for the configured root
///
/// Loads every note under the root, so derived state always reflects the files.
pub fn open_graph(config: &Config) -> Result<KnowledgeGraph> {
    let root = config.kb_root()?;
    let db = config.search_db(&root);
    debug!(root = %root.display(), "opening knowledge base");

    KnowledgeGraph::open_local(&root, config.graph_settings(), db.as_deref())
        .with_context(|| format!("Failed to open knowledge base at {}", root.display()))
}

/// Engine for the configured root without loading any notes
pub fn unloaded_graph(config: &Config) -> Result<KnowledgeGraph> {
    let root = config.kb_root()?;
    let db = config.search_db(&root);
    Ok(KnowledgeGraph::local(&root, config.graph_settings(), db.as_deref())?)
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Split comma-separated values, dropping empties
pub fn split_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        let values = vec!["a, b".to_string(), "".to_string(), "c,".to_string()];
        assert_eq!(split_list(&values), vec!["a", "b", "c"]);
    }
}
