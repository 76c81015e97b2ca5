//! Error - Typed failures of the graph engine
//!
//! Every user-facing operation returns [`Result`], so callers can tell a missing
//! note ("create it?") from an ambiguous title or an I/O failure.
//!
//! Dangling relations and malformed note lines are *not* errors: the former are
//! a stable state of the link index, the latter surface as
//! [`crate::core::parser::ParseWarning`]s.

use thiserror::Error;
use ulid::Ulid;

/// Errors produced by the knowledge graph engine
#[derive(Debug, Error)]
pub enum GraphError {
    /// Identifier resolved to nothing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Title matched more than one entity
    #[error("Ambiguous identifier '{identifier}': matches {}", candidates.join(", "))]
    Ambiguous {
        identifier: String,
        candidates: Vec<String>,
    },

    /// Two live entities would share a permalink (consistency failure)
    #[error("Permalink conflict: '{permalink}' is held by {existing}, cannot assign to {incoming}")]
    PermalinkConflict {
        permalink: String,
        existing: Ulid,
        incoming: Ulid,
    },

    /// Failure reported by the file-access collaborator
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Search index (SQLite) failure
    #[error("Search index error: {0}")]
    Search(#[from] rusqlite::Error),

    /// Frontmatter could not be rendered
    #[error("Frontmatter error: {0}")]
    Frontmatter(#[from] serde_yaml::Error),

    /// Caller supplied unusable input (empty title, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A lock was poisoned by a panicking writer
    #[error("Lock error: {0}")]
    Lock(String),
}

impl GraphError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        GraphError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is an I/O error for a file that does not exist
    pub fn is_missing_file(&self) -> bool {
        matches!(self, GraphError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_message_lists_candidates() {
        let err = GraphError::Ambiguous {
            identifier: "Meeting".to_string(),
            candidates: vec!["notes/meeting".to_string(), "notes/meeting-2".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("notes/meeting, notes/meeting-2"));
    }

    #[test]
    fn test_is_missing_file() {
        let missing = GraphError::io(
            "a.md",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(missing.is_missing_file());

        let denied = GraphError::io(
            "a.md",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no"),
        );
        assert!(!denied.is_missing_file());
        assert!(!GraphError::NotFound("x".into()).is_missing_file());
    }
}
