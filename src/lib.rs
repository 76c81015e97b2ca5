//! notegraph - Knowledge graph over Markdown notes
//!
//! Markdown files are the source of truth. Everything else (entities, links,
//! the search index) is derived and can be rebuilt from them.
//!
//! ## Key Concepts
//!
//! - **Observations**: `- [category] text #tag` lines
//! - **Relations**: `- relation_type [[Target]]` lines and inline `[[Target]]`
//! - **Permalinks**: stable, unique, slug-based identifiers (`notes/my-note`)
//! - **Pending links**: relations to titles that do not exist yet, resolved
//!   automatically once a matching note appears

pub mod cli;
pub mod config;
pub mod core;

pub use core::context::ContextEntry;
pub use core::entity::{Entity, EntitySummary, LinkTarget, Observation, Relation};
pub use core::error::{GraphError, Result};
pub use core::fs::{Clock, FileAccess, LocalFiles, ManualClock, MemoryFiles, SystemClock};
pub use core::graph::{GraphSettings, KnowledgeGraph, NoteInput, WriteOutcome};
pub use core::search::{SearchHit, SearchIndex, SearchQuery};
