//! Core module - Business logic
//!
//! Contains the knowledge-graph engine: parsing, identity, links, context and search.

pub mod context;
pub mod entity;
pub mod error;
pub mod format;
pub mod fs;
pub mod graph;
pub mod links;
pub mod parser;
pub mod permalink;
pub mod resolver;
pub mod search;
pub mod store;
