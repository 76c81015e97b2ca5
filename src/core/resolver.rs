//! Identity Resolver - Map identifier strings to entities
//!
//! Accepted identifiers:
//! - exact permalink: `notes/meeting`
//! - reference: `memory://notes/meeting`
//! - title, case-insensitive: `Meeting`
//!
//! Permalink lookup is tried first. A title shared by several entities is an
//! `Ambiguous` error rather than a guess.

use std::collections::HashSet;

use ulid::Ulid;

use super::entity::Entity;
use super::error::{GraphError, Result};
use super::permalink;
use super::store::EntityStore;

/// Outcome of resolving without turning misses into errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(Ulid),
    NotFound,
    Ambiguous(Vec<Ulid>),
}

/// Resolve an identifier to an entity id
pub fn resolve(store: &EntityStore, identifier: &str) -> Resolution {
    let normalized = permalink::normalize_identifier(identifier);
    if let Some(id) = store.permalink_owner(&normalized) {
        return Resolution::Found(id);
    }

    let title = identifier.trim();
    match store.find_by_title(title) {
        [] => Resolution::NotFound,
        [id] => Resolution::Found(*id),
        many => Resolution::Ambiguous(many.to_vec()),
    }
}

/// Resolve an identifier to an entity, with typed errors
pub fn resolve_identifier<'a>(store: &'a EntityStore, identifier: &str) -> Result<&'a Entity> {
    match resolve(store, identifier) {
        Resolution::Found(id) => store
            .get(&id)
            .ok_or_else(|| GraphError::NotFound(identifier.to_string())),
        Resolution::NotFound => Err(GraphError::NotFound(identifier.to_string())),
        Resolution::Ambiguous(ids) => {
            let mut candidates: Vec<String> = ids
                .iter()
                .filter_map(|id| store.get(id))
                .map(|e| e.permalink.clone())
                .collect();
            candidates.sort();
            Err(GraphError::Ambiguous {
                identifier: identifier.to_string(),
                candidates,
            })
        }
    }
}

/// Generate a unique permalink for (folder, title)
///
/// If the base permalink is held by `own` (the entity being updated) it is
/// reused unchanged. Otherwise `-2`, `-3`, … are appended until the candidate
/// is neither held by another entity, nor in `reserved`, nor `blocked`.
pub fn generate_permalink<F>(
    store: &EntityStore,
    reserved: &HashSet<String>,
    folder: &str,
    title: &str,
    own: Option<Ulid>,
    blocked: F,
) -> Result<String>
where
    F: FnMut(&str) -> Result<bool>,
{
    let base = permalink::generate(folder, title);
    unique_permalink(store, reserved, &base, own, blocked)
}

/// Apply the collision policy to an already-slugified permalink
///
/// `blocked` rejects candidates the store cannot know about, such as a file
/// that exists on disk but is not indexed yet.
pub fn unique_permalink<F>(
    store: &EntityStore,
    reserved: &HashSet<String>,
    base: &str,
    own: Option<Ulid>,
    mut blocked: F,
) -> Result<String>
where
    F: FnMut(&str) -> Result<bool>,
{
    let mut available = |candidate: &str| -> Result<bool> {
        let held_by_other = match store.permalink_owner(candidate) {
            Some(owner) => Some(owner) != own,
            None => false,
        };
        // A file path held by another entity blocks the permalink too
        let path_taken = match store.path_owner(&format!("{}.md", candidate)) {
            Some(owner) => Some(owner) != own,
            None => false,
        };
        if held_by_other || path_taken || reserved.contains(candidate) {
            return Ok(false);
        }
        Ok(!blocked(candidate)?)
    };

    if available(base)? {
        return Ok(base.to_string());
    }

    let mut n = 2u32;
    loop {
        let candidate = format!("{}-{}", base, n);
        if available(&candidate)? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// `blocked` for callers with nothing outside the store to check
pub fn nothing_blocked(_: &str) -> Result<bool> {
    Ok(false)
}
