//! Context Builder - Bounded breadth-first expansion over outgoing relations
//!
//! # Key Points
//! - Only resolved *outgoing* edges are followed; back-references are not
//! - Each entity appears at most once, at the depth it was first reached
//! - The start entity is always entry 0 at depth 0
//! - A node at depth `d` is expanded only while `d < depth`

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use ulid::Ulid;

use super::entity::Entity;
use super::links::LinkIndex;
use super::store::EntityStore;

/// How an entry was reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Via {
    pub source: Ulid,
    pub source_permalink: String,
    pub relation_type: String,
}

/// One entity in a context result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextEntry {
    pub entity: Entity,
    pub depth: usize,
    /// `None` for the start entity
    pub via: Option<Via>,
}

/// BFS from `start`, in discovery order
pub fn build_context(
    store: &EntityStore,
    links: &LinkIndex,
    start: Ulid,
    depth: usize,
) -> Vec<ContextEntry> {
    let Some(root) = store.get(&start) else {
        return Vec::new();
    };

    let mut entries = vec![ContextEntry {
        entity: root.clone(),
        depth: 0,
        via: None,
    }];
    let mut visited: HashSet<Ulid> = HashSet::from([start]);
    let mut queue: VecDeque<(Ulid, usize)> = VecDeque::from([(start, 0)]);

    while let Some((current, d)) = queue.pop_front() {
        if d >= depth {
            continue;
        }
        let source_permalink = store
            .get(&current)
            .map(|e| e.permalink.clone())
            .unwrap_or_default();

        for edge in links.outgoing(&current) {
            if !visited.insert(edge.target) {
                continue;
            }
            let Some(target) = store.get(&edge.target) else {
                continue;
            };
            entries.push(ContextEntry {
                entity: target.clone(),
                depth: d + 1,
                via: Some(Via {
                    source: current,
                    source_permalink: source_permalink.clone(),
                    relation_type: edge.relation_type.clone(),
                }),
            });
            queue.push_back((edge.target, d + 1));
        }
    }

    entries
}
