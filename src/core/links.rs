//! Link Resolver - Relation resolution and the bidirectional edge index
//!
//! # Architecture
//!
//! ```text
//!   outgoing[A] = [A -implements-> B]      incoming[B] = [A -implements-> B]
//!   pending["c"] = [(A, relation #1, "C")]  (no entity "C" yet)
//! ```
//!
//! - `incoming` is always the exact transpose of all `outgoing` edges
//! - A relation is either an edge (resolved) or a pending entry (dangling),
//!   never both, and its state in the owning [`Entity`] agrees with the index
//! - Pending entries are keyed by normalized target so that creating or
//!   renaming an entity only inspects the targets that could match it
//!
//! Everything here is derived from the [`EntityStore`] and can be rebuilt
//! from it with [`LinkIndex::rebuild`].

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;
use ulid::Ulid;

use super::entity::{Entity, LinkTarget};
use super::permalink;
use super::resolver::{self, Resolution};
use super::store::{self, EntityStore};

/// A resolved relation: `relations[index]` of `source` points at `target`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Edge {
    pub source: Ulid,
    pub index: usize,
    pub target: Ulid,
    pub relation_type: String,
}

/// A dangling relation waiting for its target to appear
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PendingLink {
    pub source: Ulid,
    pub index: usize,
    pub target_title: String,
}

/// Key under which a pending target is filed
fn pending_key(target: &str) -> String {
    store::normalize_title(&permalink::normalize_identifier(target))
}

/// Edge index plus pending set
#[derive(Debug, Default, Clone)]
pub struct LinkIndex {
    outgoing: HashMap<Ulid, Vec<Edge>>,
    incoming: HashMap<Ulid, Vec<Edge>>,
    pending: HashMap<String, Vec<PendingLink>>,
    pending_by_source: HashMap<Ulid, HashSet<String>>,
}

impl LinkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the whole index from the store
    pub fn rebuild(store: &mut EntityStore) -> Self {
        let mut index = LinkIndex::new();
        let mut ids: Vec<(String, Ulid)> = store
            .iter()
            .map(|e| (e.permalink.clone(), e.id))
            .collect();
        ids.sort();
        for (_, id) in ids {
            index.apply_relations(store, id);
        }
        index
    }

    /// (Re-)resolve every relation of `source`
    ///
    /// Edges and pending entries previously owned by `source` are dropped
    /// first, so this is the update path for both a new and a reparsed entity.
    pub fn apply_relations(&mut self, store: &mut EntityStore, source: Ulid) {
        self.detach_source(source);

        let targets: Vec<(String, String)> = match store.get(&source) {
            Some(entity) => entity
                .relations
                .iter()
                .map(|r| (r.relation_type.clone(), r.target_title.clone()))
                .collect(),
            None => return,
        };

        for (index, (relation_type, target_title)) in targets.into_iter().enumerate() {
            self.resolve_one(store, source, index, relation_type, target_title);
        }
    }

    /// Resolve pending relations that now match `id`'s title or permalink
    ///
    /// Returns the number of relations that were resolved.
    pub fn on_entity_created_or_renamed(&mut self, store: &mut EntityStore, id: Ulid) -> usize {
        let (title, permalink) = match store.get(&id) {
            Some(entity) => (entity.title.clone(), entity.permalink.clone()),
            None => return 0,
        };

        let mut keys = vec![pending_key(&title)];
        let permalink_key = pending_key(&permalink);
        if permalink_key != keys[0] {
            keys.push(permalink_key);
        }

        let mut resolved = 0;
        for key in keys {
            let Some(candidates) = self.pending.get(&key).cloned() else {
                continue;
            };

            let (matching, remaining): (Vec<PendingLink>, Vec<PendingLink>) = candidates
                .into_iter()
                .partition(|p| resolver::resolve(store, &p.target_title) == Resolution::Found(id));

            if matching.is_empty() {
                continue;
            }
            if remaining.is_empty() {
                self.pending.remove(&key);
            } else {
                self.pending.insert(key.clone(), remaining);
            }

            for link in matching {
                self.forget_pending_key(link.source, &key);
                let relation_type = store
                    .get(&link.source)
                    .and_then(|e| e.relations.get(link.index))
                    .map(|r| r.relation_type.clone())
                    .unwrap_or_default();
                store.set_relation_target(&link.source, link.index, LinkTarget::Resolved(id));
                self.insert_edge(Edge {
                    source: link.source,
                    index: link.index,
                    target: id,
                    relation_type,
                });
                resolved += 1;
            }
        }

        if resolved > 0 {
            debug!(entity = %id, resolved, "resolved pending relations");
        }
        resolved
    }

    /// Update after `id` was replaced with a new title or permalink
    ///
    /// Besides resolving links to the new names, links to the old names are
    /// retried: a title that was shared may now belong to a single entity.
    pub fn on_entity_renamed(&mut self, store: &mut EntityStore, id: Ulid, previous: &Entity) -> usize {
        let mut resolved = self.on_entity_created_or_renamed(store, id);
        resolved += self.retry_pending(store, &previous.title);
        resolved += self.retry_pending(store, &previous.permalink);
        resolved
    }

    /// Re-run resolution for the pending links filed under `target`
    pub fn retry_pending(&mut self, store: &mut EntityStore, target: &str) -> usize {
        let key = pending_key(target);
        let Some(candidates) = self.pending.remove(&key) else {
            return 0;
        };

        let mut remaining = Vec::new();
        let mut resolved = Vec::new();
        for link in candidates {
            match resolver::resolve(store, &link.target_title) {
                Resolution::Found(target) => resolved.push((link, target)),
                Resolution::NotFound | Resolution::Ambiguous(_) => remaining.push(link),
            }
        }
        if !remaining.is_empty() {
            self.pending.insert(key.clone(), remaining);
        }

        let count = resolved.len();
        for (link, target) in resolved {
            self.forget_pending_key(link.source, &key);
            let relation_type = store
                .get(&link.source)
                .and_then(|e| e.relations.get(link.index))
                .map(|r| r.relation_type.clone())
                .unwrap_or_default();
            store.set_relation_target(&link.source, link.index, LinkTarget::Resolved(target));
            self.insert_edge(Edge {
                source: link.source,
                index: link.index,
                target,
                relation_type,
            });
        }

        if count > 0 {
            debug!(%key, resolved = count, "retried pending relations");
        }
        count
    }

    /// Drop `removed` from the index after it was taken out of the store
    ///
    /// Relations of other entities that pointed at it are demoted to
    /// dangling; each then retries resolution against the remaining entities.
    /// Pending links to its title or permalink are retried as well.
    pub fn on_entity_deleted(&mut self, store: &mut EntityStore, removed: &Entity) {
        let id = removed.id;
        self.detach_source(id);

        let incoming = self.incoming.remove(&id).unwrap_or_default();
        for edge in incoming {
            if let Some(edges) = self.outgoing.get_mut(&edge.source) {
                edges.retain(|e| e.index != edge.index);
                if edges.is_empty() {
                    self.outgoing.remove(&edge.source);
                }
            }

            let Some(target_title) = store
                .get(&edge.source)
                .and_then(|e| e.relations.get(edge.index))
                .map(|r| r.target_title.clone())
            else {
                continue;
            };

            store.set_relation_target(&edge.source, edge.index, LinkTarget::Dangling);
            self.resolve_one(store, edge.source, edge.index, edge.relation_type, target_title);
        }

        self.retry_pending(store, &removed.title);
        self.retry_pending(store, &removed.permalink);
    }

    /// Resolved outgoing edges of `id`, in relation order
    pub fn outgoing(&self, id: &Ulid) -> &[Edge] {
        self.outgoing.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Back-references to `id`
    pub fn incoming(&self, id: &Ulid) -> &[Edge] {
        self.incoming.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Pending relations whose target normalizes like `target`
    pub fn pending_for(&self, target: &str) -> &[PendingLink] {
        self.pending
            .get(&pending_key(target))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(|v| v.len()).sum()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.values().map(|v| v.len()).sum()
    }

    /// All edges, sorted
    pub fn all_edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self.outgoing.values().flatten().cloned().collect();
        edges.sort();
        edges
    }

    /// All back-references, sorted
    pub fn all_incoming(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self.incoming.values().flatten().cloned().collect();
        edges.sort();
        edges
    }

    /// All pending links, sorted
    pub fn all_pending(&self) -> Vec<PendingLink> {
        let mut links: Vec<PendingLink> = self.pending.values().flatten().cloned().collect();
        links.sort();
        links
    }

    /// Check the index against the store; returns a description of each problem
    pub fn verify(&self, store: &EntityStore) -> Vec<String> {
        let mut problems = Vec::new();

        if self.all_edges() != self.all_incoming() {
            problems.push("incoming index is not the transpose of outgoing".to_string());
        }
        for (target, edges) in &self.incoming {
            if edges.iter().any(|e| e.target != *target) {
                problems.push(format!("incoming[{}] holds a foreign edge", target));
            }
        }

        let edges: HashSet<(Ulid, usize)> = self
            .outgoing
            .values()
            .flatten()
            .map(|e| (e.source, e.index))
            .collect();
        let pending: HashSet<(Ulid, usize)> = self
            .pending
            .values()
            .flatten()
            .map(|p| (p.source, p.index))
            .collect();

        for entity in store.iter() {
            for (index, relation) in entity.relations.iter().enumerate() {
                let key = (entity.id, index);
                match relation.target {
                    LinkTarget::Resolved(target) => {
                        let edge_matches = self
                            .outgoing(&entity.id)
                            .iter()
                            .any(|e| e.index == index && e.target == target);
                        if !edge_matches {
                            problems.push(format!("{}#{} resolved without edge", entity.permalink, index));
                        }
                        if store.get(&target).is_none() {
                            problems.push(format!("{}#{} points at a deleted entity", entity.permalink, index));
                        }
                    }
                    LinkTarget::Dangling => {
                        if !pending.contains(&key) {
                            problems.push(format!("{}#{} dangling but not pending", entity.permalink, index));
                        }
                    }
                }
                if edges.contains(&key) && pending.contains(&key) {
                    problems.push(format!("{}#{} both resolved and pending", entity.permalink, index));
                }
            }
        }

        problems
    }

    fn resolve_one(
        &mut self,
        store: &mut EntityStore,
        source: Ulid,
        index: usize,
        relation_type: String,
        target_title: String,
    ) {
        match resolver::resolve(store, &target_title) {
            Resolution::Found(target) => {
                store.set_relation_target(&source, index, LinkTarget::Resolved(target));
                self.insert_edge(Edge {
                    source,
                    index,
                    target,
                    relation_type,
                });
            }
            Resolution::NotFound | Resolution::Ambiguous(_) => {
                store.set_relation_target(&source, index, LinkTarget::Dangling);
                let key = pending_key(&target_title);
                self.pending_by_source
                    .entry(source)
                    .or_default()
                    .insert(key.clone());
                self.pending.entry(key).or_default().push(PendingLink {
                    source,
                    index,
                    target_title,
                });
            }
        }
    }

    fn insert_edge(&mut self, edge: Edge) {
        let outgoing = self.outgoing.entry(edge.source).or_default();
        let pos = outgoing.partition_point(|e| e.index < edge.index);
        outgoing.insert(pos, edge.clone());
        self.incoming.entry(edge.target).or_default().push(edge);
    }

    fn detach_source(&mut self, source: Ulid) {
        if let Some(edges) = self.outgoing.remove(&source) {
            for edge in edges {
                if let Some(incoming) = self.incoming.get_mut(&edge.target) {
                    incoming.retain(|e| e.source != source);
                    if incoming.is_empty() {
                        self.incoming.remove(&edge.target);
                    }
                }
            }
        }

        if let Some(keys) = self.pending_by_source.remove(&source) {
            for key in keys {
                if let Some(links) = self.pending.get_mut(&key) {
                    links.retain(|p| p.source != source);
                    if links.is_empty() {
                        self.pending.remove(&key);
                    }
                }
            }
        }
    }

    /// Drop `key` from `source`'s pending keys once none of its links use it
    fn forget_pending_key(&mut self, source: Ulid, key: &str) {
        let still_used = self
            .pending
            .get(key)
            .map(|links| links.iter().any(|p| p.source == source))
            .unwrap_or(false);
        if still_used {
            return;
        }
        if let Some(keys) = self.pending_by_source.get_mut(&source) {
            keys.remove(key);
            if keys.is_empty() {
                self.pending_by_source.remove(&source);
            }
        }
    }
}

/// Entities that link to `id`, ordered by permalink
pub fn backlinks<'a>(links: &LinkIndex, store: &'a EntityStore, id: &Ulid) -> Vec<&'a Entity> {
    let mut sources: Vec<&Entity> = links
        .incoming(id)
        .iter()
        .filter_map(|e| store.get(&e.source))
        .collect();
    sources.sort_by(|a, b| a.permalink.cmp(&b.permalink));
    sources.dedup_by(|a, b| a.id == b.id);
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::Relation;
    use chrono::Utc;

    fn add(store: &mut EntityStore, links: &mut LinkIndex, title: &str, targets: &[(&str, &str)]) -> Ulid {
        let relations = targets
            .iter()
            .map(|(rel, target)| Relation::new(*rel, *target))
            .collect();
        let entity = Entity::new(title, permalink::generate("notes", title), Utc::now())
            .with_relations(relations);
        let id = entity.id;
        store.put(entity).unwrap();
        links.apply_relations(store, id);
        links.on_entity_created_or_renamed(store, id);
        id
    }

    #[test]
    fn test_resolves_existing_target() {
        let mut store = EntityStore::new();
        let mut links = LinkIndex::new();
        let b = add(&mut store, &mut links, "B", &[]);
        let a = add(&mut store, &mut links, "A", &[("implements", "B")]);

        assert_eq!(store.get(&a).unwrap().relations[0].target_id(), Some(b));
        assert_eq!(links.outgoing(&a).len(), 1);
        assert_eq!(links.incoming(&b)[0].source, a);
        assert!(links.verify(&store).is_empty());
    }

    #[test]
    fn test_dangling_then_resolve() {
        let mut store = EntityStore::new();
        let mut links = LinkIndex::new();
        let a = add(&mut store, &mut links, "A", &[("implements", "B")]);

        assert!(store.get(&a).unwrap().relations[0].target_id().is_none());
        assert_eq!(links.pending_for("B").len(), 1);

        let b = add(&mut store, &mut links, "B", &[]);
        assert_eq!(store.get(&a).unwrap().relations[0].target_id(), Some(b));
        assert_eq!(links.incoming(&b).len(), 1);
        assert_eq!(links.incoming(&b)[0].source, a);
        assert_eq!(links.pending_count(), 0);
        assert!(links.verify(&store).is_empty());
    }

    #[test]
    fn test_pending_matches_case_insensitive_title_and_permalink() {
        let mut store = EntityStore::new();
        let mut links = LinkIndex::new();
        let a = add(&mut store, &mut links, "A", &[("rel", "auth spec"), ("rel", "notes/auth-spec")]);

        let spec = add(&mut store, &mut links, "Auth Spec", &[]);
        let relations = &store.get(&a).unwrap().relations;
        assert_eq!(relations[0].target_id(), Some(spec));
        assert_eq!(relations[1].target_id(), Some(spec));
        assert_eq!(links.pending_count(), 0);
    }

    #[test]
    fn test_rename_resolves_pending() {
        let mut store = EntityStore::new();
        let mut links = LinkIndex::new();
        let a = add(&mut store, &mut links, "A", &[("rel", "Target")]);
        let b = add(&mut store, &mut links, "Draft", &[]);
        assert_eq!(links.pending_count(), 1);

        let mut renamed = store.get(&b).unwrap().clone();
        renamed.title = "Target".to_string();
        store.put(renamed).unwrap();
        links.apply_relations(&mut store, b);
        links.on_entity_created_or_renamed(&mut store, b);

        assert_eq!(store.get(&a).unwrap().relations[0].target_id(), Some(b));
        assert!(links.verify(&store).is_empty());
    }

    #[test]
    fn test_reparse_replaces_edges() {
        let mut store = EntityStore::new();
        let mut links = LinkIndex::new();
        let b = add(&mut store, &mut links, "B", &[]);
        let c = add(&mut store, &mut links, "C", &[]);
        let a = add(&mut store, &mut links, "A", &[("rel", "B"), ("rel", "Missing")]);

        let mut updated = store.get(&a).unwrap().clone();
        updated.relations = vec![Relation::new("rel", "C")];
        store.put(updated).unwrap();
        links.apply_relations(&mut store, a);

        assert!(links.incoming(&b).is_empty());
        assert_eq!(links.incoming(&c).len(), 1);
        assert_eq!(links.pending_count(), 0);
        assert!(links.verify(&store).is_empty());
    }

    #[test]
    fn test_delete_demotes_to_pending() {
        let mut store = EntityStore::new();
        let mut links = LinkIndex::new();
        let b = add(&mut store, &mut links, "B", &[("rel", "A")]);
        let a = add(&mut store, &mut links, "A", &[("rel", "B")]);

        let removed = store.delete(&b).unwrap();
        links.on_entity_deleted(&mut store, &removed);

        let relation = &store.get(&a).unwrap().relations[0];
        assert_eq!(relation.target, LinkTarget::Dangling);
        assert_eq!(relation.target_title, "B");
        assert_eq!(links.pending_for("B").len(), 1);
        assert!(links.incoming(&a).is_empty());
        assert!(links.outgoing(&a).is_empty());
        assert!(links.verify(&store).is_empty());

        // Recreating B resolves the demoted relation again
        let b2 = add(&mut store, &mut links, "B", &[]);
        assert_eq!(store.get(&a).unwrap().relations[0].target_id(), Some(b2));
    }

    #[test]
    fn test_delete_falls_back_to_remaining_match() {
        let mut store = EntityStore::new();
        let mut links = LinkIndex::new();
        let first = add(&mut store, &mut links, "Shared", &[]);
        let a = add(&mut store, &mut links, "A", &[("rel", "Shared")]);
        assert_eq!(store.get(&a).unwrap().relations[0].target_id(), Some(first));

        // A second "Shared" makes the title ambiguous but keeps A resolved
        let mut second = Entity::new("Shared", "other/shared", Utc::now());
        second.file_path = "other/shared.md".to_string();
        let second_id = second.id;
        store.put(second).unwrap();
        links.apply_relations(&mut store, second_id);
        links.on_entity_created_or_renamed(&mut store, second_id);
        assert_eq!(store.get(&a).unwrap().relations[0].target_id(), Some(first));

        let removed = store.delete(&first).unwrap();
        links.on_entity_deleted(&mut store, &removed);
        assert_eq!(store.get(&a).unwrap().relations[0].target_id(), Some(second_id));
        assert!(links.verify(&store).is_empty());
    }

    #[test]
    fn test_ambiguous_target_stays_pending() {
        let mut store = EntityStore::new();
        let mut links = LinkIndex::new();
        add(&mut store, &mut links, "Dup", &[]);
        let mut other = Entity::new("Dup", "other/dup", Utc::now());
        other.file_path = "other/dup.md".to_string();
        store.put(other).unwrap();

        let a = add(&mut store, &mut links, "A", &[("rel", "Dup")]);
        assert!(store.get(&a).unwrap().relations[0].target_id().is_none());
        assert_eq!(links.pending_count(), 1);
    }

    #[test]
    fn test_ambiguity_cleared_by_delete() {
        let mut store = EntityStore::new();
        let mut links = LinkIndex::new();
        let first = add(&mut store, &mut links, "Dup", &[]);
        let mut other = Entity::new("Dup", "other/dup", Utc::now());
        other.file_path = "other/dup.md".to_string();
        let other_id = other.id;
        store.put(other).unwrap();
        links.on_entity_created_or_renamed(&mut store, other_id);

        let a = add(&mut store, &mut links, "A", &[("rel", "Dup")]);
        assert_eq!(links.pending_count(), 1);

        let removed = store.delete(&other_id).unwrap();
        links.on_entity_deleted(&mut store, &removed);

        assert_eq!(store.get(&a).unwrap().relations[0].target_id(), Some(first));
        assert_eq!(links.pending_count(), 0);
        assert_eq!(links.incoming(&first)[0].source, a);
        assert!(links.verify(&store).is_empty());
    }

    #[test]
    fn test_ambiguity_cleared_by_rename() {
        let mut store = EntityStore::new();
        let mut links = LinkIndex::new();
        let first = add(&mut store, &mut links, "Dup", &[]);
        let mut other = Entity::new("Dup", "other/dup", Utc::now());
        other.file_path = "other/dup.md".to_string();
        let other_id = other.id;
        store.put(other).unwrap();
        links.on_entity_created_or_renamed(&mut store, other_id);

        let a = add(&mut store, &mut links, "A", &[("rel", "Dup")]);
        assert_eq!(links.pending_count(), 1);

        let mut renamed = store.get(&other_id).unwrap().clone();
        renamed.title = "Something Else".to_string();
        let previous = store.put(renamed).unwrap().unwrap();
        links.apply_relations(&mut store, other_id);
        links.on_entity_renamed(&mut store, other_id, &previous);

        assert_eq!(store.get(&a).unwrap().relations[0].target_id(), Some(first));
        assert_eq!(links.pending_count(), 0);
        assert!(links.verify(&store).is_empty());
    }

    #[test]
    fn test_pending_key_collapses_whitespace() {
        let mut store = EntityStore::new();
        let mut links = LinkIndex::new();
        let a = add(&mut store, &mut links, "A", &[("rel", "Weekly   Meeting")]);
        let meeting = add(&mut store, &mut links, "Weekly Meeting", &[]);
        assert_eq!(store.get(&a).unwrap().relations[0].target_id(), Some(meeting));
    }

    #[test]
    fn test_self_link() {
        let mut store = EntityStore::new();
        let mut links = LinkIndex::new();
        let a = add(&mut store, &mut links, "A", &[("rel", "A")]);
        assert_eq!(links.outgoing(&a)[0].target, a);
        assert_eq!(links.incoming(&a)[0].source, a);

        let removed = store.delete(&a).unwrap();
        links.on_entity_deleted(&mut store, &removed);
        assert_eq!(links.edge_count(), 0);
        assert!(links.all_incoming().is_empty());
        assert_eq!(links.pending_count(), 0);
    }

    #[test]
    fn test_rebuild_matches_incremental() {
        let mut store = EntityStore::new();
        let mut links = LinkIndex::new();
        add(&mut store, &mut links, "A", &[("rel", "B"), ("rel", "Nope")]);
        add(&mut store, &mut links, "B", &[("rel", "C")]);
        add(&mut store, &mut links, "C", &[("rel", "A")]);

        let rebuilt = LinkIndex::rebuild(&mut store);
        assert_eq!(rebuilt.all_edges(), links.all_edges());
        assert_eq!(rebuilt.all_pending(), links.all_pending());
        assert!(rebuilt.verify(&store).is_empty());
    }

    #[test]
    fn test_outgoing_kept_in_relation_order() {
        let mut store = EntityStore::new();
        let mut links = LinkIndex::new();
        let a = add(&mut store, &mut links, "A", &[("rel", "Z"), ("rel", "Y")]);
        add(&mut store, &mut links, "Y", &[]);
        add(&mut store, &mut links, "Z", &[]);

        let indices: Vec<_> = links.outgoing(&a).iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_backlinks() {
        let mut store = EntityStore::new();
        let mut links = LinkIndex::new();
        let t = add(&mut store, &mut links, "T", &[]);
        add(&mut store, &mut links, "B", &[("rel", "T"), ("other", "T")]);
        add(&mut store, &mut links, "A", &[("rel", "T")]);

        let titles: Vec<_> = backlinks(&links, &store, &t).iter().map(|e| e.title.clone()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }
}
