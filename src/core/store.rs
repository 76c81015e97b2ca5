//! Entity Store - Authoritative in-memory table of entities
//!
//! Keyed by identity, with secondary indices by permalink (unique), by
//! normalized title (not unique) and by backing file path (unique).
//!
//! # Key Points
//! - `put` replaces by identity and returns the previous version
//! - Two live entities never share a permalink or a file path
//! - Mutation is synchronous: indices are consistent whenever a call returns

use std::collections::HashMap;

use ulid::Ulid;

use super::entity::{Entity, LinkTarget};
use super::error::{GraphError, Result};

/// Normalized form used by the title index: lowercase, whitespace runs collapsed
pub fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// In-memory entity table
#[derive(Debug, Default, Clone)]
pub struct EntityStore {
    entities: HashMap<Ulid, Entity>,
    by_permalink: HashMap<String, Ulid>,
    by_title: HashMap<String, Vec<Ulid>>,
    by_path: HashMap<String, Ulid>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or fully replace an entity by identity
    ///
    /// Fails with `PermalinkConflict` if another entity holds the permalink
    /// (or the file path); the store is left unchanged in that case.
    pub fn put(&mut self, entity: Entity) -> Result<Option<Entity>> {
        if let Some(existing) = self.by_permalink.get(&entity.permalink) {
            if *existing != entity.id {
                return Err(GraphError::PermalinkConflict {
                    permalink: entity.permalink.clone(),
                    existing: *existing,
                    incoming: entity.id,
                });
            }
        }
        if let Some(existing) = self.by_path.get(&entity.file_path) {
            if *existing != entity.id {
                return Err(GraphError::PermalinkConflict {
                    permalink: entity.file_path.clone(),
                    existing: *existing,
                    incoming: entity.id,
                });
            }
        }

        let previous = self.remove_entry(&entity.id);

        self.by_permalink.insert(entity.permalink.clone(), entity.id);
        self.by_path.insert(entity.file_path.clone(), entity.id);
        self.by_title
            .entry(normalize_title(&entity.title))
            .or_default()
            .push(entity.id);
        self.entities.insert(entity.id, entity);

        Ok(previous)
    }

    pub fn get(&self, id: &Ulid) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn get_by_permalink(&self, permalink: &str) -> Option<&Entity> {
        self.by_permalink
            .get(permalink)
            .and_then(|id| self.entities.get(id))
    }

    pub fn get_by_path(&self, path: &str) -> Option<&Entity> {
        self.by_path.get(path).and_then(|id| self.entities.get(id))
    }

    /// Ids of entities whose title matches case-insensitively, in insertion order
    pub fn find_by_title(&self, title: &str) -> &[Ulid] {
        self.by_title
            .get(&normalize_title(title))
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// Id holding a permalink, if any
    pub fn permalink_owner(&self, permalink: &str) -> Option<Ulid> {
        self.by_permalink.get(permalink).copied()
    }

    /// Id backed by a file path, if any
    pub fn path_owner(&self, path: &str) -> Option<Ulid> {
        self.by_path.get(path).copied()
    }

    /// Remove an entity and all its index entries
    pub fn delete(&mut self, id: &Ulid) -> Option<Entity> {
        self.remove_entry(id)
    }

    /// Update the resolution state of one relation in place
    ///
    /// Returns false if the entity or relation index does not exist.
    pub fn set_relation_target(&mut self, id: &Ulid, index: usize, target: LinkTarget) -> bool {
        match self
            .entities
            .get_mut(id)
            .and_then(|e| e.relations.get_mut(index))
        {
            Some(relation) => {
                relation.target = target;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// All entities ordered by permalink
    pub fn sorted(&self) -> Vec<&Entity> {
        let mut all: Vec<&Entity> = self.entities.values().collect();
        all.sort_by(|a, b| a.permalink.cmp(&b.permalink));
        all
    }

    fn remove_entry(&mut self, id: &Ulid) -> Option<Entity> {
        let entity = self.entities.remove(id)?;

        if self.by_permalink.get(&entity.permalink) == Some(id) {
            self.by_permalink.remove(&entity.permalink);
        }
        if self.by_path.get(&entity.file_path) == Some(id) {
            self.by_path.remove(&entity.file_path);
        }

        let key = normalize_title(&entity.title);
        if let Some(ids) = self.by_title.get_mut(&key) {
            ids.retain(|other| other != id);
            if ids.is_empty() {
                self.by_title.remove(&key);
            }
        }

        Some(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::Relation;
    use chrono::Utc;

    fn entity(title: &str, permalink: &str) -> Entity {
        Entity::new(title, permalink, Utc::now())
    }

    #[test]
    fn test_put_and_get() -> Result<()> {
        let mut store = EntityStore::new();
        let e = entity("Meeting", "notes/meeting");
        let id = e.id;

        assert!(store.put(e)?.is_none());
        assert_eq!(store.get(&id).unwrap().title, "Meeting");
        assert_eq!(store.get_by_permalink("notes/meeting").unwrap().id, id);
        assert_eq!(store.get_by_path("notes/meeting.md").unwrap().id, id);
        assert_eq!(store.find_by_title("MEETING"), &[id]);
        Ok(())
    }

    #[test]
    fn test_put_replaces_and_returns_previous() -> Result<()> {
        let mut store = EntityStore::new();
        let mut e = entity("Old Title", "notes/meeting");
        let id = e.id;
        store.put(e.clone())?;

        e.title = "New Title".to_string();
        let previous = store.put(e)?.expect("previous version");

        assert_eq!(previous.title, "Old Title");
        assert!(store.find_by_title("old title").is_empty());
        assert_eq!(store.find_by_title("new title"), &[id]);
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn test_permalink_conflict() -> Result<()> {
        let mut store = EntityStore::new();
        store.put(entity("A", "notes/a"))?;

        let err = store.put(entity("B", "notes/a")).unwrap_err();
        assert!(matches!(err, GraphError::PermalinkConflict { .. }));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_by_permalink("notes/a").unwrap().title, "A");
        Ok(())
    }

    #[test]
    fn test_permalink_change_frees_old_key() -> Result<()> {
        let mut store = EntityStore::new();
        let mut e = entity("A", "notes/a");
        store.put(e.clone())?;

        e.permalink = "notes/b".to_string();
        store.put(e)?;
        assert!(store.get_by_permalink("notes/a").is_none());
        assert!(store.get_by_permalink("notes/b").is_some());
        Ok(())
    }

    #[test]
    fn test_shared_titles() -> Result<()> {
        let mut store = EntityStore::new();
        let a = entity("Meeting", "notes/meeting");
        let b = entity("meeting", "notes/meeting-2");
        let (a_id, b_id) = (a.id, b.id);
        store.put(a)?;
        store.put(b)?;

        assert_eq!(store.find_by_title(" Meeting "), &[a_id, b_id]);

        store.delete(&a_id);
        assert_eq!(store.find_by_title("meeting"), &[b_id]);
        Ok(())
    }

    #[test]
    fn test_title_lookup_collapses_whitespace() -> Result<()> {
        let mut store = EntityStore::new();
        let e = entity("Weekly Meeting", "notes/weekly-meeting");
        let id = e.id;
        store.put(e)?;

        assert_eq!(store.find_by_title("weekly   MEETING"), &[id]);
        assert_eq!(store.find_by_title("\tWeekly\nMeeting "), &[id]);
        assert!(store.find_by_title("WeeklyMeeting").is_empty());
        Ok(())
    }

    #[test]
    fn test_delete_clears_indices() -> Result<()> {
        let mut store = EntityStore::new();
        let e = entity("A", "notes/a");
        let id = e.id;
        store.put(e)?;

        assert!(store.delete(&id).is_some());
        assert!(store.get(&id).is_none());
        assert!(store.get_by_permalink("notes/a").is_none());
        assert!(store.get_by_path("notes/a.md").is_none());
        assert!(store.find_by_title("a").is_empty());
        assert!(store.delete(&id).is_none());
        Ok(())
    }

    #[test]
    fn test_set_relation_target() -> Result<()> {
        let mut store = EntityStore::new();
        let e = entity("A", "a").with_relations(vec![Relation::inline("B")]);
        let id = e.id;
        store.put(e)?;

        let target = Ulid::new();
        assert!(store.set_relation_target(&id, 0, LinkTarget::Resolved(target)));
        assert_eq!(store.get(&id).unwrap().relations[0].target_id(), Some(target));
        assert!(!store.set_relation_target(&id, 5, LinkTarget::Dangling));
        Ok(())
    }

    #[test]
    fn test_sorted() -> Result<()> {
        let mut store = EntityStore::new();
        store.put(entity("B", "b"))?;
        store.put(entity("A", "a"))?;
        let permalinks: Vec<_> = store.sorted().iter().map(|e| e.permalink.clone()).collect();
        assert_eq!(permalinks, vec!["a", "b"]);
        Ok(())
    }
}
