//! Entity - Core data structure
//!
//! An entity is one note in the knowledge base, backed by exactly one file.
//!
//! # Key Properties
//! - **id**: ULID, assigned once, never changed by edits
//! - **permalink**: unique slug across the whole store (e.g. `notes/api-design`)
//! - **observations**: categorized statements (`- [decision] Use PostgreSQL #db`)
//! - **relations**: typed links to other notes (`- implements [[Auth Spec]]`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Relation type used for `[[links]]` found inline in the body
pub const DEFAULT_RELATION_TYPE: &str = "relates_to";

/// Entity type used when neither the caller nor the frontmatter names one
pub const DEFAULT_ENTITY_TYPE: &str = "note";

/// A categorized, tagged statement embedded in a note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Category from `[category]`
    pub category: String,

    /// Text with `#tag` tokens stripped
    pub content: String,

    /// Tags in order of first appearance, no duplicates
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Observation {
    pub fn new(category: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            content: content.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

impl std::fmt::Display for Observation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.category, self.content)?;
        for tag in &self.tags {
            write!(f, " #{}", tag)?;
        }
        Ok(())
    }
}

/// Resolution state of a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "id", rename_all = "snake_case")]
pub enum LinkTarget {
    /// Target title does not resolve to any entity (yet)
    #[default]
    Dangling,
    /// Target resolved to this entity
    Resolved(Ulid),
}

impl LinkTarget {
    pub fn id(&self) -> Option<Ulid> {
        match self {
            LinkTarget::Dangling => None,
            LinkTarget::Resolved(id) => Some(*id),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, LinkTarget::Resolved(_))
    }
}

/// A typed, directed edge to another note, named by the target's title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub relation_type: String,

    /// Target as written between `[[` and `]]`
    pub target_title: String,

    #[serde(default)]
    pub target: LinkTarget,
}

impl Relation {
    /// Create a dangling relation
    pub fn new(relation_type: impl Into<String>, target_title: impl Into<String>) -> Self {
        Self {
            relation_type: relation_type.into(),
            target_title: target_title.into(),
            target: LinkTarget::Dangling,
        }
    }

    /// Inline `[[link]]` relation
    pub fn inline(target_title: impl Into<String>) -> Self {
        Self::new(DEFAULT_RELATION_TYPE, target_title)
    }

    pub fn target_id(&self) -> Option<Ulid> {
        self.target.id()
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [[{}]]", self.relation_type, self.target_title)
    }
}

/// An entity - one note in the knowledge base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier (ULID)
    pub id: Ulid,

    /// Human-readable name, not required unique
    pub title: String,

    /// Unique URL-safe slug (e.g. `notes/meeting-2`)
    pub permalink: String,

    /// Open type tag (note, decision, spec, ...)
    pub entity_type: String,

    /// Backing file, relative to the knowledge-base root
    pub file_path: String,

    /// Note text after the frontmatter block
    pub body: String,

    #[serde(default)]
    pub observations: Vec<Observation>,

    #[serde(default)]
    pub relations: Vec<Relation>,

    /// Frontmatter tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Creation timestamp (immutable after first write)
    pub created_at: DateTime<Utc>,

    /// Set on every successful write
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Create a new, empty entity with a fresh id
    pub fn new(
        title: impl Into<String>,
        permalink: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let permalink = permalink.into();
        Self {
            id: Ulid::new(),
            title: title.into(),
            file_path: format!("{}.md", permalink),
            permalink,
            entity_type: DEFAULT_ENTITY_TYPE.to_string(),
            body: String::new(),
            observations: Vec::new(),
            relations: Vec::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = entity_type.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_relations(mut self, relations: Vec<Relation>) -> Self {
        self.relations = relations;
        self
    }

    /// Folder part of the permalink (`notes` for `notes/meeting`)
    pub fn folder(&self) -> &str {
        self.permalink
            .rsplit_once('/')
            .map(|(folder, _)| folder)
            .unwrap_or("")
    }

    /// Count of relations that resolved to an entity
    pub fn resolved_relation_count(&self) -> usize {
        self.relations.iter().filter(|r| r.target.is_resolved()).count()
    }

    /// Get short ID (first 8 chars)
    pub fn short_id(&self) -> String {
        self.id.to_string()[..8].to_lowercase()
    }

    /// Lightweight view used in listings and search results
    pub fn summary(&self) -> EntitySummary {
        EntitySummary {
            id: self.id,
            title: self.title.clone(),
            permalink: self.permalink.clone(),
            entity_type: self.entity_type.clone(),
            file_path: self.file_path.clone(),
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.entity_type, self.permalink, self.title)
    }
}

/// Reference to an entity without its content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub id: Ulid,
    pub title: String,
    pub permalink: String,
    pub entity_type: String,
    pub file_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entity() {
        let now = Utc::now();
        let entity = Entity::new("API Design", "notes/api-design", now);

        assert_eq!(entity.title, "API Design");
        assert_eq!(entity.permalink, "notes/api-design");
        assert_eq!(entity.file_path, "notes/api-design.md");
        assert_eq!(entity.entity_type, DEFAULT_ENTITY_TYPE);
        assert_eq!(entity.created_at, entity.updated_at);
    }

    #[test]
    fn test_folder() {
        let now = Utc::now();
        assert_eq!(Entity::new("A", "notes/deep/a", now).folder(), "notes/deep");
        assert_eq!(Entity::new("A", "a", now).folder(), "");
    }

    #[test]
    fn test_unique_ids() {
        let now = Utc::now();
        let a = Entity::new("A", "a", now);
        let b = Entity::new("A", "a", now);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_relation_defaults_to_dangling() {
        let rel = Relation::inline("Auth Spec");
        assert_eq!(rel.relation_type, DEFAULT_RELATION_TYPE);
        assert_eq!(rel.target, LinkTarget::Dangling);
        assert!(rel.target_id().is_none());
    }

    #[test]
    fn test_resolved_relation_count() {
        let now = Utc::now();
        let mut resolved = Relation::new("implements", "B");
        resolved.target = LinkTarget::Resolved(Ulid::new());
        let entity = Entity::new("A", "a", now)
            .with_relations(vec![resolved, Relation::inline("C")]);
        assert_eq!(entity.resolved_relation_count(), 1);
    }

    #[test]
    fn test_observation_display() {
        let obs = Observation::new("decision", "Use PostgreSQL")
            .with_tags(vec!["database".to_string(), "technical".to_string()]);
        assert_eq!(obs.to_string(), "[decision] Use PostgreSQL #database #technical");
    }

    #[test]
    fn test_link_target_serde() {
        let id = Ulid::new();
        let json = serde_json::to_value(LinkTarget::Resolved(id)).unwrap();
        assert_eq!(json["state"], "resolved");
        assert_eq!(json["id"], id.to_string());

        let dangling = serde_json::to_value(LinkTarget::Dangling).unwrap();
        assert_eq!(dangling["state"], "dangling");
    }

    #[test]
    fn test_short_id() {
        let entity = Entity::new("A", "a", Utc::now());
        let short = entity.short_id();
        assert_eq!(short.len(), 8);
        assert_eq!(short, short.to_lowercase());
    }
}
