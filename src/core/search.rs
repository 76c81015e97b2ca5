//! Search Index - Full-text index over entities
//!
//! Uses SQLite FTS5 with BM25 ranking.
//!
//! # Key Points
//! - Derived cache: rebuilt from the entity store by calling `index` per entity
//! - One document per entity, replaced wholesale on every write
//! - Query words are quoted and prefix-matched, joined with OR
//! - Ranking: bm25 with title > tags > observations > body, ties by permalink

use std::path::{Path, PathBuf};

use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, Row};
use serde::Serialize;
use ulid::Ulid;

use super::entity::Entity;
use super::error::{GraphError, Result};

/// Default maximum number of hits
pub const DEFAULT_LIMIT: usize = 10;

/// Searchable projection of an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchDocument {
    pub id: Ulid,
    pub permalink: String,
    pub entity_type: String,
    pub title: String,
    pub body: String,
    pub tags: String,
    pub observations: String,
}

impl SearchDocument {
    pub fn from_entity(entity: &Entity) -> Self {
        let mut tags: Vec<&str> = entity.tags.iter().map(|t| t.as_str()).collect();
        for observation in &entity.observations {
            for tag in &observation.tags {
                if !tags.contains(&tag.as_str()) {
                    tags.push(tag);
                }
            }
        }

        let observations = entity
            .observations
            .iter()
            .map(|o| format!("{} {}", o.category, o.content))
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            id: entity.id,
            permalink: entity.permalink.clone(),
            entity_type: entity.entity_type.clone(),
            title: entity.title.clone(),
            body: entity.body.clone(),
            tags: tags.join(" "),
            observations,
        }
    }
}

/// Search query with optional filters
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Full-text query
    pub text: String,

    /// Maximum results
    pub limit: usize,

    /// Permalink prefix filter (`specs` matches `specs/auth`)
    pub path_prefix: Option<String>,

    /// Allowed entity types, empty = all
    pub entity_types: Vec<String>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            limit: DEFAULT_LIMIT,
            path_prefix: None,
            entity_types: Vec::new(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_path(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }

    pub fn with_types(mut self, types: Vec<String>) -> Self {
        self.entity_types = types;
        self
    }
}

/// One ranked result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: Ulid,
    pub permalink: String,
    pub title: String,
    pub entity_type: String,
    /// Higher is better
    pub score: f64,
    pub excerpt: String,
}

/// FTS5-backed index
pub struct SearchIndex {
    conn: Connection,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex").field("path", &self.path).finish()
    }
}

impl SearchIndex {
    /// Open or create an on-disk index
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| GraphError::io(parent.display().to_string(), e))?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;

        let index = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        index.init_schema()?;
        Ok(index)
    }

    /// Open an in-memory index
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let index = Self { conn, path: None };
        index.init_schema()?;
        Ok(index)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE VIRTUAL TABLE IF NOT EXISTS notes_fts USING fts5(
                id UNINDEXED,
                permalink UNINDEXED,
                entity_type UNINDEXED,
                title,
                body,
                tags,
                observations,
                tokenize = 'unicode61'
            );
            "#,
        )?;
        Ok(())
    }

    /// Build or replace the document for `entity`
    pub fn index(&self, entity: &Entity) -> Result<()> {
        let doc = SearchDocument::from_entity(entity);
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM notes_fts WHERE id = ?1", [doc.id.to_string()])?;
        tx.execute(
            r#"
            INSERT INTO notes_fts (id, permalink, entity_type, title, body, tags, observations)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                doc.id.to_string(),
                doc.permalink,
                doc.entity_type,
                doc.title,
                doc.body,
                doc.tags,
                doc.observations,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Remove the document for `id`; returns whether one existed
    pub fn remove(&self, id: &Ulid) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM notes_fts WHERE id = ?1", [id.to_string()])?;
        Ok(removed > 0)
    }

    /// Replace the whole index with documents for `entities`
    pub fn rebuild<'a>(&self, entities: impl IntoIterator<Item = &'a Entity>) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM notes_fts", [])?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO notes_fts (id, permalink, entity_type, title, body, tags, observations)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            for entity in entities {
                let doc = SearchDocument::from_entity(entity);
                stmt.execute(params![
                    doc.id.to_string(),
                    doc.permalink,
                    doc.entity_type,
                    doc.title,
                    doc.body,
                    doc.tags,
                    doc.observations,
                ])?;
                count += 1;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM notes_fts", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Every document, ordered by id
    pub fn documents(&self) -> Result<Vec<SearchDocument>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, permalink, entity_type, title, body, tags, observations
            FROM notes_fts
            ORDER BY id
            "#,
        )?;
        let docs = stmt
            .query_map([], |row| {
                Ok(SearchDocument {
                    id: row_ulid(row, 0)?,
                    permalink: row.get(1)?,
                    entity_type: row.get(2)?,
                    title: row.get(3)?,
                    body: row.get(4)?,
                    tags: row.get(5)?,
                    observations: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(docs)
    }

    /// Ranked full-text search
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let fts_query = escape_fts_query(&query.text);
        if fts_query.is_empty() || query.limit == 0 {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r#"
            SELECT id, permalink, title, entity_type,
                   bm25(notes_fts, 0.0, 0.0, 0.0, 10.0, 1.0, 5.0, 2.0) AS rank,
                   snippet(notes_fts, -1, '**', '**', '...', 24) AS excerpt
            FROM notes_fts
            WHERE notes_fts MATCH ?
            "#,
        );
        let mut values: Vec<Value> = vec![Value::Text(fts_query)];

        if let Some(prefix) = query
            .path_prefix
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
        {
            sql.push_str(" AND (permalink = ? OR substr(permalink, 1, ?) = ?)");
            let with_slash = format!("{}/", prefix);
            values.push(Value::Text(prefix.to_string()));
            values.push(Value::Integer(with_slash.chars().count() as i64));
            values.push(Value::Text(with_slash));
        }

        if !query.entity_types.is_empty() {
            let placeholders = vec!["?"; query.entity_types.len()].join(", ");
            sql.push_str(&format!(" AND entity_type IN ({})", placeholders));
            values.extend(query.entity_types.iter().cloned().map(Value::Text));
        }

        sql.push_str(" ORDER BY rank, permalink LIMIT ?");
        values.push(Value::Integer(query.limit as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let hits = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                let rank: f64 = row.get(4)?;
                Ok(SearchHit {
                    id: row_ulid(row, 0)?,
                    permalink: row.get(1)?,
                    title: row.get(2)?,
                    entity_type: row.get(3)?,
                    score: -rank,
                    excerpt: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(hits)
    }
}

fn row_ulid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Ulid> {
    let raw: String = row.get(idx)?;
    Ulid::from_string(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Convert free text to an FTS5 query
///
/// Each word is quoted (so `-`, `:` and friends are not operators) and
/// prefix-matched; words are joined with OR. Words without any alphanumeric
/// character are dropped.
fn escape_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .filter(|w| w.chars().any(|c| c.is_alphanumeric()))
        .map(|w| format!("\"{}\"*", w.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::Observation;
    use chrono::Utc;

    fn entity(title: &str, permalink: &str, body: &str) -> Entity {
        let mut e = Entity::new(title, permalink, Utc::now());
        e.body = body.to_string();
        e
    }

    #[test]
    fn test_escape_fts_query() {
        assert_eq!(escape_fts_query("rest api"), "\"rest\"* OR \"api\"*");
        assert_eq!(escape_fts_query("say \"hi\""), "\"say\"* OR \"\"\"hi\"\"\"*");
        assert_eq!(escape_fts_query("  - ! "), "");
    }

    #[test]
    fn test_index_and_search() -> Result<()> {
        let index = SearchIndex::open_memory()?;
        index.index(&entity("API Design", "notes/api-design", "REST endpoints"))?;
        index.index(&entity("Groceries", "notes/groceries", "milk and eggs"))?;

        let hits = index.search(&SearchQuery::new("rest"))?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].permalink, "notes/api-design");
        assert!(hits[0].score > 0.0);
        Ok(())
    }

    #[test]
    fn test_prefix_matching() -> Result<()> {
        let index = SearchIndex::open_memory()?;
        index.index(&entity("Authentication", "specs/authentication", ""))?;

        let hits = index.search(&SearchQuery::new("auth"))?;
        assert_eq!(hits.len(), 1);
        Ok(())
    }

    #[test]
    fn test_title_ranks_above_body() -> Result<()> {
        let index = SearchIndex::open_memory()?;
        index.index(&entity("Notes", "a/body", "kafka kafka is mentioned here"))?;
        index.index(&entity("Kafka", "b/title", "streams"))?;

        let hits = index.search(&SearchQuery::new("kafka"))?;
        assert_eq!(hits[0].permalink, "b/title");
        assert_eq!(hits.len(), 2);
        Ok(())
    }

    #[test]
    fn test_observations_and_tags_are_searchable() -> Result<()> {
        let index = SearchIndex::open_memory()?;
        let mut e = entity("Storage", "notes/storage", "");
        e.observations = vec![Observation::new("decision", "Use PostgreSQL")
            .with_tags(vec!["database".to_string()])];
        index.index(&e)?;

        assert_eq!(index.search(&SearchQuery::new("postgresql"))?.len(), 1);
        assert_eq!(index.search(&SearchQuery::new("database"))?.len(), 1);
        assert_eq!(index.search(&SearchQuery::new("decision"))?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_reindex_replaces_document() -> Result<()> {
        let index = SearchIndex::open_memory()?;
        let mut e = entity("Topic", "notes/topic", "alpha");
        index.index(&e)?;
        e.body = "beta".to_string();
        index.index(&e)?;

        assert_eq!(index.len()?, 1);
        assert!(index.search(&SearchQuery::new("alpha"))?.is_empty());
        assert_eq!(index.search(&SearchQuery::new("beta"))?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_remove_and_rebuild_empty() -> Result<()> {
        let index = SearchIndex::open_memory()?;
        let a = entity("A", "a", "text");
        index.index(&a)?;
        index.index(&entity("B", "b", "text"))?;

        assert!(index.remove(&a.id)?);
        assert!(!index.remove(&a.id)?);
        assert_eq!(index.len()?, 1);

        assert_eq!(index.rebuild(std::iter::empty())?, 0);
        assert!(index.is_empty()?);
        Ok(())
    }

    #[test]
    fn test_filters() -> Result<()> {
        let index = SearchIndex::open_memory()?;
        index.index(&entity("Cache", "specs/cache", "redis"))?;
        index.index(&entity("Cache", "specs-old/cache", "redis"))?;
        index.index(&entity("Cache", "notes/cache", "redis").with_type("decision"))?;

        let scoped = index.search(&SearchQuery::new("redis").with_path("specs"))?;
        let permalinks: Vec<_> = scoped.iter().map(|h| h.permalink.as_str()).collect();
        assert_eq!(permalinks, vec!["specs/cache"]);

        let typed = index.search(&SearchQuery::new("redis").with_types(vec!["decision".into()]))?;
        assert_eq!(typed.len(), 1);
        assert_eq!(typed[0].permalink, "notes/cache");
        Ok(())
    }

    #[test]
    fn test_ties_break_by_permalink_and_limit() -> Result<()> {
        let index = SearchIndex::open_memory()?;
        for p in ["c", "a", "b"] {
            index.index(&entity("Same", p, "same body"))?;
        }
        let hits = index.search(&SearchQuery::new("same").with_limit(2))?;
        let permalinks: Vec<_> = hits.iter().map(|h| h.permalink.as_str()).collect();
        assert_eq!(permalinks, vec!["a", "b"]);
        Ok(())
    }

    #[test]
    fn test_empty_query() -> Result<()> {
        let index = SearchIndex::open_memory()?;
        index.index(&entity("A", "a", "text"))?;
        assert!(index.search(&SearchQuery::new("   "))?.is_empty());
        Ok(())
    }

    #[test]
    fn test_rebuild_and_documents() -> Result<()> {
        let index = SearchIndex::open_memory()?;
        index.index(&entity("Stale", "stale", ""))?;

        let fresh = vec![entity("A", "a", "one"), entity("B", "b", "two")];
        assert_eq!(index.rebuild(fresh.iter())?, 2);

        let docs = index.documents()?;
        assert_eq!(docs.len(), 2);
        let mut expected: Vec<_> = fresh.iter().map(SearchDocument::from_entity).collect();
        expected.sort_by_key(|d| d.id.to_string());
        assert_eq!(docs, expected);
        Ok(())
    }

    #[test]
    fn test_on_disk_index_persists() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("search.db");
        {
            let index = SearchIndex::open(&path)?;
            index.index(&entity("Persisted", "persisted", ""))?;
        }
        let index = SearchIndex::open(&path)?;
        assert_eq!(index.len()?, 1);
        Ok(())
    }
}
