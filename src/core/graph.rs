//! Knowledge Graph - The engine tying parser, store, links and search together
//!
//! # Architecture
//!
//! ```text
//!   write(note) ──> parse ──> render file ──> FileAccess
//!                                   │
//!                                   └──> commit: search.index → store.put → links
//!
//!   read / search / build_context ──> resolve ──> store (+ links | search | files)
//! ```
//!
//! # Key Points
//! - The Markdown files are the only durable state; everything else is derived
//!   and can be rebuilt with [`KnowledgeGraph::rebuild_index`]
//! - Writes to the same entity are serialized by a per-permalink lock
//! - A commit holds the graph lock and the search lock together, so a reader
//!   never sees relations updated without the matching search document
//! - Lock order is always graph state, then search
//! - File I/O happens outside the graph lock; a permalink chosen for a create
//!   is reserved until the commit so concurrent creates never collide

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::{debug, info, warn};
use ulid::Ulid;

use super::context::{self, ContextEntry};
use super::entity::{Entity, EntitySummary, Observation, Relation, DEFAULT_ENTITY_TYPE};
use super::error::{GraphError, Result};
use super::format::{self, Frontmatter};
use super::fs::{Clock, FileAccess, LocalFiles, SystemClock};
use super::links::{Edge, LinkIndex, PendingLink};
use super::parser::{self, ParseWarning, WarningKind};
use super::permalink::{self, KbPath};
use super::resolver;
use super::search::{SearchDocument, SearchHit, SearchIndex, SearchQuery};
use super::store::EntityStore;

/// Glob selecting every note under the root
pub const NOTE_PATTERN: &str = "**/*.md";

/// Engine-wide defaults
#[derive(Debug, Clone)]
pub struct GraphSettings {
    /// Folder used by `write` when the caller names none
    pub default_folder: String,
    pub default_entity_type: String,
    /// Upper bound applied to every `build_context` depth
    pub max_depth: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            default_folder: String::new(),
            default_entity_type: DEFAULT_ENTITY_TYPE.to_string(),
            max_depth: 5,
        }
    }
}

/// Input of [`KnowledgeGraph::write`]
#[derive(Debug, Clone, Default)]
pub struct NoteInput {
    pub title: String,
    /// Note text; a leading frontmatter block is merged and stripped
    pub content: String,
    pub folder: Option<String>,
    pub tags: Option<Vec<String>>,
    pub entity_type: Option<String>,
    /// Existing entity to replace; `None` creates a new one
    pub identifier: Option<String>,
}

impl NoteInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn in_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn replacing(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }
}

/// Result of [`KnowledgeGraph::write`]
#[derive(Debug, Clone, Serialize)]
pub struct WriteOutcome {
    pub id: Ulid,
    pub permalink: String,
    pub file_path: String,
    pub observations: Vec<Observation>,
    /// Relations with their resolution state after the commit
    pub relations: Vec<Relation>,
    pub created: bool,
    pub warnings: Vec<ParseWarning>,
}

/// One row of [`KnowledgeGraph::list_entities`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityListing {
    pub path: String,
    /// `None` for a file the store does not know (not yet indexed)
    pub entity: Option<EntitySummary>,
}

/// What [`KnowledgeGraph::sync_file`] did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "permalink", rename_all = "snake_case")]
pub enum SyncOutcome {
    Indexed(String),
    Removed(String),
    Skipped,
}

/// Summary of a full rebuild
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub files: usize,
    pub entities: usize,
    pub edges: usize,
    pub pending: usize,
    /// Files whose frontmatter was completed or corrected
    pub rewritten: usize,
    pub warnings: usize,
}

/// Counts over the current graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub entities: usize,
    pub observations: usize,
    pub relations: usize,
    pub resolved: usize,
    pub pending: usize,
    pub documents: usize,
    pub by_type: BTreeMap<String, usize>,
}

/// Comparable dump of every derived structure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSnapshot {
    /// Ordered by permalink
    pub entities: Vec<Entity>,
    pub edges: Vec<Edge>,
    pub incoming: Vec<Edge>,
    pub pending: Vec<PendingLink>,
    pub documents: Vec<SearchDocument>,
}

#[derive(Debug, Default)]
struct GraphState {
    store: EntityStore,
    links: LinkIndex,
    /// Permalinks chosen by in-flight creates
    reserved: HashSet<String>,
}

/// Per-key mutual exclusion
#[derive(Debug, Default)]
struct WriteLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WriteLocks {
    fn get(&self, key: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(lock_error)?;
        Ok(locks.entry(key.to_string()).or_default().clone())
    }
}

fn lock_error<E: std::fmt::Display>(e: E) -> GraphError {
    GraphError::Lock(e.to_string())
}

/// A file turned into an entity, plus the corrected text if it needs rewriting
struct Ingested {
    entity: Entity,
    rewrite: Option<String>,
    warnings: Vec<ParseWarning>,
}

/// The process-scoped knowledge graph
pub struct KnowledgeGraph {
    files: Box<dyn FileAccess>,
    clock: Box<dyn Clock>,
    settings: GraphSettings,
    state: RwLock<GraphState>,
    search: Mutex<SearchIndex>,
    write_locks: WriteLocks,
    /// Writes hold this shared, `rebuild_index` exclusively
    maintenance: RwLock<()>,
}

impl std::fmt::Debug for KnowledgeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeGraph")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl KnowledgeGraph {
    /// Empty engine; call [`rebuild_index`](Self::rebuild_index) to load existing notes
    pub fn new(
        files: Box<dyn FileAccess>,
        clock: Box<dyn Clock>,
        search: SearchIndex,
        settings: GraphSettings,
    ) -> Self {
        Self {
            files,
            clock,
            settings,
            state: RwLock::new(GraphState::default()),
            search: Mutex::new(search),
            write_locks: WriteLocks::default(),
            maintenance: RwLock::new(()),
        }
    }

    /// Engine over a directory of notes, loaded and ready
    ///
    /// `search_db` selects an on-disk index; `None` keeps it in memory.
    pub fn open_local(root: &Path, settings: GraphSettings, search_db: Option<&Path>) -> Result<Self> {
        let graph = Self::local(root, settings, search_db)?;
        graph.rebuild_index()?;
        Ok(graph)
    }

    /// Engine over a directory of notes, not yet loaded
    pub fn local(root: &Path, settings: GraphSettings, search_db: Option<&Path>) -> Result<Self> {
        let search = match search_db {
            Some(path) => SearchIndex::open(path)?,
            None => SearchIndex::open_memory()?,
        };
        Ok(Self::new(
            Box::new(LocalFiles::new(root)),
            Box::new(SystemClock),
            search,
            settings,
        ))
    }

    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    // ==================== Write path ====================

    /// Create a note, or replace one by identity when `identifier` is set
    pub fn write(&self, input: NoteInput) -> Result<WriteOutcome> {
        let _gate = self.maintenance.read().map_err(lock_error)?;

        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(GraphError::InvalidInput("title must not be empty".to_string()));
        }

        let supplied = parser::parse(&input.content);
        let mut warnings: Vec<ParseWarning> = supplied
            .warnings
            .iter()
            .filter(|w| {
                matches!(
                    w.kind,
                    WarningKind::InvalidFrontmatter | WarningKind::UnterminatedFrontmatter
                )
            })
            .cloned()
            .collect();
        let supplied_fm = supplied.frontmatter;
        let body = supplied.body;

        let folder = input
            .folder
            .clone()
            .unwrap_or_else(|| self.settings.default_folder.clone());

        let key = match &input.identifier {
            Some(identifier) => {
                let state = self.read_state()?;
                resolver::resolve_identifier(&state.store, identifier)?
                    .permalink
                    .clone()
            }
            None => permalink::generate(&folder, &title),
        };
        let key_lock = self.write_locks.get(&key)?;
        let _guard = key_lock.lock().map_err(lock_error)?;

        let now = self.clock.now();

        // Plan under the graph lock: identity, permalink, rendered text
        let (mut entity, text, reservation) = {
            let mut state = self.write_state()?;

            let existing = match &input.identifier {
                Some(identifier) => Some(resolver::resolve_identifier(&state.store, identifier)?.clone()),
                None => None,
            };

            let (id, permalink, file_path, created_at) = match &existing {
                Some(e) => (e.id, e.permalink.clone(), e.file_path.clone(), e.created_at),
                None => {
                    let requested = supplied_fm
                        .permalink
                        .as_deref()
                        .map(|p| permalink::slugify_folder(&permalink::normalize_identifier(p)))
                        .filter(|p| !p.is_empty());
                    // An untracked file at the candidate path is never overwritten
                    let on_disk = |candidate: &str| self.files.exists(&format!("{}.md", candidate));
                    let permalink = match requested {
                        Some(p) => {
                            resolver::unique_permalink(&state.store, &state.reserved, &p, None, on_disk)?
                        }
                        None => resolver::generate_permalink(
                            &state.store,
                            &state.reserved,
                            &folder,
                            &title,
                            None,
                            on_disk,
                        )?,
                    };
                    let file_path = format!("{}.md", permalink);
                    (Ulid::new(), permalink, file_path, supplied_fm.created.unwrap_or(now))
                }
            };

            let entity_type = input
                .entity_type
                .clone()
                .filter(|t| !t.trim().is_empty())
                .or_else(|| supplied_fm.entity_type.clone())
                .or_else(|| existing.as_ref().map(|e| e.entity_type.clone()))
                .unwrap_or_else(|| self.settings.default_entity_type.clone());

            let tags = match &input.tags {
                Some(tags) => format::normalize_tags(tags),
                None if !supplied_fm.tags.is_empty() => supplied_fm.tags.clone(),
                None => existing.as_ref().map(|e| e.tags.clone()).unwrap_or_default(),
            };

            let mut entity = Entity::new(title.clone(), permalink.clone(), now)
                .with_type(entity_type.trim())
                .with_tags(tags);
            entity.id = id;
            entity.file_path = file_path;
            entity.created_at = created_at;

            let frontmatter = Frontmatter::for_entity(&entity, supplied_fm.extra.clone());
            let text = format::render(&frontmatter, &body)?;

            let reservation = if existing.is_none() {
                state.reserved.insert(permalink.clone());
                Some(permalink)
            } else {
                None
            };
            (entity, text, reservation)
        };

        // Entity fields come from the rendered text so they match a rebuild
        let parsed = parser::parse(&text);
        entity.body = parsed.body;
        entity.observations = parsed.observations;
        entity.relations = parsed.relations;
        warnings.extend(parsed.warnings);
        for warning in &warnings {
            warn!(permalink = %entity.permalink, line = warning.line, kind = ?warning.kind, "{}", warning.text);
        }

        if let Err(e) = self.files.write_file(&entity.file_path, &text) {
            if let Some(permalink) = &reservation {
                self.release(permalink);
            }
            return Err(e);
        }

        let (committed, created) = self.commit(entity, reservation.as_deref())?;
        debug!(
            permalink = %committed.permalink,
            created,
            observations = committed.observations.len(),
            relations = committed.relations.len(),
            "note written"
        );

        Ok(WriteOutcome {
            id: committed.id,
            permalink: committed.permalink,
            file_path: committed.file_path,
            observations: committed.observations,
            relations: committed.relations,
            created,
            warnings,
        })
    }

    /// Delete the note and its file; returns what was removed
    pub fn delete(&self, identifier: &str) -> Result<EntitySummary> {
        let _gate = self.maintenance.read().map_err(lock_error)?;

        let key = {
            let state = self.read_state()?;
            resolver::resolve_identifier(&state.store, identifier)?
                .permalink
                .clone()
        };
        let key_lock = self.write_locks.get(&key)?;
        let _guard = key_lock.lock().map_err(lock_error)?;

        let summary = {
            let state = self.read_state()?;
            resolver::resolve_identifier(&state.store, identifier)?.summary()
        };

        match self.files.delete_file(&summary.file_path) {
            Ok(()) => {}
            Err(e) if e.is_missing_file() => {
                debug!(path = %summary.file_path, "file already gone");
            }
            Err(e) => return Err(e),
        }

        self.remove_entity(summary.id)?;
        debug!(permalink = %summary.permalink, "note deleted");
        Ok(summary)
    }

    /// Re-index one file after an external change
    ///
    /// A missing file drops its entity. Non-Markdown paths are skipped.
    pub fn sync_file(&self, path: &str) -> Result<SyncOutcome> {
        let _gate = self.maintenance.read().map_err(lock_error)?;

        let path = path.trim().trim_matches('/').replace('\\', "/");
        if !path.ends_with(".md") {
            return Ok(SyncOutcome::Skipped);
        }

        let key = {
            let state = self.read_state()?;
            state
                .store
                .get_by_path(&path)
                .map(|e| e.permalink.clone())
                .unwrap_or_else(|| path.clone())
        };
        let key_lock = self.write_locks.get(&key)?;
        let _guard = key_lock.lock().map_err(lock_error)?;

        let text = match self.files.read_file(&path) {
            Ok(text) => text,
            Err(e) if e.is_missing_file() => {
                let existing = {
                    let state = self.read_state()?;
                    state.store.get_by_path(&path).map(|e| (e.id, e.permalink.clone()))
                };
                return match existing {
                    Some((id, permalink)) => {
                        self.remove_entity(id)?;
                        debug!(%path, %permalink, "file removed, entity dropped");
                        Ok(SyncOutcome::Removed(permalink))
                    }
                    None => Ok(SyncOutcome::Skipped),
                };
            }
            Err(e) => return Err(e),
        };

        let now = self.clock.now();
        let (ingested, reservation) = {
            let mut state = self.write_state()?;
            let existing = state.store.get_by_path(&path).cloned();
            let id = existing.as_ref().map(|e| e.id).unwrap_or_else(Ulid::new);
            let ingested = ingest(
                &state.store,
                &state.reserved,
                &self.settings,
                &path,
                &text,
                id,
                existing.as_ref(),
                now,
            )?;

            let permalink = ingested.entity.permalink.clone();
            let reservation = if existing.as_ref().map(|e| &e.permalink) != Some(&permalink) {
                state.reserved.insert(permalink.clone());
                Some(permalink)
            } else {
                None
            };
            (ingested, reservation)
        };

        for warning in &ingested.warnings {
            warn!(%path, line = warning.line, kind = ?warning.kind, "{}", warning.text);
        }

        if let Some(text) = &ingested.rewrite {
            if let Err(e) = self.files.write_file(&path, text) {
                if let Some(permalink) = &reservation {
                    self.release(permalink);
                }
                return Err(e);
            }
            info!(%path, "frontmatter completed");
        }

        let (committed, _) = self.commit(ingested.entity, reservation.as_deref())?;
        Ok(SyncOutcome::Indexed(committed.permalink))
    }

    /// Rebuild store, links and search from the files
    ///
    /// Files are replayed through the write path in sorted discovery order.
    /// Entity ids are re-bound by file path so they survive the rebuild.
    pub fn rebuild_index(&self) -> Result<RebuildReport> {
        let _gate = self.maintenance.write().map_err(lock_error)?;

        let paths = self.files.list_files(NOTE_PATTERN)?;
        let previous: HashMap<String, Entity> = {
            let state = self.read_state()?;
            state
                .store
                .iter()
                .map(|e| (e.file_path.clone(), e.clone()))
                .collect()
        };

        let now = self.clock.now();
        let reserved = HashSet::new();
        let mut store = EntityStore::new();
        let mut links = LinkIndex::new();
        let mut report = RebuildReport::default();

        for path in &paths {
            let text = match self.files.read_file(path) {
                Ok(text) => text,
                Err(e) if e.is_missing_file() => continue,
                Err(e) => return Err(e),
            };
            report.files += 1;

            let existing = previous.get(path);
            let id = existing.map(|e| e.id).unwrap_or_else(Ulid::new);
            let ingested = ingest(&store, &reserved, &self.settings, path, &text, id, existing, now)?;

            for warning in &ingested.warnings {
                warn!(%path, line = warning.line, kind = ?warning.kind, "{}", warning.text);
            }
            report.warnings += ingested.warnings.len();

            if let Some(text) = &ingested.rewrite {
                self.files.write_file(path, text)?;
                report.rewritten += 1;
                info!(%path, permalink = %ingested.entity.permalink, "frontmatter completed");
            }

            store.put(ingested.entity)?;
            links.apply_relations(&mut store, id);
            links.on_entity_created_or_renamed(&mut store, id);
        }

        report.entities = store.len();
        report.edges = links.edge_count();
        report.pending = links.pending_count();

        let mut state = self.write_state()?;
        let search = self.lock_search()?;
        search.rebuild(store.sorted())?;
        *state = GraphState {
            store,
            links,
            reserved: HashSet::new(),
        };

        info!(
            files = report.files,
            entities = report.entities,
            edges = report.edges,
            pending = report.pending,
            rewritten = report.rewritten,
            "index rebuilt"
        );
        Ok(report)
    }

    // ==================== Read path ====================

    /// Raw file text of the resolved note
    pub fn read(&self, identifier: &str) -> Result<String> {
        let file_path = {
            let state = self.read_state()?;
            resolver::resolve_identifier(&state.store, identifier)?
                .file_path
                .clone()
        };
        self.files.read_file(&file_path)
    }

    /// The resolved entity
    pub fn get(&self, identifier: &str) -> Result<Entity> {
        let state = self.read_state()?;
        Ok(resolver::resolve_identifier(&state.store, identifier)?.clone())
    }

    /// Entities linking to the resolved note, ordered by permalink
    pub fn backlinks(&self, identifier: &str) -> Result<Vec<EntitySummary>> {
        let state = self.read_state()?;
        let entity = resolver::resolve_identifier(&state.store, identifier)?;
        Ok(super::links::backlinks(&state.links, &state.store, &entity.id)
            .into_iter()
            .map(|e| e.summary())
            .collect())
    }

    /// Ranked full-text search over live entities
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        if query.text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let state = self.read_state()?;
        let search = self.lock_search()?;
        let hits = search.search(query)?;
        Ok(hits
            .into_iter()
            .filter(|hit| state.store.get(&hit.id).is_some())
            .collect())
    }

    /// Breadth-first context from the resolved note, depth capped by settings
    pub fn build_context(&self, identifier: &str, depth: usize) -> Result<Vec<ContextEntry>> {
        let state = self.read_state()?;
        let start = resolver::resolve_identifier(&state.store, identifier)?.id;
        let depth = depth.min(self.settings.max_depth);
        Ok(context::build_context(&state.store, &state.links, start, depth))
    }

    /// Note files up to `depth` folder levels below `prefix`
    ///
    /// Depth 1 lists the files directly in `prefix`; 0 is treated as 1.
    pub fn list_entities(&self, prefix: &str, depth: usize) -> Result<Vec<EntityListing>> {
        let base = KbPath::parse(&permalink::normalize_identifier(prefix)).to_string();

        let mut paths = Vec::new();
        for level in 1..=depth.max(1) {
            let pattern = format!("{}*.md", "*/".repeat(level - 1));
            let pattern = if base.is_empty() {
                pattern
            } else {
                format!("{}/{}", base, pattern)
            };
            paths.extend(self.files.list_files(&pattern)?);
        }
        paths.sort();
        paths.dedup();

        let state = self.read_state()?;
        Ok(paths
            .into_iter()
            .map(|path| EntityListing {
                entity: state.store.get_by_path(&path).map(|e| e.summary()),
                path,
            })
            .collect())
    }

    pub fn stats(&self) -> Result<GraphStats> {
        let state = self.read_state()?;
        let search = self.lock_search()?;

        let mut stats = GraphStats {
            entities: state.store.len(),
            pending: state.links.pending_count(),
            documents: search.len()?,
            ..Default::default()
        };
        for entity in state.store.iter() {
            stats.observations += entity.observations.len();
            stats.relations += entity.relations.len();
            stats.resolved += entity.resolved_relation_count();
            *stats.by_type.entry(entity.entity_type.clone()).or_default() += 1;
        }
        Ok(stats)
    }

    /// Consistent dump of everything derived
    pub fn snapshot(&self) -> Result<GraphSnapshot> {
        let state = self.read_state()?;
        let search = self.lock_search()?;
        Ok(GraphSnapshot {
            entities: state.store.sorted().into_iter().cloned().collect(),
            edges: state.links.all_edges(),
            incoming: state.links.all_incoming(),
            pending: state.links.all_pending(),
            documents: search.documents()?,
        })
    }

    /// Consistency problems between store, links and search; empty when healthy
    pub fn verify(&self) -> Result<Vec<String>> {
        let state = self.read_state()?;
        let search = self.lock_search()?;

        let mut problems = state.links.verify(&state.store);
        let documents: HashSet<Ulid> = search.documents()?.into_iter().map(|d| d.id).collect();
        let entities: HashSet<Ulid> = state.store.iter().map(|e| e.id).collect();
        for missing in entities.difference(&documents) {
            problems.push(format!("entity {} has no search document", missing));
        }
        for stale in documents.difference(&entities) {
            problems.push(format!("search document {} has no entity", stale));
        }
        Ok(problems)
    }

    // ==================== Internals ====================

    fn read_state(&self) -> Result<RwLockReadGuard<'_, GraphState>> {
        self.state.read().map_err(lock_error)
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, GraphState>> {
        self.state.write().map_err(lock_error)
    }

    fn lock_search(&self) -> Result<MutexGuard<'_, SearchIndex>> {
        self.search.lock().map_err(lock_error)
    }

    fn release(&self, permalink: &str) {
        match self.state.write() {
            Ok(mut state) => {
                state.reserved.remove(permalink);
            }
            Err(e) => {
                e.into_inner().reserved.remove(permalink);
            }
        }
    }

    /// Apply an entity to search, store and links as one unit
    fn commit(&self, entity: Entity, reservation: Option<&str>) -> Result<(Entity, bool)> {
        let mut state = self.write_state()?;
        let search = self.lock_search()?;

        if let Some(permalink) = reservation {
            state.reserved.remove(permalink);
        }

        let id = entity.id;
        search.index(&entity)?;

        let previous = match state.store.put(entity) {
            Ok(previous) => previous,
            Err(e) => {
                // Put the search document back the way it was
                match state.store.get(&id) {
                    Some(old) => search.index(old)?,
                    None => {
                        search.remove(&id)?;
                    }
                }
                return Err(e);
            }
        };

        let GraphState { store, links, .. } = &mut *state;
        links.apply_relations(store, id);

        match &previous {
            None => {
                links.on_entity_created_or_renamed(store, id);
            }
            Some(old) => {
                let renamed = store
                    .get(&id)
                    .map(|new| old.title != new.title || old.permalink != new.permalink)
                    .unwrap_or(false);
                if renamed {
                    links.on_entity_renamed(store, id, old);
                }
            }
        }

        let committed = store
            .get(&id)
            .cloned()
            .ok_or_else(|| GraphError::NotFound(id.to_string()))?;
        Ok((committed, previous.is_none()))
    }

    fn remove_entity(&self, id: Ulid) -> Result<()> {
        let mut state = self.write_state()?;
        let search = self.lock_search()?;

        search.remove(&id)?;
        let GraphState { store, links, .. } = &mut *state;
        if let Some(removed) = store.delete(&id) {
            links.on_entity_deleted(store, &removed);
        }
        Ok(())
    }
}

/// Turn one file into an entity as the write path would have produced it
#[allow(clippy::too_many_arguments)]
fn ingest(
    store: &EntityStore,
    reserved: &HashSet<String>,
    settings: &GraphSettings,
    path: &str,
    text: &str,
    id: Ulid,
    existing: Option<&Entity>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Ingested> {
    let parsed = parser::parse(text);
    let fm = parsed.frontmatter;
    let file = KbPath::parse(path);

    let title = fm
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| file.stem().map(str::to_string))
        .unwrap_or_else(|| "untitled".to_string());

    let entity_type = fm
        .entity_type
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| settings.default_entity_type.clone());

    let folder = file.parent().map(|p| p.to_string()).unwrap_or_default();
    let requested = fm
        .permalink
        .as_deref()
        .map(|p| permalink::slugify_folder(&permalink::normalize_identifier(p)))
        .filter(|p| !p.is_empty());
    let permalink = match requested {
        Some(p) => resolver::unique_permalink(store, reserved, &p, Some(id), resolver::nothing_blocked)?,
        None => resolver::generate_permalink(
            store,
            reserved,
            &folder,
            &title,
            Some(id),
            resolver::nothing_blocked,
        )?,
    };

    let created_at = fm
        .created
        .or_else(|| existing.map(|e| e.created_at))
        .unwrap_or(now);
    let updated_at = fm
        .updated
        .or_else(|| existing.map(|e| e.updated_at))
        .unwrap_or(now);

    let mut entity = Entity::new(title, permalink, created_at)
        .with_type(entity_type.trim())
        .with_tags(fm.tags.clone());
    entity.id = id;
    entity.file_path = path.to_string();
    entity.updated_at = updated_at;
    entity.body = parsed.body;
    entity.observations = parsed.observations;
    entity.relations = parsed.relations;

    let broken_frontmatter = parsed
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::InvalidFrontmatter);
    let needs_rewrite = !fm.is_complete()
        || fm.permalink.as_deref() != Some(entity.permalink.as_str())
        || fm.title.as_deref() != Some(entity.title.as_str());

    // Never overwrite YAML we could not read
    let rewrite = if needs_rewrite && !broken_frontmatter {
        let frontmatter = Frontmatter::for_entity(&entity, fm.extra);
        Some(format::render(&frontmatter, &entity.body)?)
    } else {
        None
    };

    Ok(Ingested {
        entity,
        rewrite,
        warnings: parsed.warnings,
    })
}
