//! File access and clock collaborators
//!
//! The engine never touches the file system or the system clock directly; it
//! goes through [`FileAccess`] and [`Clock`] so tests can swap in
//! [`MemoryFiles`] and [`ManualClock`].
//!
//! Paths are relative to the knowledge-base root and `/`-separated.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, SubsecRound, Utc};

use super::error::{GraphError, Result};
use super::permalink::KbPath;

/// File primitives, each assumed atomic per call
pub trait FileAccess: Send + Sync {
    fn read_file(&self, path: &str) -> Result<String>;

    /// Create or overwrite, creating parent folders as needed
    fn write_file(&self, path: &str, text: &str) -> Result<()>;

    /// Relative paths matching a glob (`**/*.md`), sorted
    fn list_files(&self, pattern: &str) -> Result<Vec<String>>;

    fn delete_file(&self, path: &str) -> Result<()>;

    fn exists(&self, path: &str) -> Result<bool>;
}

/// Time source for `created_at` / `updated_at`
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock, truncated to whole seconds so frontmatter stays readable
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(0)
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

impl<F: FileAccess + ?Sized> FileAccess for Arc<F> {
    fn read_file(&self, path: &str) -> Result<String> {
        (**self).read_file(path)
    }

    fn write_file(&self, path: &str, text: &str) -> Result<()> {
        (**self).write_file(path, text)
    }

    fn list_files(&self, pattern: &str) -> Result<Vec<String>> {
        (**self).list_files(pattern)
    }

    fn delete_file(&self, path: &str) -> Result<()> {
        (**self).delete_file(path)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        (**self).exists(path)
    }
}

/// Reject paths that would escape the knowledge-base root
fn checked_path(path: &str) -> Result<String> {
    let normalized = path.replace('\\', "/");
    let escapes = normalized.starts_with('/')
        || normalized.split('/').any(|segment| segment == "..")
        || normalized.trim_matches('/').is_empty();
    if escapes {
        return Err(GraphError::InvalidInput(format!("invalid note path: {}", path)));
    }
    Ok(normalized.trim_matches('/').to_string())
}

/// Notes stored as files under a root directory
#[derive(Debug, Clone)]
pub struct LocalFiles {
    root: PathBuf,
}

impl LocalFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        Ok(self.root.join(checked_path(path)?))
    }

    fn visit(&self, dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<()> {
        let entries = fs::read_dir(dir).map_err(|e| GraphError::io(dir.display().to_string(), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| GraphError::io(dir.display().to_string(), e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            // Hidden entries hold engine state (.notegraph/) and temp files
            if name.starts_with('.') {
                continue;
            }

            let relative = if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix, name)
            };
            let path = entry.path();
            if path.is_dir() {
                self.visit(&path, &relative, out)?;
            } else {
                out.push(relative);
            }
        }
        Ok(())
    }
}

impl FileAccess for LocalFiles {
    fn read_file(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        fs::read_to_string(&full).map_err(|e| GraphError::io(path, e))
    }

    fn write_file(&self, path: &str, text: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| GraphError::io(path, e))?;
        }

        // Write to a hidden sibling, then rename over the target
        let file_name = full
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let tmp = full.with_file_name(format!(".{}.tmp", file_name));
        fs::write(&tmp, text).map_err(|e| GraphError::io(path, e))?;
        fs::rename(&tmp, &full).map_err(|e| GraphError::io(path, e))
    }

    fn list_files(&self, pattern: &str) -> Result<Vec<String>> {
        let mut files = Vec::new();
        if !self.root.is_dir() {
            return Ok(files);
        }
        self.visit(&self.root, "", &mut files)?;

        let mut matched: Vec<String> = files
            .into_iter()
            .filter(|f| KbPath::parse(f).matches_pattern(pattern))
            .collect();
        matched.sort();
        Ok(matched)
    }

    fn delete_file(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        fs::remove_file(&full).map_err(|e| GraphError::io(path, e))
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        full.try_exists().map_err(|e| GraphError::io(path, e))
    }
}

/// Notes held in memory
#[derive(Debug, Default)]
pub struct MemoryFiles {
    files: Mutex<BTreeMap<String, String>>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated file set
    pub fn with_files<I, P, T>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, T)>,
        P: Into<String>,
        T: Into<String>,
    {
        let map = files
            .into_iter()
            .map(|(p, t)| (p.into(), t.into()))
            .collect();
        Self {
            files: Mutex::new(map),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.files
            .lock()
            .map_err(|e| GraphError::Lock(format!("Lock error: {}", e)))
    }
}

fn not_found(path: &str) -> GraphError {
    GraphError::io(
        path,
        std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
    )
}

impl FileAccess for MemoryFiles {
    fn read_file(&self, path: &str) -> Result<String> {
        let path = checked_path(path)?;
        self.lock()?.get(&path).cloned().ok_or_else(|| not_found(&path))
    }

    fn write_file(&self, path: &str, text: &str) -> Result<()> {
        let path = checked_path(path)?;
        self.lock()?.insert(path, text.to_string());
        Ok(())
    }

    fn list_files(&self, pattern: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .keys()
            .filter(|f| KbPath::parse(f).matches_pattern(pattern))
            .cloned()
            .collect())
    }

    fn delete_file(&self, path: &str) -> Result<()> {
        let path = checked_path(path)?;
        match self.lock()?.remove(&path) {
            Some(_) => Ok(()),
            None => Err(not_found(&path)),
        }
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let path = checked_path(path)?;
        Ok(self.lock()?.contains_key(&path))
    }
}
