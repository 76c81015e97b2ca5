//! Configuration module
//!
//! # Lookup Order
//! 1. Explicit path (`--config` / `NOTEGRAPH_CONFIG`)
//! 2. Local `.notegraph/config.toml`, walking up from the current directory
//! 3. Global `~/.notegraph/config.toml`
//! 4. Defaults
//!
//! ```toml
//! [kb]
//! default_folder = "notes"
//!
//! [search]
//! default_limit = 10
//! database = ".notegraph/search.db"
//!
//! [context]
//! default_depth = 1
//! max_depth = 5
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::entity::DEFAULT_ENTITY_TYPE;
use crate::core::graph::GraphSettings;

/// Directory holding engine state inside a knowledge base
pub const STATE_DIR: &str = ".notegraph";

/// Config file name inside [`STATE_DIR`]
pub const CONFIG_FILE: &str = "config.toml";

/// Overrides the knowledge-base root
pub const HOME_ENV: &str = "NOTEGRAPH_HOME";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub kb: KbConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub context: ContextConfig,

    /// File this config was read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbConfig {
    /// Knowledge-base root; relative paths are taken from the config's location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    #[serde(default)]
    pub default_folder: String,

    #[serde(default = "default_entity_type")]
    pub default_entity_type: String,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            root: None,
            default_folder: String::new(),
            default_entity_type: default_entity_type(),
        }
    }
}

fn default_entity_type() -> String {
    DEFAULT_ENTITY_TYPE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// On-disk search index, relative to the knowledge-base root; in memory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            database: None,
        }
    }
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_depth")]
    pub default_depth: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            default_depth: default_depth(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_depth() -> usize {
    1
}

fn default_max_depth() -> usize {
    5
}

impl Config {
    /// Load config from an explicit path or the default locations
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        if let Some(local) = Self::find_local_config(&cwd) {
            return Self::load_from(&local);
        }

        if let Some(global) = Self::global_config_path() {
            if global.exists() {
                return Self::load_from(&global);
            }
        }

        Ok(Self::default())
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Find local .notegraph/config.toml walking up from `start`
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            let config_path = current.join(STATE_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Get global config path (~/.notegraph/config.toml)
    pub fn global_config_path() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|b| b.home_dir().join(STATE_DIR).join(CONFIG_FILE))
    }

    /// Knowledge-base root with priority:
    /// 1. NOTEGRAPH_HOME env var
    /// 2. `kb.root`
    /// 3. Directory holding the `.notegraph/` the config came from
    /// 4. Current directory
    pub fn kb_root(&self) -> Result<PathBuf> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let env_home = std::env::var_os(HOME_ENV).map(PathBuf::from);
        Ok(self.kb_root_from(env_home, &cwd))
    }

    fn kb_root_from(&self, env_home: Option<PathBuf>, cwd: &Path) -> PathBuf {
        if let Some(home) = env_home.filter(|h| !h.as_os_str().is_empty()) {
            return home;
        }

        let config_dir = self.source.as_deref().and_then(Path::parent);

        if let Some(root) = &self.kb.root {
            if root.is_absolute() {
                return root.clone();
            }
            // `.notegraph/config.toml` describes its parent, other files their own folder
            let base = match config_dir {
                Some(dir) if dir.file_name().map(|n| n == STATE_DIR).unwrap_or(false) => {
                    dir.parent().unwrap_or(dir).to_path_buf()
                }
                Some(dir) => dir.to_path_buf(),
                None => cwd.to_path_buf(),
            };
            return base.join(root);
        }

        if let Some(dir) = config_dir {
            if dir.file_name().map(|n| n == STATE_DIR).unwrap_or(false) {
                if let Some(parent) = dir.parent() {
                    if !is_home(parent) {
                        return parent.to_path_buf();
                    }
                }
            }
        }

        cwd.to_path_buf()
    }

    /// On-disk search index location, if configured
    pub fn search_db(&self, root: &Path) -> Option<PathBuf> {
        self.search.database.as_ref().map(|db| {
            if db.is_absolute() {
                db.clone()
            } else {
                root.join(db)
            }
        })
    }

    /// Engine settings derived from this config
    pub fn graph_settings(&self) -> GraphSettings {
        GraphSettings {
            default_folder: self.kb.default_folder.clone(),
            default_entity_type: self.kb.default_entity_type.clone(),
            max_depth: self.context.max_depth,
        }
    }
}

/// The global config lives in the home directory; that is not a knowledge base
fn is_home(dir: &Path) -> bool {
    directories::BaseDirs::new()
        .map(|b| b.home_dir() == dir)
        .unwrap_or(false)
}
