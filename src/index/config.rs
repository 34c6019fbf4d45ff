//! Configuration for the crates index
//!
//! Paths are resolved the way Cargo resolves them: `CARGO_HOME` when set,
//! `~/.cargo` otherwise, with the git index living under
//! `registry/index/<source-dir>`.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::index::constants::*;

/// Settings for one crates index instance
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Local clone of the registry index (a git repository)
    pub registry_path: PathBuf,
    /// Directory holding the store, the state file and the corruption marker
    pub cache_dir: PathBuf,
    /// Threads parsing registry files during an update
    pub parse_workers: usize,
    /// Quiet period the change watcher waits for before triggering an update
    pub debounce: Duration,
}

impl IndexConfig {
    pub fn new(registry_path: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry_path: registry_path.into(),
            cache_dir: cache_dir.into(),
            parse_workers: DEFAULT_PARSE_WORKERS,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }

    /// Build a configuration from optional overrides, discovering the rest
    pub fn discover(
        cargo_home: Option<PathBuf>,
        registry_path: Option<PathBuf>,
        cache_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let registry_path = match registry_path {
            Some(path) => expand_path(&path)?,
            None => {
                let cargo_home = match cargo_home {
                    Some(path) => expand_path(&path)?,
                    None => default_cargo_home()?,
                };
                find_registry_index(&cargo_home)?
            }
        };

        let cache_dir = match cache_dir {
            Some(dir) => expand_path(&dir)?,
            None => default_cache_dir()?,
        };

        Ok(Self::new(registry_path, cache_dir))
    }

    pub fn with_parse_workers(mut self, parse_workers: usize) -> Self {
        self.parse_workers = parse_workers.max(1);
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn store_dir(&self) -> PathBuf {
        self.cache_dir.join(STORE_DIR)
    }
}

/// `~/.cargo`, used when `CARGO_HOME` is not set
pub fn default_cargo_home() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("Failed to get home directory")?
        .join(CARGO_HOME_DIR))
}

/// `~/.crates-local-index/cache`
pub fn default_cache_dir() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("Failed to get home directory")?
        .join(CACHE_ROOT_DIR)
        .join(CACHE_DIR))
}

/// Locate the git registry index inside a Cargo home
///
/// The crates.io source directory is preferred; otherwise the first
/// `github.com-*` directory that holds a git repository is used.
pub fn find_registry_index(cargo_home: &Path) -> Result<PathBuf> {
    let index_root = cargo_home.join(REGISTRY_DIR).join(REGISTRY_INDEX_DIR);

    let preferred = index_root.join(CRATES_IO_INDEX_DIR);
    if is_git_index(&preferred) {
        return Ok(preferred);
    }

    if index_root.is_dir() {
        let mut candidates: Vec<PathBuf> = fs::read_dir(&index_root)
            .with_context(|| format!("Failed to read {}", index_root.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(GIT_INDEX_DIR_PREFIX)
            })
            .map(|entry| entry.path())
            .filter(|path| is_git_index(path))
            .collect();
        candidates.sort();

        if let Some(path) = candidates.into_iter().next() {
            return Ok(path);
        }
    }

    bail!(
        "No git registry index found under {}. Run `cargo fetch` with the git protocol or pass --registry-dir",
        index_root.display()
    )
}

fn is_git_index(path: &Path) -> bool {
    path.join(".git").is_dir() || path.join("HEAD").is_file()
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .with_context(|| format!("Failed to expand path: {raw}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
