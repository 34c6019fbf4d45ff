//! Lifecycle, queries and update scheduling for the crates index
//!
//! [`CratesLocalIndex`] owns the store and the persisted state. Updates run on
//! tokio's blocking pool; at most one is in flight per index, guarded by an
//! atomic flag rather than a lock so queries never wait on the pipeline.

use anyhow::{Context, Result};
use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::index::config::IndexConfig;
use crate::index::constants::{FETCH_HEAD_FILE, ORIGIN_REFS_DIR};
use crate::index::error::IndexError;
use crate::index::pipeline::{UpdateReport, run_update};
use crate::index::repository::RegistryRepository;
use crate::index::state::{IndexState, StatePaths};
use crate::index::store::IndexStore;
use crate::index::types::{CommitHash, Crate};
use crate::index::utils::remove_file_if_exists;

/// Completion handle of a scheduled update
pub type UpdateHandle = JoinHandle<Result<UpdateReport>>;

/// Whether an update is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexPhase {
    Idle,
    Updating,
}

/// Point-in-time view of the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStatus {
    pub phase: IndexPhase,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable_reason: Option<String>,
    pub indexed_commit_hash: CommitHash,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub registry_path: PathBuf,
    pub cache_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crates: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_bytes: Option<u64>,
}

/// Persistent, incrementally updated index of the local registry
#[derive(Clone)]
pub struct CratesLocalIndex {
    inner: Arc<Inner>,
}

struct Inner {
    config: IndexConfig,
    paths: StatePaths,
    git_dir: PathBuf,
    store: ArcSwapOption<IndexStore>,
    unavailable_reason: Mutex<Option<String>>,
    state: ArcSwap<IndexState>,
    is_updating: AtomicBool,
    /// A trigger arrived while an update held the guard
    recheck_pending: AtomicBool,
    reopening: AtomicBool,
    closed: AtomicBool,
    runtime: Option<Handle>,
}

/// Clears the updating flag however the pipeline ends
struct UpdatingGuard(Arc<Inner>);

impl Drop for UpdatingGuard {
    fn drop(&mut self) {
        self.0.is_updating.store(false, Ordering::Release);
    }
}

impl CratesLocalIndex {
    /// Open the index described by `config`
    ///
    /// A leftover corruption marker discards the store and the saved state.
    /// A store that cannot be opened leaves the index unavailable; queries
    /// report it and every update trigger retries the open in the background.
    pub fn open(config: IndexConfig) -> Result<Self> {
        fs::create_dir_all(&config.cache_dir).with_context(|| {
            format!(
                "Failed to create cache directory {}",
                config.cache_dir.display()
            )
        })?;

        let paths = StatePaths::new(&config.cache_dir);
        if paths.has_corruption_marker() {
            tracing::warn!(
                cache_dir = %config.cache_dir.display(),
                "Corruption marker found, discarding the crates index"
            );
            IndexStore::remove_all(&config.store_dir())?;
            remove_file_if_exists(&paths.state_file())?;
            paths.clear_corruption_marker()?;
        }

        let mut state = IndexState::load(&paths.state_file());
        let (store, unavailable_reason) = match IndexStore::open(&config.store_dir()) {
            Ok(store) => {
                if store.lost_records() && state.indexed_commit_hash.is_valid() {
                    tracing::warn!("Crates index store lost records, scheduling a full reindex");
                    state = IndexState::default();
                    save_state_best_effort(&paths, &state);
                }
                (Some(Arc::new(store)), None)
            }
            Err(e) => {
                tracing::error!("Crates index store is unavailable: {}", e);
                (None, Some(e.to_string()))
            }
        };

        let git_dir = locate_git_dir(&config.registry_path);
        tracing::info!(
            registry = %config.registry_path.display(),
            indexed = %state.indexed_commit_hash,
            crates = store.as_ref().map(|s| s.len()).unwrap_or(0),
            "Opened crates index"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                paths,
                git_dir,
                store: ArcSwapOption::new(store),
                unavailable_reason: Mutex::new(unavailable_reason),
                state: ArcSwap::from_pointee(state),
                is_updating: AtomicBool::new(false),
                recheck_pending: AtomicBool::new(false),
                reopening: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                runtime: Handle::try_current().ok(),
            }),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.inner.config
    }

    /// Git directory of the registry, watched for ref changes
    pub fn git_dir(&self) -> &Path {
        &self.inner.git_dir
    }

    pub fn indexed_commit_hash(&self) -> CommitHash {
        self.inner.state.load().indexed_commit_hash.clone()
    }

    pub fn is_updating(&self) -> bool {
        self.inner.is_updating.load(Ordering::Acquire)
    }

    /// Look up a crate by name (case-insensitive)
    ///
    /// `Ok(None)` means the crate is not in the registry.
    pub fn get_crate(&self, name: &str) -> Result<Option<Crate>, IndexError> {
        let store = self.queryable_store()?;
        Ok(store.get(&name.to_ascii_lowercase())?)
    }

    /// Every indexed crate name, sorted
    pub fn get_all_crate_names(&self) -> Result<Vec<String>, IndexError> {
        Ok(self.queryable_store()?.names())
    }

    fn queryable_store(&self) -> Result<Arc<IndexStore>, IndexError> {
        if self.is_updating() {
            return Err(IndexError::Updating);
        }
        self.inner.store.load_full().ok_or_else(|| IndexError::Unavailable {
            reason: self
                .inner
                .unavailable_reason
                .lock()
                .clone()
                .unwrap_or_else(|| "store is closed".to_string()),
        })
    }

    /// Schedule an update when the registry head moved since the last one
    ///
    /// Returns the completion handle of the scheduled update, or `None` when
    /// nothing was scheduled (up to date, already updating, head unresolvable
    /// or store unavailable). A trigger that finds an update in flight is
    /// replayed once that update finishes. An unavailable store is reopened
    /// on the blocking pool, which then runs this check again.
    pub fn update_if_needed(&self) -> Option<UpdateHandle> {
        let store = self.ensure_store()?;
        if store.is_empty() && self.indexed_commit_hash().is_valid() {
            tracing::info!("Crates index store is empty, scheduling a full reindex");
            self.set_indexed_commit_hash(CommitHash::invalid());
        }

        let repo = match RegistryRepository::open(&self.inner.config.registry_path) {
            Ok(repo) => repo,
            Err(e) => {
                tracing::error!("Cannot update crates index: {:#}", e);
                return None;
            }
        };
        let head = repo.resolve_head();
        if !head.is_valid() {
            return None;
        }
        if head == self.indexed_commit_hash() && !self.inner.paths.has_corruption_marker() {
            tracing::debug!(head = %head, "Crates index is up to date");
            return None;
        }

        if self
            .inner
            .is_updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Crates index update already in flight, deferring the check");
            self.inner.recheck_pending.store(true, Ordering::Release);
            // The running update may have finished before the flag was set
            if !self.is_updating() {
                return self.run_deferred_check();
            }
            return None;
        }
        let guard = UpdatingGuard(self.inner.clone());
        // Another update may have recorded this head since the first check
        if head == self.indexed_commit_hash() && !self.inner.paths.has_corruption_marker() {
            return None;
        }

        let runtime = self.runtime()?;
        let index = self.clone();
        Some(runtime.spawn_blocking(move || {
            let result = {
                let _guard = guard;
                index.inner.run_pipeline(&repo, &store, head)
            };
            if let Err(e) = &result {
                tracing::error!("Crates index update failed: {:#}", e);
            }
            let _ = index.run_deferred_check();
            result
        }))
    }

    /// Replay a trigger that was turned away while an update was in flight
    fn run_deferred_check(&self) -> Option<UpdateHandle> {
        if self.inner.recheck_pending.swap(false, Ordering::AcqRel) {
            self.update_if_needed()
        } else {
            None
        }
    }

    /// Trigger an update when any of `paths` touches the registry refs
    pub fn on_possible_change(&self, paths: &[PathBuf]) -> Option<UpdateHandle> {
        if !paths.iter().any(|path| is_ref_change(&self.inner.git_dir, path)) {
            return None;
        }
        self.update_if_needed()
    }

    /// Trigger an update unconditionally
    pub fn on_registry_changed(&self) -> Option<UpdateHandle> {
        self.update_if_needed()
    }

    /// Discard the index: the store is rebuilt from scratch by the next update
    pub fn invalidate_caches(&self) -> Result<()> {
        self.inner.paths.write_corruption_marker()?;
        self.set_indexed_commit_hash(CommitHash::invalid());
        IndexState::default().save(&self.inner.paths.state_file())?;
        tracing::info!("Crates index invalidated");
        Ok(())
    }

    pub fn status(&self) -> IndexStatus {
        let state = self.inner.state.load();
        let store = self.inner.store.load_full();
        let stats = store.as_ref().map(|s| s.stats());
        IndexStatus {
            phase: if self.is_updating() {
                IndexPhase::Updating
            } else {
                IndexPhase::Idle
            },
            available: store.is_some(),
            unavailable_reason: if store.is_some() {
                None
            } else {
                self.inner.unavailable_reason.lock().clone()
            },
            indexed_commit_hash: state.indexed_commit_hash.clone(),
            updated_at: state.updated_at,
            registry_path: self.inner.config.registry_path.clone(),
            cache_dir: self.inner.config.cache_dir.clone(),
            crates: stats.map(|s| s.crates),
            store_bytes: stats.map(|s| s.file_bytes),
        }
    }

    /// Flush and release the store
    ///
    /// An update still in flight keeps its own handle until it finishes.
    pub fn close(&self) -> Result<()> {
        self.inner.closed.store(true, Ordering::Release);
        if let Some(store) = self.inner.store.swap(None) {
            store.flush().context("Failed to flush crates index store")?;
            tracing::info!("Closed crates index");
        }
        Ok(())
    }

    fn set_indexed_commit_hash(&self, hash: CommitHash) {
        self.inner.state.rcu(|state| IndexState {
            indexed_commit_hash: hash.clone(),
            updated_at: state.updated_at,
        });
    }

    fn runtime(&self) -> Option<Handle> {
        let runtime = Handle::try_current().ok().or_else(|| self.inner.runtime.clone());
        if runtime.is_none() {
            tracing::error!("No tokio runtime available to run crates index work");
        }
        runtime
    }

    fn ensure_store(&self) -> Option<Arc<IndexStore>> {
        if let Some(store) = self.inner.store.load_full() {
            return Some(store);
        }
        if !self.inner.closed.load(Ordering::Acquire) {
            self.schedule_reopen();
        }
        None
    }

    /// Retry opening the store on the blocking pool; on success the update check runs again
    fn schedule_reopen(&self) {
        if self
            .inner
            .reopening
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let Some(runtime) = self.runtime() else {
            self.inner.reopening.store(false, Ordering::Release);
            return;
        };

        let index = self.clone();
        runtime.spawn_blocking(move || {
            let reopened = index.reopen_store();
            index.inner.reopening.store(false, Ordering::Release);
            if reopened {
                let _ = index.update_if_needed();
            }
        });
    }

    fn reopen_store(&self) -> bool {
        if self.inner.closed.load(Ordering::Acquire) {
            return false;
        }
        let store = match IndexStore::open(&self.inner.config.store_dir()) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!("Crates index store is still unavailable: {}", e);
                *self.inner.unavailable_reason.lock() = Some(e.to_string());
                return false;
            }
        };
        // close() may have run while the log was scanned
        if self.inner.closed.load(Ordering::Acquire) {
            return false;
        }

        tracing::info!("Crates index store is available again");
        if store.lost_records() && self.indexed_commit_hash().is_valid() {
            tracing::warn!("Crates index store lost records, scheduling a full reindex");
            self.set_indexed_commit_hash(CommitHash::invalid());
            save_state_best_effort(&self.inner.paths, &IndexState::default());
        }
        self.inner.store.store(Some(Arc::new(store)));
        *self.inner.unavailable_reason.lock() = None;
        true
    }

    #[cfg(test)]
    fn force_updating(&self, updating: bool) {
        self.inner.is_updating.store(updating, Ordering::Release);
    }
}

impl Inner {
    fn run_pipeline(
        &self,
        repo: &RegistryRepository,
        store: &IndexStore,
        head: CommitHash,
    ) -> Result<UpdateReport> {
        if self.paths.has_corruption_marker() {
            tracing::warn!("Rebuilding invalidated crates index from scratch");
            store.wipe().context("Failed to wipe crates index store")?;
            self.paths.clear_corruption_marker()?;
            self.state.store(Arc::new(IndexState::default()));
        }

        let previous = self.state.load().indexed_commit_hash.clone();
        let report = run_update(repo, store, &previous, &head, self.config.parse_workers)?;
        store.flush().context("Failed to flush crates index store")?;
        if let Err(e) = store.compact_if_needed() {
            tracing::warn!("Failed to compact crates index store: {}", e);
        }

        if self.paths.has_corruption_marker() {
            tracing::warn!(head = %head, "Crates index invalidated during update, head not recorded");
            return Ok(report);
        }

        let state = IndexState::new(head);
        state.save(&self.paths.state_file())?;
        self.state.store(Arc::new(state));

        tracing::info!(
            head = %report.head,
            full = report.full_reindex,
            files = report.files,
            crates = report.crates_written,
            failed = report.files_failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Crates index updated"
        );
        Ok(report)
    }
}

fn save_state_best_effort(paths: &StatePaths, state: &IndexState) {
    if let Err(e) = state.save(&paths.state_file()) {
        tracing::warn!("Failed to save crates index state: {:#}", e);
    }
}

fn locate_git_dir(registry_path: &Path) -> PathBuf {
    let git_dir = match RegistryRepository::open(registry_path) {
        Ok(repo) => repo.git_dir().to_path_buf(),
        Err(_) => registry_path.join(".git"),
    };
    fs::canonicalize(&git_dir).unwrap_or(git_dir)
}

fn is_ref_change(git_dir: &Path, path: &Path) -> bool {
    let path = match path.parent().and_then(|p| fs::canonicalize(p).ok()) {
        Some(parent) => match path.file_name() {
            Some(name) => parent.join(name),
            None => parent,
        },
        None => path.to_path_buf(),
    };
    path.starts_with(git_dir.join(ORIGIN_REFS_DIR)) || path == git_dir.join(FETCH_HEAD_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::constants::{HEAD_REF, STORE_FILE};
    use crate::index::test_support::{RegistryFixture, record, registry_path};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Setup {
        fixture: RegistryFixture,
        cache: TempDir,
    }

    impl Setup {
        fn new() -> Result<Self> {
            Ok(Self {
                fixture: RegistryFixture::new()?,
                cache: TempDir::new()?,
            })
        }

        fn publish(&self, name: &str, lines: &[String]) -> Result<CommitHash> {
            let path = registry_path(name);
            let contents = lines.join("\n");
            let oid = self
                .fixture
                .commit(&[(path.as_str(), contents.as_str())], "publish")?;
            self.fixture.set_ref(HEAD_REF, oid)?;
            Ok(CommitHash::from(oid))
        }

        fn open(&self) -> Result<CratesLocalIndex> {
            CratesLocalIndex::open(IndexConfig::new(self.fixture.path(), self.cache.path()))
        }
    }

    async fn run(index: &CratesLocalIndex) -> Result<UpdateReport> {
        let handle = index.update_if_needed().context("update was not scheduled")?;
        handle.await?
    }

    #[tokio::test]
    async fn test_update_then_query() -> Result<()> {
        let setup = Setup::new()?;
        let head = setup.publish("serde", &[record("serde", "1.0.0", false, &["derive"])])?;
        let index = setup.open()?;

        let report = run(&index).await?;
        assert!(report.full_reindex);
        assert_eq!(index.indexed_commit_hash(), head);

        let serde = index.get_crate("Serde")?.expect("serde is indexed");
        assert_eq!(serde.name(), "serde");
        assert_eq!(index.get_all_crate_names()?, vec!["serde".to_string()]);
        assert!(index.get_crate("missing")?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_queries_fail_while_updating() -> Result<()> {
        let setup = Setup::new()?;
        setup.publish("serde", &[record("serde", "1.0.0", false, &[])])?;
        let index = setup.open()?;

        index.force_updating(true);
        assert!(matches!(index.get_crate("serde"), Err(IndexError::Updating)));
        assert!(matches!(index.get_all_crate_names(), Err(IndexError::Updating)));
        assert!(index.update_if_needed().is_none());
        assert_eq!(index.status().phase, IndexPhase::Updating);

        index.force_updating(false);
        assert!(index.get_all_crate_names()?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_closed_index_is_unavailable() -> Result<()> {
        let setup = Setup::new()?;
        setup.publish("serde", &[record("serde", "1.0.0", false, &[])])?;
        let index = setup.open()?;
        index.close()?;

        assert!(matches!(
            index.get_crate("serde"),
            Err(IndexError::Unavailable { .. })
        ));
        assert!(index.update_if_needed().is_none());
        assert!(!index.status().available);
        Ok(())
    }

    #[tokio::test]
    async fn test_unresolvable_head_schedules_nothing() -> Result<()> {
        let setup = Setup::new()?;
        setup
            .fixture
            .commit(&[("1/a", "{}\n")], "no remote refs")?;
        let index = setup.open()?;

        assert!(index.update_if_needed().is_none());
        assert!(!index.indexed_commit_hash().is_valid());
        Ok(())
    }

    #[tokio::test]
    async fn test_invalidate_forces_full_reindex() -> Result<()> {
        let setup = Setup::new()?;
        setup.publish("serde", &[record("serde", "1.0.0", false, &[])])?;
        let index = setup.open()?;
        run(&index).await?;

        index.invalidate_caches()?;
        assert!(!index.indexed_commit_hash().is_valid());
        assert!(setup.cache.path().join("corruption.marker").exists());

        let report = run(&index).await?;
        assert!(report.full_reindex);
        assert!(index.indexed_commit_hash().is_valid());
        assert!(!setup.cache.path().join("corruption.marker").exists());
        assert!(index.get_crate("serde")?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_state_survives_reopen() -> Result<()> {
        let setup = Setup::new()?;
        let head = setup.publish("serde", &[record("serde", "1.0.0", false, &[])])?;
        {
            let index = setup.open()?;
            run(&index).await?;
            index.close()?;
        }

        let index = setup.open()?;
        assert_eq!(index.indexed_commit_hash(), head);
        assert!(index.update_if_needed().is_none());
        assert!(index.get_crate("serde")?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_on_possible_change_filters_paths() -> Result<()> {
        let setup = Setup::new()?;
        setup.publish("serde", &[record("serde", "1.0.0", false, &[])])?;
        let index = setup.open()?;

        let unrelated = vec![setup.fixture.path().join("se").join("rd").join("serde")];
        assert!(index.on_possible_change(&unrelated).is_none());

        let origin_head = vec![index.git_dir().join(HEAD_REF)];
        let handle = index
            .on_possible_change(&origin_head)
            .context("ref change should schedule an update")?;
        handle.await??;
        assert!(index.get_crate("serde")?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_damaged_store_forces_full_reindex() -> Result<()> {
        let setup = Setup::new()?;
        let files: Vec<(String, String)> = ["aaaa", "bbbb", "cccc"]
            .iter()
            .map(|name| (registry_path(name), record(name, "1.0.0", false, &[])))
            .collect();
        let files: Vec<(&str, &str)> = files
            .iter()
            .map(|(path, contents)| (path.as_str(), contents.as_str()))
            .collect();
        let oid = setup.fixture.commit(&files, "publish")?;
        setup.fixture.set_ref(HEAD_REF, oid)?;

        let store_file = {
            let index = setup.open()?;
            run(&index).await?;
            index.close()?;
            index.config().store_dir().join(STORE_FILE)
        };

        // Zero the name length of the second record
        let mut bytes = fs::read(&store_file)?;
        let first_name_len = u32::from_le_bytes(bytes[12..16].try_into()?) as usize;
        let value_len_at = 16 + first_name_len;
        let value_len =
            u32::from_le_bytes(bytes[value_len_at..value_len_at + 4].try_into()?) as usize;
        let second = value_len_at + 4 + value_len;
        bytes[second..second + 4].copy_from_slice(&0u32.to_le_bytes());
        fs::write(&store_file, bytes)?;

        {
            let index = setup.open()?;
            assert!(!index.indexed_commit_hash().is_valid());
            assert_eq!(index.get_all_crate_names()?.len(), 1);
            index.close()?;
        }

        // The reset hash was persisted even though nothing ran
        let index = setup.open()?;
        assert!(!index.indexed_commit_hash().is_valid());
        let report = run(&index).await?;
        assert!(report.full_reindex);
        assert_eq!(index.indexed_commit_hash(), CommitHash::from(oid));
        assert_eq!(
            index.get_all_crate_names()?,
            vec!["aaaa".to_string(), "bbbb".to_string(), "cccc".to_string()]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_trigger_during_update_is_replayed() -> Result<()> {
        let setup = Setup::new()?;
        setup.publish("serde", &[record("serde", "1.0.0", false, &[])])?;
        let index = setup.open()?;
        run(&index).await?;

        index.force_updating(true);
        let head = setup.publish("log", &[record("log", "0.4.0", false, &[])])?;
        assert!(index.update_if_needed().is_none());
        index.force_updating(false);

        let report = index
            .run_deferred_check()
            .context("deferred trigger should schedule an update")?
            .await??;
        assert!(!report.full_reindex);
        assert_eq!(report.head, head);
        assert!(index.get_crate("log")?.is_some());
        assert!(index.run_deferred_check().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_unavailable_store_reopens_in_background() -> Result<()> {
        let setup = Setup::new()?;
        setup.publish("serde", &[record("serde", "1.0.0", false, &[])])?;
        let config = IndexConfig::new(setup.fixture.path(), setup.cache.path());
        let holder = IndexStore::open(&config.store_dir())?;
        let index = CratesLocalIndex::open(config)?;

        assert!(index.update_if_needed().is_none());
        assert!(!index.status().available);
        drop(holder);

        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if let Some(handle) = index.update_if_needed() {
                    let _ = handle.await;
                }
                if let Ok(Some(_)) = index.get_crate("serde") {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .context("store was not reopened")?;
        assert!(index.status().available);
        Ok(())
    }

    #[test]
    fn test_is_ref_change() {
        let git_dir = Path::new("/registry/.git");
        assert!(is_ref_change(git_dir, &git_dir.join("refs/remotes/origin/HEAD")));
        assert!(is_ref_change(git_dir, &git_dir.join("refs/remotes/origin/master.lock")));
        assert!(is_ref_change(git_dir, &git_dir.join("FETCH_HEAD")));
        assert!(!is_ref_change(git_dir, &git_dir.join("refs/heads/master")));
        assert!(!is_ref_change(git_dir, &git_dir.join("index")));
    }
}
