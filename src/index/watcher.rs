//! File-system watcher for the registry refs
//!
//! Watches `<git_dir>/refs` and the git directory itself (for `FETCH_HEAD`),
//! coalesces bursts of events over the configured debounce window and hands
//! the touched paths to [`CratesLocalIndex::on_possible_change`].

use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;

use crate::index::coordinator::CratesLocalIndex;

/// Keeps the notify watcher and the debounce task alive
pub struct RegistryWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl RegistryWatcher {
    /// Start watching the registry of `index`; must be called inside a tokio runtime
    pub fn start(index: CratesLocalIndex) -> Result<Self> {
        let git_dir = index.git_dir().to_path_buf();
        let (tx, rx) = unbounded_channel();

        let mut watcher = notify::recommended_watcher(event_forwarder(tx))
            .context("Failed to create registry watcher")?;
        watcher
            .watch(&git_dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", git_dir.display()))?;
        let refs_dir = git_dir.join("refs");
        if let Err(e) = watcher.watch(&refs_dir, RecursiveMode::Recursive) {
            tracing::warn!(path = %refs_dir.display(), "Failed to watch registry refs: {}", e);
        }

        let debounce = index.config().debounce;
        let task = tokio::spawn(watch_loop(index, rx, debounce));
        tracing::info!(git_dir = %git_dir.display(), "Watching registry for changes");

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for RegistryWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn event_forwarder(
    tx: UnboundedSender<Vec<PathBuf>>,
) -> impl Fn(notify::Result<notify::Event>) + Send + 'static {
    move |event| match event {
        Ok(event) if !event.paths.is_empty() && !event.kind.is_access() => {
            let _ = tx.send(event.paths);
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Registry watcher error: {}", e),
    }
}

async fn watch_loop(
    index: CratesLocalIndex,
    mut rx: UnboundedReceiver<Vec<PathBuf>>,
    debounce: Duration,
) {
    while let Some(paths) = next_batch(&mut rx, debounce).await {
        tracing::debug!(paths = paths.len(), "Registry change notification");
        // Busy updates replay this trigger when they finish
        let Some(handle) = index.on_possible_change(&paths) else {
            continue;
        };
        if let Err(e) = handle.await {
            tracing::error!("Crates index update task failed: {}", e);
        }
    }
}

/// Wait for one event, then keep collecting until `debounce` passes quietly
///
/// Returns `None` once the sender side is gone and nothing is pending.
async fn next_batch(
    rx: &mut UnboundedReceiver<Vec<PathBuf>>,
    debounce: Duration,
) -> Option<Vec<PathBuf>> {
    let mut paths = rx.recv().await?;
    loop {
        match tokio::time::timeout(debounce, rx.recv()).await {
            Ok(Some(more)) => paths.extend(more),
            Ok(None) | Err(_) => break,
        }
    }
    paths.sort();
    paths.dedup();
    Some(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::config::IndexConfig;
    use crate::index::constants::HEAD_REF;
    use crate::index::test_support::{RegistryFixture, record, registry_path};
    use crate::index::types::CommitHash;
    use tempfile::TempDir;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_watcher_follows_moved_head() -> Result<()> {
        let fixture = RegistryFixture::new()?;
        let cache = TempDir::new()?;
        let serde_path = registry_path("serde");
        let serde = record("serde", "1.0.0", false, &[]);
        let first = fixture.commit(&[(serde_path.as_str(), serde.as_str())], "init")?;
        fixture.set_ref(HEAD_REF, first)?;

        let config = IndexConfig::new(fixture.path(), cache.path())
            .with_debounce(Duration::from_millis(50));
        let index = CratesLocalIndex::open(config)?;
        index
            .update_if_needed()
            .context("initial update was not scheduled")?
            .await??;

        let _watcher = RegistryWatcher::start(index.clone())?;
        let log_path = registry_path("log");
        let log = record("log", "0.4.0", false, &[]);
        let second = fixture.commit(&[(log_path.as_str(), log.as_str())], "publish log")?;
        fixture.set_ref(HEAD_REF, second)?;
        let expected = CommitHash::from(second);

        tokio::time::timeout(Duration::from_secs(20), async {
            while index.indexed_commit_hash() != expected {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await
        .context("watcher did not pick up the moved head")?;

        tokio::time::timeout(Duration::from_secs(5), async {
            while index.is_updating() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await?;
        assert!(index.get_crate("log")?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_next_batch_coalesces_events() {
        let (tx, mut rx) = unbounded_channel();
        tx.send(vec![PathBuf::from("/r/.git/refs/remotes/origin/HEAD")])
            .unwrap();
        tx.send(vec![
            PathBuf::from("/r/.git/FETCH_HEAD"),
            PathBuf::from("/r/.git/refs/remotes/origin/HEAD"),
        ])
        .unwrap();

        let batch = next_batch(&mut rx, Duration::from_millis(20)).await.unwrap();
        assert_eq!(
            batch,
            vec![
                PathBuf::from("/r/.git/FETCH_HEAD"),
                PathBuf::from("/r/.git/refs/remotes/origin/HEAD"),
            ]
        );
    }

    #[tokio::test]
    async fn test_next_batch_ends_when_sender_dropped() {
        let (tx, mut rx) = unbounded_channel::<Vec<PathBuf>>();
        tx.send(vec![PathBuf::from("/r/.git/FETCH_HEAD")]).unwrap();
        drop(tx);

        assert!(next_batch(&mut rx, Duration::from_millis(20)).await.is_some());
        assert!(next_batch(&mut rx, Duration::from_millis(20)).await.is_none());
    }
}
