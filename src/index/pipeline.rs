//! The diff, parse and store pipeline run by one update

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, unbounded};
use std::thread;
use std::time::{Duration, Instant};

use crate::index::diff::{ChangedPaths, RegistryEntry, changed_paths, registry_entries};
use crate::index::parser::parse_crate_file;
use crate::index::repository::RegistryRepository;
use crate::index::store::IndexStore;
use crate::index::types::{CommitHash, Crate};

/// Summary of one completed update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub previous: CommitHash,
    pub head: CommitHash,
    pub full_reindex: bool,
    /// Registry data files selected by the diff
    pub files: usize,
    /// Crates written to the store
    pub crates_written: usize,
    /// Files that could not be read
    pub files_failed: usize,
    pub elapsed: Duration,
}

enum ParseOutcome {
    Parsed(Crate),
    Failed { path: String, error: anyhow::Error },
}

/// Bring `store` from `previous` up to `head`
///
/// Files are parsed on `parse_workers` threads, each with its own repository
/// handle. Writes happen on the calling thread. The store is not flushed.
pub fn run_update(
    repo: &RegistryRepository,
    store: &IndexStore,
    previous: &CommitHash,
    head: &CommitHash,
    parse_workers: usize,
) -> Result<UpdateReport> {
    let start = Instant::now();

    let changed = changed_paths(repo, previous, head);
    let full_reindex = changed.is_all();
    let entries = registry_entries(repo, head, &changed)?;

    match &changed {
        ChangedPaths::All => tracing::info!(
            head = %head,
            files = entries.len(),
            "Full reindex of the registry"
        ),
        ChangedPaths::Paths(paths) => tracing::info!(
            previous = %previous,
            head = %head,
            changed = paths.len(),
            files = entries.len(),
            "Incremental registry update"
        ),
    }

    let files = entries.len();
    let (crates_written, files_failed) = if entries.is_empty() {
        (0, 0)
    } else {
        parse_and_store(repo, store, entries, parse_workers)?
    };

    Ok(UpdateReport {
        previous: previous.clone(),
        head: head.clone(),
        full_reindex,
        files,
        crates_written,
        files_failed,
        elapsed: start.elapsed(),
    })
}

fn parse_and_store(
    repo: &RegistryRepository,
    store: &IndexStore,
    entries: Vec<RegistryEntry>,
    parse_workers: usize,
) -> Result<(usize, usize)> {
    let workers = parse_workers.clamp(1, entries.len());

    // git2 repositories are not shareable across threads
    let handles = (0..workers)
        .map(|_| RegistryRepository::open(repo.path()))
        .collect::<Result<Vec<_>>>()?;

    let (job_tx, job_rx) = unbounded::<RegistryEntry>();
    for entry in entries {
        // Receiver is alive in this scope
        let _ = job_tx.send(entry);
    }
    drop(job_tx);

    let (result_tx, result_rx) = bounded::<ParseOutcome>(workers * 64);

    thread::scope(|scope| {
        for handle in handles {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            scope.spawn(move || {
                for entry in jobs.iter() {
                    if results.send(parse_entry(&handle, entry)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);
        // Dropped on early return so blocked workers exit
        let result_rx = result_rx;

        let mut written = 0;
        let mut failed = 0;
        for outcome in result_rx.iter() {
            match outcome {
                ParseOutcome::Parsed(krate) => {
                    store
                        .put(&krate)
                        .with_context(|| format!("Failed to store crate {}", krate.name()))?;
                    written += 1;
                }
                ParseOutcome::Failed { path, error } => {
                    tracing::warn!(path = %path, "Skipping registry file: {:#}", error);
                    failed += 1;
                }
            }
        }
        Ok((written, failed))
    })
}

fn parse_entry(repo: &RegistryRepository, entry: RegistryEntry) -> ParseOutcome {
    match repo.find_blob(entry.blob_id) {
        Ok(blob) => {
            let krate = parse_crate_file(&entry.crate_name, blob.content());
            tracing::debug!(
                path = %entry.path,
                versions = krate.versions().len(),
                "Parsed registry file"
            );
            ParseOutcome::Parsed(krate)
        }
        Err(error) => ParseOutcome::Failed {
            path: entry.path,
            error,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::test_support::{RegistryFixture, record, registry_path};
    use tempfile::TempDir;

    fn file(lines: &[String]) -> String {
        let mut contents = lines.join("\n");
        contents.push('\n');
        contents
    }

    #[test]
    fn test_full_then_incremental_update() -> Result<()> {
        let fixture = RegistryFixture::new()?;
        let serde_path = registry_path("serde");
        let log_path = registry_path("log");
        let serde_v1 = file(&[record("serde", "1.0.0", false, &["derive"])]);
        let log_v1 = file(&[record("log", "0.4.0", false, &[])]);
        let first = CommitHash::from(fixture.commit(
            &[
                ("config.json", "{}"),
                (serde_path.as_str(), serde_v1.as_str()),
                (log_path.as_str(), log_v1.as_str()),
            ],
            "init",
        )?);

        let store_dir = TempDir::new()?;
        let store = IndexStore::open(store_dir.path())?;
        let repo = RegistryRepository::open(fixture.path())?;

        let report = run_update(&repo, &store, &CommitHash::invalid(), &first, 2)?;
        assert!(report.full_reindex);
        assert_eq!(report.files, 2);
        assert_eq!(report.crates_written, 2);
        assert_eq!(store.names(), vec!["log".to_string(), "serde".to_string()]);

        let serde_v2 = file(&[
            record("serde", "1.0.0", false, &["derive"]),
            record("serde", "1.0.1", true, &[]),
        ]);
        let second = CommitHash::from(
            fixture.commit(&[(serde_path.as_str(), serde_v2.as_str())], "publish serde 1.0.1")?,
        );

        let report = run_update(&repo, &store, &first, &second, 2)?;
        assert!(!report.full_reindex);
        assert_eq!(report.files, 1);
        assert_eq!(report.crates_written, 1);

        let serde = store.get("serde")?.expect("serde is indexed");
        assert_eq!(serde.versions().len(), 2);
        assert!(serde.versions()[1].is_yanked());
        assert_eq!(store.get("log")?.expect("log is indexed").versions().len(), 1);
        Ok(())
    }

    #[test]
    fn test_unchanged_tree_writes_nothing() -> Result<()> {
        let fixture = RegistryFixture::new()?;
        let contents = file(&[record("a", "0.1.0", false, &[])]);
        let first = CommitHash::from(fixture.commit(&[("1/a", contents.as_str())], "init")?);
        let second = CommitHash::from(fixture.commit_unchanged("noop")?);

        let store_dir = TempDir::new()?;
        let store = IndexStore::open(store_dir.path())?;
        let repo = RegistryRepository::open(fixture.path())?;
        run_update(&repo, &store, &CommitHash::invalid(), &first, 1)?;
        let before = store.stats();

        let report = run_update(&repo, &store, &first, &second, 1)?;
        assert_eq!(report.files, 0);
        assert_eq!(report.crates_written, 0);
        assert_eq!(store.stats(), before);
        Ok(())
    }

    #[test]
    fn test_malformed_lines_do_not_block_other_files() -> Result<()> {
        let fixture = RegistryFixture::new()?;
        let ab = file(&[
            "{ this is not json".to_string(),
            record("ab", "1.0.0", false, &[]),
        ]);
        let ef = file(&[record("ef", "2.0.0", false, &["std"])]);
        let head = CommitHash::from(fixture.commit(
            &[
                ("2/ab", ab.as_str()),
                ("2/cd", "garbage\n"),
                ("2/ef", ef.as_str()),
            ],
            "init",
        )?);

        let store_dir = TempDir::new()?;
        let store = IndexStore::open(store_dir.path())?;
        let repo = RegistryRepository::open(fixture.path())?;

        let report = run_update(&repo, &store, &CommitHash::invalid(), &head, 4)?;
        assert_eq!(report.crates_written, 3);
        assert_eq!(store.get("ab")?.expect("ab is indexed").versions().len(), 1);
        assert!(store.get("cd")?.expect("cd is indexed").versions().is_empty());
        assert_eq!(
            store.get("ef")?.expect("ef is indexed").versions()[0].features(),
            ["std".to_string()]
        );
        Ok(())
    }

    #[test]
    fn test_unknown_head_is_an_error() -> Result<()> {
        let fixture = RegistryFixture::new()?;
        fixture.commit(&[("1/a", "{}\n")], "init")?;

        let store_dir = TempDir::new()?;
        let store = IndexStore::open(store_dir.path())?;
        let repo = RegistryRepository::open(fixture.path())?;

        let result = run_update(
            &repo,
            &store,
            &CommitHash::invalid(),
            &CommitHash::new("d".repeat(40)),
            2,
        );
        assert!(result.is_err());
        assert!(store.is_empty());
        Ok(())
    }
}
