//! Changed-file detection between two registry commits
//!
//! Diffing is an optimization: whenever the previous commit is unknown or the
//! diff cannot be computed, every registry file is treated as changed.

use anyhow::{Context, Result};
use git2::{Delta, ObjectType, Oid, TreeWalkMode, TreeWalkResult};
use std::collections::BTreeSet;
use std::path::Path;

use crate::index::parser::crate_name_for_path;
use crate::index::repository::RegistryRepository;
use crate::index::types::CommitHash;

/// Files that changed between the indexed commit and the new head
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangedPaths {
    /// Every file must be reprocessed (full reindex)
    All,
    /// Exactly these paths changed; may be empty
    Paths(BTreeSet<String>),
}

impl ChangedPaths {
    pub fn is_all(&self) -> bool {
        matches!(self, ChangedPaths::All)
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            ChangedPaths::All => None,
            ChangedPaths::Paths(paths) => Some(paths.len()),
        }
    }
}

/// A registry data file in the new tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub crate_name: String,
    pub path: String,
    pub blob_id: Oid,
}

/// Compute the paths added or modified between `old` and `new`
///
/// Deleted files are not reported: crates are never removed individually.
pub fn changed_paths(
    repo: &RegistryRepository,
    old: &CommitHash,
    new: &CommitHash,
) -> ChangedPaths {
    let Some(old_commit) = repo.find_commit(old) else {
        tracing::info!(previous = %old, "No usable previous commit, reindexing every crate");
        return ChangedPaths::All;
    };

    match diff_commits(repo, &old_commit, new) {
        Ok(paths) => ChangedPaths::Paths(paths),
        Err(e) => {
            tracing::warn!(
                previous = %old,
                head = %new,
                "Failed to diff registry commits, reindexing every crate: {:#}",
                e
            );
            ChangedPaths::All
        }
    }
}

fn diff_commits(
    repo: &RegistryRepository,
    old_commit: &git2::Commit<'_>,
    new: &CommitHash,
) -> Result<BTreeSet<String>> {
    let new_commit = repo
        .find_commit(new)
        .with_context(|| format!("Head commit {new} not found"))?;
    let old_tree = old_commit.tree()?;
    let new_tree = new_commit.tree()?;

    let diff = repo
        .repo()
        .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), None)?;

    let paths = diff
        .deltas()
        .filter(|delta| delta.status() != Delta::Deleted)
        .filter_map(|delta| delta.new_file().path().and_then(Path::to_str))
        .map(str::to_string)
        .collect();
    Ok(paths)
}

/// Resolve the changed paths to registry data files in the `head` tree
pub fn registry_entries(
    repo: &RegistryRepository,
    head: &CommitHash,
    changed: &ChangedPaths,
) -> Result<Vec<RegistryEntry>> {
    let commit = repo
        .find_commit(head)
        .with_context(|| format!("Head commit {head} not found in registry repository"))?;
    let tree = commit.tree().context("Failed to read head tree")?;

    let mut entries = Vec::new();
    match changed {
        ChangedPaths::All => {
            tree.walk(TreeWalkMode::PreOrder, |root, entry| {
                if entry.kind() == Some(ObjectType::Blob) {
                    if let Some(name) = entry.name() {
                        push_entry(&mut entries, format!("{root}{name}"), entry.id());
                    }
                }
                TreeWalkResult::Ok
            })
            .context("Failed to walk registry tree")?;
        }
        ChangedPaths::Paths(paths) => {
            for path in paths {
                match tree.get_path(Path::new(path)) {
                    Ok(entry) if entry.kind() == Some(ObjectType::Blob) => {
                        push_entry(&mut entries, path.clone(), entry.id());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(path = %path, "Changed path missing from head tree: {}", e);
                    }
                }
            }
        }
    }

    Ok(entries)
}

fn push_entry(entries: &mut Vec<RegistryEntry>, path: String, blob_id: Oid) {
    if let Some(crate_name) = crate_name_for_path(&path) {
        entries.push(RegistryEntry {
            crate_name: crate_name.to_string(),
            path,
            blob_id,
        });
    }
}
