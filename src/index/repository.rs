//! Read-only access to the local registry repository

use anyhow::{Context, Result};
use git2::{Blob, Commit, ErrorCode, Oid, Repository};
use std::path::{Path, PathBuf};

use crate::index::constants::HEAD_REF_CANDIDATES;
use crate::index::types::CommitHash;

/// A local clone of the registry index
pub struct RegistryRepository {
    repo: Repository,
    path: PathBuf,
}

impl RegistryRepository {
    /// Open the repository at `path` (bare or with a working directory)
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::open(path)
            .with_context(|| format!("Failed to open registry repository at {}", path.display()))?;
        Ok(Self {
            repo,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The git directory (`.git` for a working clone, the root for a bare one)
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Resolve the registry head, trying each known ref convention in order
    ///
    /// Returns [`CommitHash::invalid`] when no ref resolves.
    pub fn resolve_head(&self) -> CommitHash {
        for refname in HEAD_REF_CANDIDATES {
            match self.resolve_ref(refname) {
                Ok(Some(oid)) => return CommitHash::from(oid),
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!(refname, "Failed to resolve registry ref: {}", e);
                }
            }
        }

        tracing::error!(
            path = %self.path.display(),
            "Failed to resolve the registry head (tried {})",
            HEAD_REF_CANDIDATES.join(", ")
        );
        CommitHash::invalid()
    }

    fn resolve_ref(&self, refname: &str) -> Result<Option<Oid>, git2::Error> {
        match self.repo.revparse_single(refname) {
            Ok(object) => Ok(Some(object.peel_to_commit()?.id())),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Look up a commit, `None` for the sentinel or an unknown hash
    pub fn find_commit(&self, hash: &CommitHash) -> Option<Commit<'_>> {
        let oid = hash.to_oid()?;
        match self.repo.find_commit(oid) {
            Ok(commit) => Some(commit),
            Err(e) => {
                tracing::debug!(%hash, "Commit not found in registry repository: {}", e);
                None
            }
        }
    }

    pub fn find_blob(&self, oid: Oid) -> Result<Blob<'_>> {
        self.repo
            .find_blob(oid)
            .with_context(|| format!("Failed to read registry blob {oid}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::constants::{HEAD_REF, LEGACY_HEAD_REF};
    use crate::index::test_support::RegistryFixture;

    #[test]
    fn test_resolves_origin_head() -> Result<()> {
        let fixture = RegistryFixture::new()?;
        let commit = fixture.commit(&[("se/rd/serde", "{}\n")], "add serde")?;
        fixture.set_ref(HEAD_REF, commit)?;

        let repo = RegistryRepository::open(fixture.path())?;
        assert_eq!(repo.resolve_head(), CommitHash::from(commit));
        Ok(())
    }

    #[test]
    fn test_resolves_legacy_master_ref() -> Result<()> {
        let fixture = RegistryFixture::new()?;
        let commit = fixture.commit(&[("se/rd/serde", "{}\n")], "add serde")?;
        fixture.set_ref(LEGACY_HEAD_REF, commit)?;

        let repo = RegistryRepository::open(fixture.path())?;
        assert_eq!(repo.resolve_head(), CommitHash::from(commit));
        Ok(())
    }

    #[test]
    fn test_origin_head_wins_over_legacy_ref() -> Result<()> {
        let fixture = RegistryFixture::new()?;
        let old = fixture.commit(&[("1/a", "{}\n")], "old")?;
        let new = fixture.commit(&[("1/b", "{}\n")], "new")?;
        fixture.set_ref(LEGACY_HEAD_REF, old)?;
        fixture.set_ref(HEAD_REF, new)?;

        let repo = RegistryRepository::open(fixture.path())?;
        assert_eq!(repo.resolve_head(), CommitHash::from(new));
        Ok(())
    }

    #[test]
    fn test_unresolvable_head_is_invalid() -> Result<()> {
        let fixture = RegistryFixture::new()?;
        fixture.commit(&[("1/a", "{}\n")], "local only")?;

        let repo = RegistryRepository::open(fixture.path())?;
        assert!(!repo.resolve_head().is_valid());
        Ok(())
    }

    #[test]
    fn test_open_missing_repository_fails() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        assert!(RegistryRepository::open(&temp_dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_find_commit_rejects_unknown_hashes() -> Result<()> {
        let fixture = RegistryFixture::new()?;
        fixture.commit(&[("1/a", "{}\n")], "init")?;

        let repo = RegistryRepository::open(fixture.path())?;
        assert!(repo.find_commit(&CommitHash::invalid()).is_none());
        assert!(repo.find_commit(&CommitHash::new("f".repeat(40))).is_none());
        Ok(())
    }
}
