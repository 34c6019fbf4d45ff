//! Type definitions for the registry index
//!
//! This module provides the strongly-typed values that flow between the
//! repository reader, the record parser and the persistent store.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

const INVALID_COMMIT_HASH: &str = "<invalid>";

/// A commit hash of the registry repository, or the invalid sentinel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitHash(String);

impl CommitHash {
    /// Create a commit hash from its hex representation
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// The sentinel used when no commit is indexed or the head cannot be resolved
    pub fn invalid() -> Self {
        Self(INVALID_COMMIT_HASH.to_string())
    }

    pub fn is_valid(&self) -> bool {
        self.0 != INVALID_COMMIT_HASH
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse into a git object id, `None` for the sentinel or malformed input
    pub fn to_oid(&self) -> Option<git2::Oid> {
        if !self.is_valid() {
            return None;
        }
        git2::Oid::from_str(&self.0).ok()
    }
}

impl Default for CommitHash {
    fn default() -> Self {
        Self::invalid()
    }
}

impl From<git2::Oid> for CommitHash {
    fn from(oid: git2::Oid) -> Self {
        Self(oid.to_string())
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One published version of a crate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrateVersion {
    version: String,
    yanked: bool,
    features: Vec<String>,
}

impl CrateVersion {
    pub fn new(version: impl Into<String>, yanked: bool, features: Vec<String>) -> Self {
        Self {
            version: version.into(),
            yanked,
            features,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_yanked(&self) -> bool {
        self.yanked
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    fn semver(&self) -> Option<semver::Version> {
        semver::Version::parse(&self.version).ok()
    }
}

/// A crate as recorded in the registry: its name and versions in publication order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crate {
    name: String,
    versions: Vec<CrateVersion>,
}

impl Crate {
    pub fn new(name: impl Into<String>, versions: Vec<CrateVersion>) -> Self {
        Self {
            name: name.into(),
            versions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Versions in the order they appear in the registry file
    pub fn versions(&self) -> &[CrateVersion] {
        &self.versions
    }

    /// Versions ordered by semantic version; unparseable versions follow in registry order
    pub fn sorted_versions(&self) -> Vec<&CrateVersion> {
        let mut versions: Vec<(Option<semver::Version>, &CrateVersion)> =
            self.versions.iter().map(|v| (v.semver(), v)).collect();
        versions.sort_by(|(a, _), (b, _)| match (a, b) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        versions.into_iter().map(|(_, v)| v).collect()
    }

    /// The highest version that has not been yanked
    pub fn latest_version(&self) -> Option<&CrateVersion> {
        self.versions
            .iter()
            .filter(|v| !v.is_yanked())
            .filter_map(|v| v.semver().map(|parsed| (parsed, v)))
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, v)| v)
    }
}
