//! Git-backed registry fixtures for unit tests

use anyhow::Result;
use git2::{Oid, Repository, Signature};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub struct RegistryFixture {
    dir: TempDir,
    repo: Repository,
}

impl RegistryFixture {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let repo = Repository::init(dir.path())?;
        Ok(Self { dir, repo })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `files` into the working tree and commit them on top of HEAD
    pub fn commit(&self, files: &[(&str, &str)], message: &str) -> Result<Oid> {
        let mut index = self.repo.index()?;
        for (path, contents) in files {
            let full_path = self.dir.path().join(path);
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&full_path, contents)?;
            index.add_path(Path::new(path))?;
        }
        index.write()?;
        let tree_id = index.write_tree()?;
        self.commit_tree(tree_id, message)
    }

    /// Commit the current HEAD tree again, producing a commit with no changes
    pub fn commit_unchanged(&self, message: &str) -> Result<Oid> {
        let tree_id = self.repo.head()?.peel_to_tree()?.id();
        self.commit_tree(tree_id, message)
    }

    /// Delete `path` from the working tree and the index; the next commit drops it
    pub fn remove(&self, path: &str) -> Result<()> {
        fs::remove_file(self.dir.path().join(path))?;
        let mut index = self.repo.index()?;
        index.remove_path(Path::new(path))?;
        index.write()?;
        Ok(())
    }

    pub fn set_ref(&self, refname: &str, oid: Oid) -> Result<()> {
        self.repo.reference(refname, oid, true, "fixture")?;
        Ok(())
    }

    fn commit_tree(&self, tree_id: Oid, message: &str) -> Result<Oid> {
        let tree = self.repo.find_tree(tree_id)?;
        let sig = Signature::now("Test", "test@test.com")?;
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();
        Ok(self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?)
    }
}

/// Registry layout path for a crate name (`1/a`, `2/ab`, `3/a/abc`, `se/rd/serde`)
pub fn registry_path(name: &str) -> String {
    match name.len() {
        1 => format!("1/{name}"),
        2 => format!("2/{name}"),
        3 => format!("3/{}/{name}", &name[..1]),
        _ => format!("{}/{}/{name}", &name[..2], &name[2..4]),
    }
}

/// One registry line for `name`
pub fn record(name: &str, vers: &str, yanked: bool, features: &[&str]) -> String {
    let features: serde_json::Map<String, serde_json::Value> = features
        .iter()
        .map(|f| (f.to_string(), serde_json::Value::Array(Vec::new())))
        .collect();
    serde_json::json!({
        "name": name,
        "vers": vers,
        "yanked": yanked,
        "features": features,
    })
    .to_string()
}
