//! Constants for cache file names and registry layout

/// Directory names
pub const CACHE_ROOT_DIR: &str = ".crates-local-index";
pub const CACHE_DIR: &str = "cache";
pub const STORE_DIR: &str = "store";
pub const CARGO_HOME_DIR: &str = ".cargo";
pub const REGISTRY_DIR: &str = "registry";
pub const REGISTRY_INDEX_DIR: &str = "index";

/// File names
pub const STATE_FILE: &str = "state.json";
pub const STORE_FILE: &str = "crates.db";
pub const STORE_LOCK_FILE: &str = "store.lock";
pub const CORRUPTION_MARKER_FILE: &str = "corruption.marker";

/// Registry metadata file at the root of the index; it never describes a crate
pub const REGISTRY_CONFIG_FILE: &str = "config.json";

/// Source directory Cargo uses for the crates.io git index
pub const CRATES_IO_INDEX_DIR: &str = "github.com-1ecc6299db9ec823";
pub const GIT_INDEX_DIR_PREFIX: &str = "github.com-";

/// Ref Cargo updates after fetching the index
pub const HEAD_REF: &str = "refs/remotes/origin/HEAD";
/// Ref written by Cargo releases that predate `origin/HEAD`
pub const LEGACY_HEAD_REF: &str = "refs/remotes/origin/master";
/// Head refs in resolution order
pub const HEAD_REF_CANDIDATES: &[&str] = &[HEAD_REF, LEGACY_HEAD_REF];

/// Ref directory the watcher reacts to, relative to the git directory
pub const ORIGIN_REFS_DIR: &str = "refs/remotes/origin";
pub const FETCH_HEAD_FILE: &str = "FETCH_HEAD";

/// Defaults
pub const DEFAULT_PARSE_WORKERS: usize = 2;
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
