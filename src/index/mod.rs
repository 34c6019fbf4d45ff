//! # Index Module
//!
//! A persistent, incrementally updated mirror of the local Cargo registry
//! index (the git clone under `$CARGO_HOME/registry/index`).
//!
//! ## Key Components
//!
//! - [`repository`] - Opens the registry repository and resolves its head
//! - [`diff`] - Computes the files changed between two registry commits
//! - [`parser`] - Parses registry records into crate versions
//! - [`store`] - Append-only on-disk map from crate name to versions
//! - [`pipeline`] - Diff, parallel parse and store for one update
//! - [`coordinator`] - Lifecycle, queries and update scheduling
//! - [`watcher`] - File-system watcher that triggers updates
//! - [`state`] - Persisted indexed commit and the corruption marker
//! - [`tools`] - MCP tool implementations
//! - [`outputs`] - Output types for the MCP tools

pub mod config;
pub mod constants;
pub mod coordinator;
pub mod diff;
pub mod error;
pub mod outputs;
pub mod parser;
pub mod pipeline;
pub mod repository;
pub mod state;
pub mod store;
pub mod tools;
pub mod types;
pub mod utils;
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::IndexConfig;
pub use coordinator::{CratesLocalIndex, IndexPhase, IndexStatus, UpdateHandle};
pub use error::{IndexError, ParseError, StoreError};
pub use pipeline::UpdateReport;
pub use types::{CommitHash, Crate, CrateVersion};
