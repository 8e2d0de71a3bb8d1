//! Public surface for the `ontoweft-node` crate.
//!
//! Exposes the router builder, state and config types so that external
//! crates (e.g. the conformance test suite) can spin up an in-process node
//! without spawning a subprocess.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod storage;

pub use config::{ConfigError, JsonSource, NodeConfig};
pub use handlers::AppState;
pub use router::build_router;
pub use storage::{open_store, sqlite::SqliteGraph, StartupError};
