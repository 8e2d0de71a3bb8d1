//! Graph storage for the OntoWeft node.
//!
//! The node reads its graph through [`ontoweft::GraphStore`]. Which
//! implementation backs it is decided once at startup by [`open_store`].
//!
//! # Implementations
//!
//! | Type | When to use |
//! |------|-------------|
//! | [`MemoryGraph`] | Tests, conformance suite, ephemeral nodes |
//! | [`SqliteGraph`] | Production; durable single-file database |
//!
//! [`MemoryGraph`]: ontoweft::MemoryGraph
//! [`SqliteGraph`]: sqlite::SqliteGraph

pub mod sqlite;

use std::sync::Arc;

use ontoweft::{GraphStore, MemoryGraph, StoreError};

use crate::config::{ConfigError, NodeConfig};
use sqlite::SqliteGraph;

/// Errors that prevent the store from opening.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to open SQLite database at {path}: {source}")]
    Sqlite {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to import graph document: {0}")]
    Import(#[from] StoreError),
}

/// Open the store named by `config` and import the configured graph into it.
///
/// With `db_path` set the graph lives in SQLite and survives restarts;
/// otherwise it is held in memory.
pub fn open_store(config: &NodeConfig) -> Result<Arc<dyn GraphStore>, StartupError> {
    let doc = config.load_graph()?;
    match &config.db_path {
        Some(path) => {
            tracing::info!("storage: SQLite at {path}");
            let graph = SqliteGraph::open(path).map_err(|source| StartupError::Sqlite {
                path: path.clone(),
                source,
            })?;
            if let Some(doc) = &doc {
                graph.import(doc)?;
            }
            Ok(Arc::new(graph))
        }
        None => {
            tracing::info!("storage: in-memory (data will not survive restart)");
            let graph = match &doc {
                Some(doc) => MemoryGraph::from_document(doc)?,
                None => MemoryGraph::new(),
            };
            tracing::info!(
                nodes = graph.len(),
                edges = graph.edge_count(),
                "graph loaded"
            );
            Ok(Arc::new(graph))
        }
    }
}
