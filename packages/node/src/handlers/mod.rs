//! HTTP request handlers for the OntoWeft node endpoints.
//!
//! Each submodule covers a logical group of endpoints. Handlers are async
//! functions that receive Axum extractors and return
//! `Result<impl IntoResponse, AppError>`. Store access is blocking, so it
//! runs on the blocking pool.

pub mod categories;
pub mod cypher;
pub mod health;

use std::sync::Arc;

use ontoweft::{ClosureScheduler, CypherResolver, GraphStore, SharedCurieRegistry};

use crate::config::NodeConfig;

/// Shared application state threaded through all Axum handlers via [`axum::extract::State`].
#[derive(Clone)]
pub struct AppState {
    pub resolver: CypherResolver,
    pub scheduler: ClosureScheduler,
    pub config: NodeConfig,
}

impl AppState {
    /// Wire the resolver and scheduler to one store and one curie registry.
    pub fn new(
        store: Arc<dyn GraphStore>,
        curies: SharedCurieRegistry,
        config: NodeConfig,
    ) -> ontoweft::Result<Self> {
        let scheduler = ClosureScheduler::new(Arc::clone(&store), config.scheduler)?;
        let resolver = CypherResolver::new(curies, store).with_default_limit(config.entity_limit);
        Ok(Self {
            resolver,
            scheduler,
            config,
        })
    }
}
