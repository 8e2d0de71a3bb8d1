//! Assembles the Axum [`Router`] from all handler modules.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{categories, cypher, health, AppState};

/// Build the complete application router with shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Cypher utilities
        .route("/cypher/resolve", get(cypher::resolve))
        .route("/cypher/curies", get(cypher::curies))
        .route("/cypher/curies/reload", post(cypher::reload))
        .route("/cypher/entities", get(cypher::entities))
        // Category closure
        .route("/categories/closure", post(categories::closure))
        .route("/health", get(health::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
