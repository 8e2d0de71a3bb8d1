//! Cypher utility handlers.
//!
//! - `GET  /cypher/resolve`        rewrite relationship curies in a query
//! - `GET  /cypher/curies`         the current curie map
//! - `POST /cypher/curies/reload`  re-read the configured curie map
//! - `GET  /cypher/entities`       nodes under a curie prefix

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use ontoweft_node_api::{CurieMap, EntitiesQuery, EntitiesResponse, ResolveQuery};

use super::AppState;
use crate::error::AppError;

/// `GET /cypher/resolve?cypherQuery=…`
///
/// Returns the query as `text/plain` with every resolvable relationship
/// curie replaced by its full IRI. Unknown prefixes are left as written.
pub async fn resolve(
    State(state): State<AppState>,
    query: Result<Query<ResolveQuery>, QueryRejection>,
) -> Result<String, AppError> {
    let Query(params) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(state.resolver.resolve_relationships(&params.cypher_query))
}

/// `GET /cypher/curies`
pub async fn curies(State(state): State<AppState>) -> Json<CurieMap> {
    Json(state.resolver.curie_map())
}

/// `POST /cypher/curies/reload`
///
/// Re-reads `OWEFT_CURIES` and swaps the registry in one step. On error the
/// current registry stays in place.
pub async fn reload(State(state): State<AppState>) -> Result<Json<CurieMap>, AppError> {
    let config = state.config.clone();
    let registry = tokio::task::spawn_blocking(move || config.load_curies()).await??;
    state.resolver.curies().swap(registry);
    Ok(Json(state.resolver.curie_map()))
}

/// `GET /cypher/entities?curie=…&limit=…`
pub async fn entities(
    State(state): State<AppState>,
    query: Result<Query<EntitiesQuery>, QueryRejection>,
) -> Result<Json<EntitiesResponse>, AppError> {
    let Query(params) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let resolver = state.resolver.clone();
    let curie = params.curie.clone();
    let entities =
        tokio::task::spawn_blocking(move || resolver.lookup_entities_by_curie(&curie, params.limit))
            .await??;
    Ok(Json(EntitiesResponse {
        curie: params.curie,
        entities,
    }))
}
