//! `GET /health`

use axum::{extract::State, Json};
use ontoweft_node_api::HealthResponse;

use super::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(state.resolver.curies().snapshot().len()))
}
