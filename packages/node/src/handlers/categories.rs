//! Category closure handler: `POST /categories/closure`.

use axum::{body::Bytes, extract::State, Json};
use ontoweft_node_api::{ClosureRequest, ClosureResponse};

use super::AppState;
use crate::error::AppError;

/// `POST /categories/closure`
///
/// Computes the closure of every requested category. An empty body, or one
/// whose `categories` map is empty, computes the categories from
/// `OWEFT_CATEGORIES` instead.
///
/// Per-category failures are reported inside the `200 OK` body; only a
/// malformed request or having nothing to compute fails the whole call.
pub async fn closure(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ClosureResponse>, AppError> {
    let request: ClosureRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ClosureRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::InvalidJson(e.to_string()))?
    };

    let specs = if request.categories.is_empty() {
        state.config.categories.clone()
    } else {
        request.specs()
    };
    if specs.is_empty() {
        return Err(AppError::BadRequest(
            "no categories requested and none configured".into(),
        ));
    }

    tracing::info!(categories = specs.len(), "computing category closures");
    let curies = state.resolver.curies().snapshot();
    let report = state.scheduler.compute_categories(&specs, &curies).await;
    Ok(Json(ClosureResponse::from(&report)))
}
