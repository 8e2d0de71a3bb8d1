use serde::{Deserialize, Serialize};

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// Always `"ok"` when the node can answer.
    pub status: String,
    /// Number of prefixes in the current curie registry.
    pub curies: usize,
}

impl HealthResponse {
    pub fn ok(curies: usize) -> Self {
        Self {
            status: "ok".into(),
            curies,
        }
    }
}
