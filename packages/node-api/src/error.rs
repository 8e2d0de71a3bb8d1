//! Standard error response body.

use serde::{Deserialize, Serialize};

/// The JSON body returned for all error responses, and embedded per
/// category in a [`ClosureResponse`](crate::ClosureResponse).
///
/// ```json
/// { "error": "unknown curie prefix \"XYZ\"", "code": "unknown_curie_prefix" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Human-readable description of the problem.
    pub error: String,

    /// Machine-readable error code.
    ///
    /// | `code` | HTTP status |
    /// |--------|------------|
    /// | `invalid_json` | 400 |
    /// | `invalid_parameter` | 400 |
    /// | `unknown_curie_prefix` | 404 |
    /// | `not_found` | 404 |
    /// | `traversal_failure` | 500 |
    /// | `internal_error` | 500 |
    /// | `store_unavailable` | 503 |
    /// | `timeout` | 504 |
    pub code: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            error: error.into(),
        }
    }
}

impl From<&ontoweft::Error> for ErrorResponse {
    fn from(e: &ontoweft::Error) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

/// Well-known error codes.
pub mod codes {
    pub const INVALID_JSON: &str = "invalid_json";
    pub const INVALID_PARAMETER: &str = "invalid_parameter";
    pub const UNKNOWN_CURIE_PREFIX: &str = "unknown_curie_prefix";
    pub const NOT_FOUND: &str = "not_found";
    pub const TRAVERSAL_FAILURE: &str = "traversal_failure";
    pub const CANCELLED: &str = "cancelled";
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const STORE_UNAVAILABLE: &str = "store_unavailable";
    pub const TIMEOUT: &str = "timeout";
}
