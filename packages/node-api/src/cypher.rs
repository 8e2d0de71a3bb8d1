//! Cypher utility types: `/cypher/resolve`, `/cypher/curies`,
//! `/cypher/entities`.

use ontoweft::Entity;
use serde::{Deserialize, Serialize};

/// The curie map as served: a JSON object `prefix → namespace` in registry
/// order.
pub type CurieMap = serde_json::Map<String, serde_json::Value>;

/// Query parameters for `GET /cypher/resolve`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolveQuery {
    /// The Cypher query whose relationship curies should be expanded.
    #[serde(rename = "cypherQuery")]
    pub cypher_query: String,
}

/// Query parameters for `GET /cypher/entities`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntitiesQuery {
    /// A bare prefix (`GO`) or a curie (`GO:0008`).
    pub curie: String,

    /// Maximum number of entities. Defaults to the node's configured limit
    /// (20 unless overridden). Must be positive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

/// Response body for `GET /cypher/entities`.
///
/// ```json
/// {
///   "curie": "GO",
///   "entities": [
///     { "id": 4, "iri": "http://purl.obolibrary.org/obo/GO_0005623", "labels": ["cell"] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntitiesResponse {
    /// The curie as requested.
    pub curie: String,
    pub entities: Vec<Entity>,
}
