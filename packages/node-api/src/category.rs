//! Category closure types: `POST /categories/closure`.

use std::collections::BTreeMap;

use ontoweft::{CategoryClosure, CategorySpec, ClosureReport, NodeId};
use serde::{Deserialize, Serialize};

use crate::error::ErrorResponse;

/// Request body for `POST /categories/closure`.
///
/// Categories are keyed by root (an IRI or a curie), mapping to the label
/// the result is reported under.
///
/// ```json
/// { "categories": { "CL:0000000": "cell", "http://purl.obolibrary.org/obo/UBERON_0000062": "organ" } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClosureRequest {
    pub categories: BTreeMap<String, String>,
}

impl ClosureRequest {
    pub fn specs(&self) -> Vec<CategorySpec> {
        self.categories
            .iter()
            .map(|(root, label)| CategorySpec::new(root.clone(), label.clone()))
            .collect()
    }
}

/// The outcome for one category: its node set, or why it failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CategoryOutcome {
    Closure { root: NodeId, nodes: Vec<NodeId> },
    Failed { error: ErrorResponse },
}

impl From<&CategoryClosure> for CategoryOutcome {
    fn from(c: &CategoryClosure) -> Self {
        CategoryOutcome::Closure {
            root: c.root,
            nodes: c.nodes.clone(),
        }
    }
}

/// Response body for `POST /categories/closure`.
///
/// One entry per requested label. The response is `200 OK` even when some
/// categories failed; their entries carry an [`ErrorResponse`].
///
/// ```json
/// {
///   "categories": {
///     "cell": { "root": 0, "nodes": [0, 1, 2] },
///     "organ": { "error": { "error": "...", "code": "invalid_parameter" } }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClosureResponse {
    pub categories: BTreeMap<String, CategoryOutcome>,
}

impl From<&ClosureReport> for ClosureResponse {
    fn from(report: &ClosureReport) -> Self {
        let categories = report
            .iter()
            .map(|(label, result)| {
                let outcome = match result {
                    Ok(closure) => CategoryOutcome::from(closure),
                    Err(e) => CategoryOutcome::Failed {
                        error: ErrorResponse::from(e),
                    },
                };
                (label.to_string(), outcome)
            })
            .collect();
        Self { categories }
    }
}
