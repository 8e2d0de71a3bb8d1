//! The curie registry: an ordered `prefix → namespace` map.
//!
//! A [`CurieRegistry`] is built once and never mutated afterwards. Reloading
//! means building a new registry and swapping it into a
//! [`SharedCurieRegistry`]; readers holding the old `Arc` keep a complete,
//! consistent map until they drop it.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Error;
use crate::validation::is_valid_prefix;

/// One `prefix → namespace` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurieEntry {
    pub prefix: String,
    pub namespace: String,
}

/// Errors from building a [`CurieRegistry`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CurieError {
    #[error("prefix {0:?} is declared more than once")]
    DuplicatePrefix(String),

    #[error(
        "prefix {0:?} is invalid; prefixes start with a letter or underscore \
         and contain only letters, digits, '_', '-' or '.'"
    )]
    InvalidPrefix(String),

    #[error("namespace for prefix {0:?} must not be empty")]
    EmptyNamespace(String),

    #[error("curie map must be a JSON object of strings: {0}")]
    Malformed(String),
}

/// An immutable, insertion-ordered curie map.
///
/// Lookups are exact and case-sensitive: `go` and `GO` are different
/// prefixes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurieRegistry {
    entries: Vec<CurieEntry>,
    index: HashMap<String, usize>,
}

impl CurieRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `(prefix, namespace)` pairs, keeping their order.
    pub fn from_entries<I, P, N>(entries: I) -> Result<Self, CurieError>
    where
        I: IntoIterator<Item = (P, N)>,
        P: Into<String>,
        N: Into<String>,
    {
        let mut registry = Self::new();
        for (prefix, namespace) in entries {
            let (prefix, namespace) = (prefix.into(), namespace.into());
            if !is_valid_prefix(&prefix) {
                return Err(CurieError::InvalidPrefix(prefix));
            }
            if namespace.is_empty() {
                return Err(CurieError::EmptyNamespace(prefix));
            }
            if registry.index.contains_key(&prefix) {
                return Err(CurieError::DuplicatePrefix(prefix));
            }
            registry.index.insert(prefix.clone(), registry.entries.len());
            registry.entries.push(CurieEntry { prefix, namespace });
        }
        Ok(registry)
    }

    /// Parse a JSON object `{ "GO": "http://purl.obolibrary.org/obo/GO_", ... }`.
    ///
    /// Key order in the document becomes registry order.
    pub fn from_json(json: &str) -> Result<Self, CurieError> {
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(json).map_err(|e| CurieError::Malformed(e.to_string()))?;
        let mut pairs = Vec::with_capacity(map.len());
        for (prefix, value) in map {
            match value {
                serde_json::Value::String(ns) => pairs.push((prefix, ns)),
                other => {
                    return Err(CurieError::Malformed(format!(
                        "value for {prefix:?} is {other}, not a string"
                    )))
                }
            }
        }
        Self::from_entries(pairs)
    }

    /// The namespace registered for `prefix`, if any.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.index
            .get(prefix)
            .map(|&i| self.entries[i].namespace.as_str())
    }

    /// Like [`resolve`](Self::resolve), but an absent prefix is an
    /// [`Error::UnknownCuriePrefix`].
    pub fn try_resolve(&self, prefix: &str) -> Result<&str, Error> {
        self.resolve(prefix)
            .ok_or_else(|| Error::UnknownCuriePrefix(prefix.to_string()))
    }

    /// Every entry, in build order.
    pub fn all(&self) -> &[CurieEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The registry as a JSON object, in build order.
    pub fn to_json_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.entries
            .iter()
            .map(|e| (e.prefix.clone(), serde_json::Value::String(e.namespace.clone())))
            .collect()
    }

    /// The prefix whose namespace is exactly `namespace`.
    pub fn prefix_for(&self, namespace: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.namespace == namespace)
            .map(|e| e.prefix.as_str())
    }

    /// Expand `prefix:fragment` to a full IRI. Returns `None` when the text
    /// is not a curie or the prefix is unknown.
    pub fn expand(&self, curie: &str) -> Option<String> {
        let (prefix, fragment) = split_curie(curie)?;
        self.resolve(prefix).map(|ns| format!("{ns}{fragment}"))
    }

    /// Shorten `iri` to a curie using the longest matching namespace.
    pub fn compact(&self, iri: &str) -> Option<String> {
        self.entries
            .iter()
            .filter(|e| iri.starts_with(&e.namespace))
            .max_by_key(|e| e.namespace.len())
            .map(|e| format!("{}:{}", e.prefix, &iri[e.namespace.len()..]))
    }

    /// Whether `text` already begins with one of the registered namespaces.
    pub(crate) fn is_expanded(&self, text: &str) -> bool {
        self.entries.iter().any(|e| text.starts_with(&e.namespace))
    }
}

/// Split `prefix:fragment` at the first colon.
///
/// Absolute IRIs (`http://…`, `urn://…`) are not curies: a fragment starting
/// with `//` yields `None`, as does text without a colon.
pub fn split_curie(text: &str) -> Option<(&str, &str)> {
    let (prefix, fragment) = text.split_once(':')?;
    if fragment.starts_with("//") {
        return None;
    }
    Some((prefix, fragment))
}

// ---------------------------------------------------------------------------
// SharedCurieRegistry
// ---------------------------------------------------------------------------

/// A process-wide handle to the current [`CurieRegistry`].
///
/// [`snapshot`](Self::snapshot) hands out the current registry; [`swap`](Self::swap)
/// replaces it wholesale. Readers never observe a partially-built map.
#[derive(Debug, Clone, Default)]
pub struct SharedCurieRegistry {
    current: Arc<RwLock<Arc<CurieRegistry>>>,
}

impl SharedCurieRegistry {
    pub fn new(registry: CurieRegistry) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    /// The registry in effect right now.
    pub fn snapshot(&self) -> Arc<CurieRegistry> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Install `registry`, returning the one it replaced.
    pub fn swap(&self, registry: CurieRegistry) -> Arc<CurieRegistry> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *guard, Arc::new(registry));
        tracing::info!(
            previous = previous.len(),
            current = guard.len(),
            "curie registry swapped"
        );
        previous
    }
}

impl From<CurieRegistry> for SharedCurieRegistry {
    fn from(registry: CurieRegistry) -> Self {
        Self::new(registry)
    }
}
