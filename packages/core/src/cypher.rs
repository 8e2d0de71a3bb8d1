//! Curie-aware Cypher helpers.
//!
//! Two operations sit on top of the [`CurieRegistry`]:
//!
//! - [`rewrite_relationships`] expands `prefix:fragment` relationship types
//!   inside `-[...]-` patterns. Node patterns, string literals, comments and
//!   `START` clauses are left alone, and unknown prefixes are kept as written.
//! - [`CypherResolver::lookup_entities_by_curie`] turns a curie into an IRI
//!   prefix pattern and fetches matching nodes from the store.

use std::sync::Arc;

use crate::curie::{split_curie, CurieRegistry, SharedCurieRegistry};
use crate::error::{Error, Result};
use crate::store::{GraphStore, IriPattern};
use crate::types::Entity;
use crate::validation::validate_limit;

/// Entity lookup limit when the caller gives none.
pub const DEFAULT_ENTITY_LIMIT: usize = 20;

/// Rewrite every resolvable relationship-type curie in `query`.
///
/// ```text
/// MATCH (n)-[r:BFO:0000050|RO:0002131*1..2]->(m)
/// MATCH (n)-[r:`http://purl.obolibrary.org/obo/BFO_0000050`|`http://purl.obolibrary.org/obo/RO_0002131`*1..2]->(m)
/// ```
///
/// Resolved types are backtick-quoted. Types that already start with a
/// registered namespace are not touched again, so the rewrite is idempotent.
pub fn rewrite_relationships(query: &str, curies: &CurieRegistry) -> String {
    if curies.is_empty() {
        return query.to_string();
    }
    let bytes = query.as_bytes();
    let mut out = String::with_capacity(query.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            q @ (b'\'' | b'"' | b'`') => i = skip_quoted(bytes, i, q),
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |p| i + p);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = query[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |p| i + 2 + p + 2);
            }
            b'[' if preceded_by_dash(bytes, i) => {
                let Some(close) = find_closing_bracket(bytes, i) else {
                    break;
                };
                let body = &query[i + 1..close];
                let rewritten = rewrite_body(body, curies);
                if rewritten != body {
                    out.push_str(&query[copied..=i]);
                    out.push_str(&rewritten);
                    copied = close;
                }
                i = close + 1;
            }
            _ => i += 1,
        }
    }
    out.push_str(&query[copied..]);
    out
}

/// Index just past the closing `quote` of the quoted run starting at `start`.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote != b'`' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn preceded_by_dash(bytes: &[u8], open: usize) -> bool {
    bytes[..open]
        .iter()
        .rev()
        .find(|b| !b.is_ascii_whitespace())
        == Some(&b'-')
}

fn find_closing_bracket(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            q @ (b'\'' | b'"' | b'`') => {
                i = skip_quoted(bytes, i, q);
                continue;
            }
            b'[' => depth += 1,
            b']' if depth == 0 => return Some(i),
            b']' => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Rewrite the types of one relationship pattern body (`r:A|B*1..3 {..}`).
fn rewrite_body(body: &str, curies: &CurieRegistry) -> String {
    let bytes = body.as_bytes();
    let mut i = skip_ws(bytes, 0);
    while i < bytes.len() && is_ident_byte(bytes[i]) {
        i += 1;
    }
    i = skip_ws(bytes, i);
    if bytes.get(i) != Some(&b':') {
        return body.to_string();
    }

    let mut out = String::with_capacity(body.len());
    let mut copied = 0;
    loop {
        if bytes.get(i) == Some(&b':') {
            i += 1;
        }
        i = skip_ws(bytes, i);
        let (start, end, token, next) = match bytes.get(i) {
            Some(b'`') => {
                let next = skip_quoted(bytes, i, b'`');
                let inner_end = next.saturating_sub(1).max(i + 1);
                (i, next, &body[i + 1..inner_end], next)
            }
            Some(_) => {
                let mut j = i;
                while j < bytes.len() && !matches!(bytes[j], b'|' | b'*' | b'{' | b']')
                    && !bytes[j].is_ascii_whitespace()
                {
                    j += 1;
                }
                (i, j, &body[i..j], j)
            }
            None => break,
        };
        if let Some(resolved) = resolve_type(token, curies) {
            out.push_str(&body[copied..start]);
            out.push('`');
            out.push_str(&resolved);
            out.push('`');
            copied = end;
        }
        i = skip_ws(bytes, next);
        if bytes.get(i) == Some(&b'|') {
            i += 1;
            i = skip_ws(bytes, i);
        } else {
            break;
        }
    }
    out.push_str(&body[copied..]);
    out
}

fn resolve_type(token: &str, curies: &CurieRegistry) -> Option<String> {
    if token.is_empty() || curies.is_expanded(token) {
        return None;
    }
    curies.expand(token)
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

// ---------------------------------------------------------------------------
// CypherResolver
// ---------------------------------------------------------------------------

/// Query resolution and curie entity lookup against the current registry.
#[derive(Clone)]
pub struct CypherResolver {
    curies: SharedCurieRegistry,
    store: Arc<dyn GraphStore>,
    default_limit: usize,
}

impl CypherResolver {
    pub fn new(curies: SharedCurieRegistry, store: Arc<dyn GraphStore>) -> Self {
        Self {
            curies,
            store,
            default_limit: DEFAULT_ENTITY_LIMIT,
        }
    }

    /// Use `limit` when [`lookup_entities_by_curie`](Self::lookup_entities_by_curie)
    /// is called without one. Zero keeps the current default.
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        if limit > 0 {
            self.default_limit = limit;
        }
        self
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// The shared registry handle; swapping it affects every clone of this
    /// resolver.
    pub fn curies(&self) -> &SharedCurieRegistry {
        &self.curies
    }

    pub fn resolve_relationships(&self, query: &str) -> String {
        rewrite_relationships(query, &self.curies.snapshot())
    }

    /// The current `prefix → namespace` map, in registry order.
    pub fn curie_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.curies.snapshot().to_json_map()
    }

    /// Nodes whose IRI starts with the expansion of `curie`.
    ///
    /// `curie` is a bare prefix (`GO`) or a prefix with a fragment start
    /// (`GO:0008`). An unregistered prefix is [`Error::UnknownCuriePrefix`].
    /// At most `limit` entities are returned, defaulting to
    /// [`default_limit`](Self::default_limit).
    pub fn lookup_entities_by_curie(&self, curie: &str, limit: Option<i64>) -> Result<Vec<Entity>> {
        let limit = match limit {
            Some(l) => validate_limit(l)?,
            None => self.default_limit,
        };
        let (prefix, fragment) = if curie.contains(':') {
            split_curie(curie).ok_or_else(|| {
                Error::InvalidInput(format!("{curie:?} is an IRI, not a curie"))
            })?
        } else {
            (curie, "")
        };
        if prefix.is_empty() {
            return Err(Error::InvalidInput("curie prefix must not be empty".into()));
        }

        let registry = self.curies.snapshot();
        let namespace = registry.try_resolve(prefix)?;
        let pattern = IriPattern::starting_with(format!("{namespace}{fragment}"));
        tracing::debug!(%pattern, limit, "looking up entities");

        let mut found = self.store.find_by_pattern(&pattern, limit)?;
        found.truncate(limit);
        Ok(found)
    }
}
