//! Graph store adapter contract.
//!
//! The [`GraphStore`] trait is the seam between OntoWeft and whatever holds
//! the ontology graph. It deliberately exposes single-step expansion
//! ([`ReadTransaction::neighbours`]) instead of a store-side traversal: the
//! global node-uniqueness guarantee belongs to
//! [`Traversal`](crate::traversal::Traversal), not to the store.
//!
//! # Implementations
//!
//! | Type | When to use |
//! |------|-------------|
//! | [`MemoryGraph`](crate::graph::MemoryGraph) | Tests, CLI runs over a JSON graph file, ephemeral nodes |
//! | `SqliteGraph` (in `ontoweft-node`) | Production; durable single-file database |

use crate::types::{Entity, NodeId, RelationshipSpec};

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors that graph store operations can return.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or refused a transaction.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A referenced node does not exist (or no longer exists).
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// An unexpected error in the underlying backend.
    #[error("internal store error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// IriPattern
// ---------------------------------------------------------------------------

/// A namespace match: a literal IRI prefix followed by an unbounded
/// wildcard.
///
/// Keeping the literal part separate from the wildcard means backends never
/// have to interpret regex metacharacters that happen to appear in an IRI
/// (`.`, `?`, `#` are all common).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IriPattern {
    prefix: String,
}

impl IriPattern {
    /// Match every IRI that starts with `prefix`.
    pub fn starting_with(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The literal part of the pattern.
    pub fn literal_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, iri: &str) -> bool {
        iri.starts_with(&self.prefix)
    }

    /// The pattern as an anchored regular expression.
    pub fn to_regex(&self) -> String {
        format!("^{}.*$", regex::escape(&self.prefix))
    }
}

impl std::fmt::Display for IriPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_regex())
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A scoped read transaction.
///
/// Dropping a transaction without calling [`commit`](Self::commit) releases
/// it without committing, so every exit path (including `?` and panics)
/// gives the underlying resources back.
pub trait ReadTransaction: Send {
    /// Return `true` if `node` exists in this transaction's view.
    fn contains(&self, node: NodeId) -> Result<bool, StoreError>;

    /// The nodes one step away from `node` along `spec`.
    ///
    /// `Incoming` yields the sources of edges pointing at `node`, `Outgoing`
    /// the targets of edges leaving it, and `Both` the incoming set followed
    /// by the outgoing set. Returns [`StoreError::NodeNotFound`] if `node`
    /// does not exist.
    fn neighbours(&self, node: NodeId, spec: RelationshipSpec)
        -> Result<Vec<NodeId>, StoreError>;

    /// Commit and release the transaction.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// The persistence contract OntoWeft reads the ontology graph through.
///
/// Implementations must be `Send + Sync + 'static` so they can be held in an
/// `Arc<dyn GraphStore>` and shared by every scheduler worker. Each worker
/// opens its own transaction; transactions are never shared.
pub trait GraphStore: Send + Sync + 'static {
    /// Begin a read-scoped transaction.
    fn begin_read(&self) -> Result<Box<dyn ReadTransaction>, StoreError>;

    /// Look up a node by its exact IRI. Returns `None` if absent.
    fn node_by_iri(&self, iri: &str) -> Result<Option<NodeId>, StoreError>;

    /// Return at most `limit` nodes whose IRI matches `pattern`, ordered by
    /// node id.
    fn find_by_pattern(
        &self,
        pattern: &IriPattern,
        limit: usize,
    ) -> Result<Vec<Entity>, StoreError>;
}
