use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::store::{GraphStore, IriPattern, ReadTransaction, StoreError};
use crate::types::{Direction, Entity, NodeId, RelationshipSpec};

/// A local, in-memory ontology graph implementing [`GraphStore`].
///
/// The graph is not a storage engine; it is a traversal structure. Load
/// nodes and typed edges from wherever you keep them (a [`GraphDocument`],
/// test fixtures), then hand it to the closure engine or resolver.
///
/// Writers replace the current snapshot copy-on-write; a read transaction
/// pins the snapshot that was current when it began, so concurrent workers
/// always see a consistent graph.
///
/// Nodes are keyed by IRI. Adding an IRI twice returns the existing id.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    current: RwLock<Arc<Snapshot>>,
    counters: Arc<TxCounters>,
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    nodes: BTreeMap<NodeId, Entity>,
    by_iri: HashMap<String, NodeId>,
    /// node → (relationship type, target) for edges leaving the node.
    outgoing: HashMap<NodeId, Vec<(String, NodeId)>>,
    /// node → (relationship type, source) for edges entering the node.
    incoming: HashMap<NodeId, Vec<(String, NodeId)>>,
    next_id: u64,
    edge_count: usize,
}

#[derive(Debug, Default)]
struct TxCounters {
    begun: AtomicUsize,
    committed: AtomicUsize,
    released: AtomicUsize,
}

/// Transaction bookkeeping for a [`MemoryGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionStats {
    /// Transactions opened with [`GraphStore::begin_read`].
    pub begun: usize,
    /// Transactions that reached [`ReadTransaction::commit`].
    pub committed: usize,
    /// Transactions whose resources have been given back (committed or dropped).
    pub released: usize,
}

impl MemoryGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a [`GraphDocument`].
    ///
    /// Edges must reference IRIs declared in `nodes`.
    pub fn from_document(doc: &GraphDocument) -> Result<Self, StoreError> {
        let g = Self::new();
        for node in &doc.nodes {
            g.add_node(node.iri.clone(), node.labels.clone());
        }
        for edge in &doc.edges {
            let source = g.require_iri(&edge.source)?;
            let target = g.require_iri(&edge.target)?;
            g.add_edge(source, target, edge.rel.clone())?;
        }
        Ok(g)
    }

    /// Insert a node. If a node with the same IRI already exists, its id is
    /// returned and the graph is unchanged.
    pub fn add_node(&self, iri: impl Into<String>, labels: Vec<String>) -> NodeId {
        let iri = iri.into();
        self.write(|snap| {
            if let Some(id) = snap.by_iri.get(&iri) {
                return *id;
            }
            let id = NodeId(snap.next_id);
            snap.next_id += 1;
            snap.by_iri.insert(iri.clone(), id);
            snap.nodes.insert(id, Entity { id, iri, labels });
            id
        })
    }

    /// Insert a directed edge `source -[rel]-> target`.
    pub fn add_edge(
        &self,
        source: NodeId,
        target: NodeId,
        rel: impl Into<String>,
    ) -> Result<(), StoreError> {
        let rel = rel.into();
        self.write(|snap| {
            for id in [source, target] {
                if !snap.nodes.contains_key(&id) {
                    return Err(StoreError::NodeNotFound(id));
                }
            }
            snap.outgoing
                .entry(source)
                .or_default()
                .push((rel.clone(), target));
            snap.incoming.entry(target).or_default().push((rel, source));
            snap.edge_count += 1;
            Ok(())
        })
    }

    /// Remove a node and every edge touching it. Returns `false` if the node
    /// was not present.
    pub fn remove_node(&self, id: NodeId) -> bool {
        self.write(|snap| {
            let Some(entity) = snap.nodes.remove(&id) else {
                return false;
            };
            snap.by_iri.remove(&entity.iri);
            let out = snap.outgoing.remove(&id).unwrap_or_default();
            let inc = snap.incoming.remove(&id).unwrap_or_default();
            let self_loops = out.iter().filter(|(_, t)| *t == id).count();
            snap.edge_count -= out.len() + inc.len() - self_loops;
            for (_, target) in out {
                if let Some(edges) = snap.incoming.get_mut(&target) {
                    edges.retain(|(_, s)| *s != id);
                }
            }
            for (_, source) in inc {
                if let Some(edges) = snap.outgoing.get_mut(&source) {
                    edges.retain(|(_, t)| *t != id);
                }
            }
            true
        })
    }

    /// Retrieve a node by id.
    pub fn node(&self, id: NodeId) -> Option<Entity> {
        self.snapshot().nodes.get(&id).cloned()
    }

    /// Total number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.snapshot().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.snapshot().edge_count
    }

    /// Transaction bookkeeping since the graph was created.
    pub fn transactions(&self) -> TransactionStats {
        TransactionStats {
            begun: self.counters.begun.load(Ordering::SeqCst),
            committed: self.counters.committed.load(Ordering::SeqCst),
            released: self.counters.released.load(Ordering::SeqCst),
        }
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Snapshot) -> T) -> T {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        f(Arc::make_mut(&mut guard))
    }

    fn require_iri(&self, iri: &str) -> Result<NodeId, StoreError> {
        self.snapshot()
            .by_iri
            .get(iri)
            .copied()
            .ok_or_else(|| StoreError::Internal(format!("edge references unknown node {iri:?}")))
    }
}

impl GraphStore for MemoryGraph {
    fn begin_read(&self) -> Result<Box<dyn ReadTransaction>, StoreError> {
        self.counters.begun.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryTransaction {
            snapshot: self.snapshot(),
            counters: Arc::clone(&self.counters),
        }))
    }

    fn node_by_iri(&self, iri: &str) -> Result<Option<NodeId>, StoreError> {
        Ok(self.snapshot().by_iri.get(iri).copied())
    }

    fn find_by_pattern(
        &self,
        pattern: &IriPattern,
        limit: usize,
    ) -> Result<Vec<Entity>, StoreError> {
        Ok(self
            .snapshot()
            .nodes
            .values()
            .filter(|e| pattern.matches(&e.iri))
            .take(limit)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryTransaction
// ---------------------------------------------------------------------------

struct MemoryTransaction {
    snapshot: Arc<Snapshot>,
    counters: Arc<TxCounters>,
}

impl MemoryTransaction {
    fn edges<'a>(
        map: &'a HashMap<NodeId, Vec<(String, NodeId)>>,
        node: NodeId,
        rel: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        map.get(&node)
            .into_iter()
            .flatten()
            .filter(move |(r, _)| r == rel)
            .map(|(_, other)| *other)
    }
}

impl ReadTransaction for MemoryTransaction {
    fn contains(&self, node: NodeId) -> Result<bool, StoreError> {
        Ok(self.snapshot.nodes.contains_key(&node))
    }

    fn neighbours(
        &self,
        node: NodeId,
        spec: RelationshipSpec,
    ) -> Result<Vec<NodeId>, StoreError> {
        if !self.snapshot.nodes.contains_key(&node) {
            return Err(StoreError::NodeNotFound(node));
        }
        let rel = spec.relationship.name();
        let mut out = Vec::new();
        if matches!(spec.direction, Direction::Incoming | Direction::Both) {
            out.extend(Self::edges(&self.snapshot.incoming, node, rel));
        }
        if matches!(spec.direction, Direction::Outgoing | Direction::Both) {
            out.extend(Self::edges(&self.snapshot.outgoing, node, rel));
        }
        Ok(out)
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.counters.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// GraphDocument
// ---------------------------------------------------------------------------

/// A JSON-serialisable graph: the import format for [`MemoryGraph`] and the
/// node's SQLite store.
///
/// ```json
/// {
///   "nodes": [
///     { "iri": "http://purl.obolibrary.org/obo/CL_0000000", "labels": ["cell"] },
///     { "iri": "http://purl.obolibrary.org/obo/CL_0000540", "labels": ["neuron"] }
///   ],
///   "edges": [
///     { "source": "http://purl.obolibrary.org/obo/CL_0000540",
///       "target": "http://purl.obolibrary.org/obo/CL_0000000",
///       "rel": "SUBCLASS_OF" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<DocumentNode>,
    #[serde(default)]
    pub edges: Vec<DocumentEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentNode {
    pub iri: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

/// A typed edge between two node IRIs. `rel` is the store relationship name
/// (e.g. `"SUBCLASS_OF"`); names outside the closure vocabulary are kept but
/// never followed by category closure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentEdge {
    pub source: String,
    pub target: String,
    pub rel: String,
}

impl GraphDocument {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OwlRelationship;

    const SUBCLASS_IN: RelationshipSpec =
        RelationshipSpec::new(OwlRelationship::SubclassOf, Direction::Incoming);
    const SAME_AS_BOTH: RelationshipSpec =
        RelationshipSpec::new(OwlRelationship::SameAs, Direction::Both);

    #[test]
    fn add_node_is_idempotent_by_iri() {
        let g = MemoryGraph::new();
        let a = g.add_node("http://x.org/A", vec![]);
        let again = g.add_node("http://x.org/A", vec!["ignored".into()]);
        assert_eq!(a, again);
        assert_eq!(g.len(), 1);
        assert!(g.node(a).unwrap().labels.is_empty());
    }

    #[test]
    fn incoming_and_outgoing() {
        let g = MemoryGraph::new();
        let cell = g.add_node("http://x.org/cell", vec![]);
        let neuron = g.add_node("http://x.org/neuron", vec![]);
        g.add_edge(neuron, cell, "SUBCLASS_OF").unwrap();

        let tx = g.begin_read().unwrap();
        assert_eq!(tx.neighbours(cell, SUBCLASS_IN).unwrap(), vec![neuron]);
        assert!(tx.neighbours(neuron, SUBCLASS_IN).unwrap().is_empty());
        let out = RelationshipSpec::new(OwlRelationship::SubclassOf, Direction::Outgoing);
        assert_eq!(tx.neighbours(neuron, out).unwrap(), vec![cell]);
    }

    #[test]
    fn both_lists_incoming_first() {
        let g = MemoryGraph::new();
        let a = g.add_node("http://x.org/a", vec![]);
        let b = g.add_node("http://x.org/b", vec![]);
        let c = g.add_node("http://x.org/c", vec![]);
        g.add_edge(a, b, "SAME_AS").unwrap();
        g.add_edge(c, a, "SAME_AS").unwrap();

        let tx = g.begin_read().unwrap();
        assert_eq!(tx.neighbours(a, SAME_AS_BOTH).unwrap(), vec![c, b]);
    }

    #[test]
    fn other_relationship_types_are_not_followed() {
        let g = MemoryGraph::new();
        let a = g.add_node("http://x.org/a", vec![]);
        let b = g.add_node("http://x.org/b", vec![]);
        g.add_edge(b, a, "http://purl.obolibrary.org/obo/BFO_0000050").unwrap();

        let tx = g.begin_read().unwrap();
        assert!(tx.neighbours(a, SUBCLASS_IN).unwrap().is_empty());
    }

    #[test]
    fn neighbours_of_missing_node_is_not_found() {
        let g = MemoryGraph::new();
        let tx = g.begin_read().unwrap();
        assert_eq!(
            tx.neighbours(NodeId(99), SUBCLASS_IN).unwrap_err(),
            StoreError::NodeNotFound(NodeId(99))
        );
    }

    #[test]
    fn transaction_sees_snapshot_at_begin() {
        let g = MemoryGraph::new();
        let a = g.add_node("http://x.org/a", vec![]);
        let tx = g.begin_read().unwrap();
        assert!(g.remove_node(a));
        assert!(tx.contains(a).unwrap());
        assert!(!g.begin_read().unwrap().contains(a).unwrap());
    }

    #[test]
    fn remove_node_drops_its_edges() {
        let g = MemoryGraph::new();
        let a = g.add_node("http://x.org/a", vec![]);
        let b = g.add_node("http://x.org/b", vec![]);
        g.add_edge(b, a, "SUBCLASS_OF").unwrap();
        assert_eq!(g.edge_count(), 1);
        assert!(g.remove_node(b));
        assert_eq!(g.edge_count(), 0);
        let tx = g.begin_read().unwrap();
        assert!(tx.neighbours(a, SUBCLASS_IN).unwrap().is_empty());
    }

    #[test]
    fn commit_and_drop_are_counted() {
        let g = MemoryGraph::new();
        g.begin_read().unwrap().commit().unwrap();
        drop(g.begin_read().unwrap());
        assert_eq!(
            g.transactions(),
            TransactionStats {
                begun: 2,
                committed: 1,
                released: 2
            }
        );
    }

    #[test]
    fn find_by_pattern_respects_limit_and_order() {
        let g = MemoryGraph::new();
        for i in 0..10 {
            g.add_node(format!("http://purl.obolibrary.org/obo/GO_{i:07}"), vec![]);
        }
        g.add_node("http://purl.obolibrary.org/obo/CL_0000000", vec![]);
        let pattern = IriPattern::starting_with("http://purl.obolibrary.org/obo/GO_");
        let found = g.find_by_pattern(&pattern, 3).unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].iri, "http://purl.obolibrary.org/obo/GO_0000000");
        assert!(found.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn document_rejects_dangling_edge() {
        let doc = GraphDocument::from_json(
            r#"{ "nodes": [ { "iri": "http://x.org/a" } ],
                 "edges": [ { "source": "http://x.org/a", "target": "http://x.org/b", "rel": "SUBCLASS_OF" } ] }"#,
        )
        .unwrap();
        assert!(matches!(
            MemoryGraph::from_document(&doc),
            Err(StoreError::Internal(_))
        ));
    }

    #[test]
    fn document_builds_graph() {
        let doc = GraphDocument::from_json(
            r#"{ "nodes": [ { "iri": "http://x.org/a", "labels": ["A"] }, { "iri": "http://x.org/b" } ],
                 "edges": [ { "source": "http://x.org/b", "target": "http://x.org/a", "rel": "SUBCLASS_OF" } ] }"#,
        )
        .unwrap();
        let g = MemoryGraph::from_document(&doc).unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.edge_count(), 1);
        let a = g.node_by_iri("http://x.org/a").unwrap().unwrap();
        assert_eq!(g.node(a).unwrap().labels, vec!["A".to_string()]);
    }
}
