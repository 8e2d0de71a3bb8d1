//! Category closure: every node reachable from a category root through the
//! taxonomic relationship set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::GraphStore;
use crate::traversal::Traversal;
use crate::types::{CategoryClosure, NodeId, CATEGORY_CLOSURE_SPECS};
use crate::validation::validate_category_label;

/// A shared flag a running closure checks between store calls.
///
/// Cloning shares the flag; cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Computes the node set of a single category.
///
/// Each call opens its own read transaction, runs one depth-first traversal
/// from the root along [`CATEGORY_CLOSURE_SPECS`], and commits on success.
/// The engine holds no per-call state, so one instance can serve any number
/// of concurrent callers.
#[derive(Clone)]
pub struct ClosureEngine {
    store: Arc<dyn GraphStore>,
}

impl ClosureEngine {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Compute the closure of `root`, keyed by `category`.
    ///
    /// `category` is only used for reporting and must be non-empty.
    pub fn compute_closure(&self, root: NodeId, category: &str) -> Result<CategoryClosure> {
        self.compute_closure_with(root, category, &CancellationFlag::new())
    }

    /// Like [`compute_closure`](Self::compute_closure), but stops with
    /// [`Error::Cancelled`] as soon as `cancel` is raised.
    ///
    /// On any error the transaction is dropped uncommitted; no partial
    /// closure is ever returned.
    pub fn compute_closure_with(
        &self,
        root: NodeId,
        category: &str,
        cancel: &CancellationFlag,
    ) -> Result<CategoryClosure> {
        validate_category_label(category)?;
        tracing::info!(%root, "processing category {category}");

        let tx = self
            .store
            .begin_read()
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        if !tx.contains(root).map_err(|e| Error::traversal(category, e))? {
            return Err(Error::InvalidInput(format!(
                "root node {root} of category {category:?} does not exist"
            )));
        }

        let mut nodes = Vec::new();
        let traversal = Traversal::new(tx.as_ref(), root, &CATEGORY_CLOSURE_SPECS)
            .with_cancellation(cancel.clone());
        for step in traversal {
            let path = step.map_err(|e| Error::traversal(category, e))?;
            nodes.push(path.end_node());
        }
        // The traversal ends early, not with an error, when cancelled.
        if cancel.is_cancelled() {
            tracing::warn!("closure cancelled after {} nodes", nodes.len());
            return Err(Error::Cancelled {
                category: category.to_string(),
            });
        }

        // Read-only, but committed on success to match the store's
        // expected release path.
        tx.commit()
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        tracing::info!("discovered {} nodes for {category}", nodes.len());
        Ok(CategoryClosure {
            category: category.to_string(),
            root,
            nodes,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    use crate::graph::MemoryGraph;
    use crate::store::{IriPattern, ReadTransaction, StoreError};
    use crate::types::{Entity, RelationshipSpec};

    /// Wraps a [`MemoryGraph`] and injects failures at chosen points.
    pub(crate) struct FlakyStore {
        pub inner: MemoryGraph,
        pub fail_begin: bool,
        pub fail_commit: bool,
        /// Fail the n-th `neighbours` call (0-based) across all transactions.
        pub fail_neighbours_at: Option<usize>,
        /// Sleep this long in every `neighbours` call.
        pub delay: Option<std::time::Duration>,
        pub panic_in_neighbours: bool,
        /// The thread that last ran `node_by_iri`.
        pub lookup_thread: Arc<std::sync::Mutex<Option<std::thread::ThreadId>>>,
        pub calls: Arc<AtomicUsize>,
        pub commits: Arc<AtomicUsize>,
        /// Open transactions right now, and the most ever open at once.
        pub open: Arc<AtomicUsize>,
        pub peak: Arc<AtomicUsize>,
    }

    impl FlakyStore {
        pub fn new(inner: MemoryGraph) -> Self {
            Self {
                inner,
                fail_begin: false,
                fail_commit: false,
                fail_neighbours_at: None,
                delay: None,
                panic_in_neighbours: false,
                lookup_thread: Arc::default(),
                calls: Arc::new(AtomicUsize::new(0)),
                commits: Arc::new(AtomicUsize::new(0)),
                open: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    struct FlakyTx {
        inner: Box<dyn ReadTransaction>,
        fail_commit: bool,
        fail_at: Option<usize>,
        delay: Option<std::time::Duration>,
        panic: bool,
        calls: Arc<AtomicUsize>,
        commits: Arc<AtomicUsize>,
        _open: OpenGuard,
    }

    struct OpenGuard(Arc<AtomicUsize>);

    impl Drop for OpenGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl ReadTransaction for FlakyTx {
        fn contains(&self, node: NodeId) -> std::result::Result<bool, StoreError> {
            self.inner.contains(node)
        }

        fn neighbours(
            &self,
            node: NodeId,
            spec: RelationshipSpec,
        ) -> std::result::Result<Vec<NodeId>, StoreError> {
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            if self.panic {
                panic!("store driver crashed");
            }
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(n) {
                return Err(StoreError::NodeNotFound(node));
            }
            self.inner.neighbours(node, spec)
        }

        fn commit(self: Box<Self>) -> std::result::Result<(), StoreError> {
            if self.fail_commit {
                return Err(StoreError::Unavailable("commit refused".into()));
            }
            self.commits.fetch_add(1, Ordering::SeqCst);
            self.inner.commit()
        }
    }

    impl GraphStore for FlakyStore {
        fn begin_read(&self) -> std::result::Result<Box<dyn ReadTransaction>, StoreError> {
            if self.fail_begin {
                return Err(StoreError::Unavailable("connection refused".into()));
            }
            let inner = self.inner.begin_read()?;
            let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(open, Ordering::SeqCst);
            Ok(Box::new(FlakyTx {
                inner,
                fail_commit: self.fail_commit,
                fail_at: self.fail_neighbours_at,
                delay: self.delay,
                panic: self.panic_in_neighbours,
                calls: Arc::clone(&self.calls),
                commits: Arc::clone(&self.commits),
                _open: OpenGuard(Arc::clone(&self.open)),
            }))
        }

        fn node_by_iri(&self, iri: &str) -> std::result::Result<Option<NodeId>, StoreError> {
            if let Ok(mut thread) = self.lookup_thread.lock() {
                *thread = Some(std::thread::current().id());
            }
            self.inner.node_by_iri(iri)
        }

        fn find_by_pattern(
            &self,
            pattern: &IriPattern,
            limit: usize,
        ) -> std::result::Result<Vec<Entity>, StoreError> {
            self.inner.find_by_pattern(pattern, limit)
        }
    }

    /// cell <- neuron <- motor_neuron, cell <- glia, neuron == nerve_cell,
    /// instance `n1` typed as motor_neuron. Unrelated `organ` is disconnected.
    pub(crate) fn cell_graph() -> (MemoryGraph, NodeId) {
        let g = MemoryGraph::new();
        let cell = g.add_node("http://purl.obolibrary.org/obo/CL_0000000", vec!["cell".into()]);
        let neuron = g.add_node("http://purl.obolibrary.org/obo/CL_0000540", vec![]);
        let motor = g.add_node("http://purl.obolibrary.org/obo/CL_0000100", vec![]);
        let glia = g.add_node("http://purl.obolibrary.org/obo/CL_0000125", vec![]);
        let nerve = g.add_node("http://example.org/nerve_cell", vec![]);
        let n1 = g.add_node("http://example.org/individual/n1", vec![]);
        let organ = g.add_node("http://purl.obolibrary.org/obo/UBERON_0000062", vec![]);
        g.add_edge(neuron, cell, "SUBCLASS_OF").unwrap();
        g.add_edge(motor, neuron, "SUBCLASS_OF").unwrap();
        g.add_edge(glia, cell, "SUBCLASS_OF").unwrap();
        g.add_edge(neuron, nerve, "EQUIVALENT_CLASS").unwrap();
        g.add_edge(n1, motor, "TYPE").unwrap();
        // Outgoing SUBCLASS_OF from the root must not be followed.
        g.add_edge(cell, organ, "SUBCLASS_OF").unwrap();
        (g, cell)
    }

    #[test]
    fn closure_collects_descendants_equivalents_and_instances() {
        let (g, cell) = cell_graph();
        let g = Arc::new(g);
        let engine = ClosureEngine::new(g.clone());
        let closure = engine.compute_closure(cell, "cell").unwrap();

        assert_eq!(closure.category, "cell");
        assert_eq!(closure.root, cell);
        assert_eq!(closure.nodes[0], cell);
        assert_eq!(closure.len(), 6);
        let organ = g
            .node_by_iri("http://purl.obolibrary.org/obo/UBERON_0000062")
            .unwrap()
            .unwrap();
        assert!(!closure.contains(organ));
    }

    #[test]
    fn isolated_root_closure_is_itself() {
        let g = MemoryGraph::new();
        let lonely = g.add_node("http://x.org/lonely", vec![]);
        let engine = ClosureEngine::new(Arc::new(g));
        let closure = engine.compute_closure(lonely, "lonely").unwrap();
        assert_eq!(closure.nodes, vec![lonely]);
    }

    #[test]
    fn cycle_terminates_without_duplicates() {
        let g = MemoryGraph::new();
        let ids: Vec<NodeId> = (0..5)
            .map(|i| g.add_node(format!("http://x.org/{i}"), vec![]))
            .collect();
        for w in ids.windows(2) {
            g.add_edge(w[0], w[1], "EQUIVALENT_CLASS").unwrap();
        }
        g.add_edge(ids[4], ids[0], "SAME_AS").unwrap();
        g.add_edge(ids[2], ids[0], "SUBCLASS_OF").unwrap();

        let engine = ClosureEngine::new(Arc::new(g));
        let closure = engine.compute_closure(ids[0], "ring").unwrap();
        let unique: HashSet<NodeId> = closure.nodes.iter().copied().collect();
        assert_eq!(unique.len(), closure.nodes.len());
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn success_commits_the_transaction() {
        let (g, cell) = cell_graph();
        let g = Arc::new(g);
        ClosureEngine::new(g.clone())
            .compute_closure(cell, "cell")
            .unwrap();
        let stats = g.transactions();
        assert_eq!(stats.begun, 1);
        assert_eq!(stats.committed, 1);
        assert_eq!(stats.released, 1);
    }

    #[test]
    fn empty_label_rejected_before_store_access() {
        let (g, cell) = cell_graph();
        let g = Arc::new(g);
        let err = ClosureEngine::new(g.clone())
            .compute_closure(cell, "  ")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(g.transactions().begun, 0);
    }

    #[test]
    fn missing_root_is_invalid_input_and_not_committed() {
        let g = Arc::new(MemoryGraph::new());
        let err = ClosureEngine::new(g.clone())
            .compute_closure(NodeId(404), "ghost")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let stats = g.transactions();
        assert_eq!(stats.committed, 0);
        assert_eq!(stats.released, 1);
    }

    #[test]
    fn mid_traversal_failure_is_category_scoped_and_uncommitted() {
        let (g, cell) = cell_graph();
        let mut flaky = FlakyStore::new(g);
        flaky.fail_neighbours_at = Some(3);
        let commits = Arc::clone(&flaky.commits);
        let engine = ClosureEngine::new(Arc::new(flaky));

        let err = engine.compute_closure(cell, "cell").unwrap_err();
        match err {
            Error::TraversalFailure { category, .. } => assert_eq!(category, "cell"),
            other => panic!("expected TraversalFailure, got {other:?}"),
        }
        assert_eq!(commits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn begin_failure_is_store_unavailable() {
        let (g, cell) = cell_graph();
        let mut flaky = FlakyStore::new(g);
        flaky.fail_begin = true;
        let err = ClosureEngine::new(Arc::new(flaky))
            .compute_closure(cell, "cell")
            .unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }

    #[test]
    fn commit_failure_is_store_unavailable() {
        let (g, cell) = cell_graph();
        let mut flaky = FlakyStore::new(g);
        flaky.fail_commit = true;
        let err = ClosureEngine::new(Arc::new(flaky))
            .compute_closure(cell, "cell")
            .unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }

    #[test]
    fn cancelled_flag_stops_traversal() {
        let (g, cell) = cell_graph();
        let flaky = FlakyStore::new(g);
        let calls = Arc::clone(&flaky.calls);
        let commits = Arc::clone(&flaky.commits);
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let err = ClosureEngine::new(Arc::new(flaky))
            .compute_closure_with(cell, "cell", &cancel)
            .unwrap_err();
        assert_eq!(
            err,
            Error::Cancelled {
                category: "cell".into()
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(commits.load(Ordering::SeqCst), 0);
    }
}
