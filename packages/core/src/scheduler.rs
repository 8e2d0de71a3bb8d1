//! Fan-out of category closures over a bounded worker pool.
//!
//! [`ClosureScheduler::compute_all`] runs one [`ClosureEngine`] call per
//! category. Each call runs on tokio's blocking pool (store I/O is
//! synchronous), holds one permit of a semaphore sized by
//! [`SchedulerConfig::workers`], and is bounded by
//! [`SchedulerConfig::task_timeout`] counted from submission, so time spent
//! waiting for a worker counts too. Results are collected per label; one
//! category failing never affects another.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::Instrument;

use crate::closure::{CancellationFlag, ClosureEngine};
use crate::curie::CurieRegistry;
use crate::error::{Error, Result};
use crate::store::GraphStore;
use crate::types::{CategoryClosure, NodeId};
use crate::validation::{validate_category_label, validate_root_reference};

/// Default per-category time bound.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);

/// Worker-pool sizing and the per-category time bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of categories computed at the same time.
    pub workers: usize,
    /// How long one category may take from submission, queueing included.
    pub task_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidInput("worker pool size must be at least 1".into()));
        }
        if self.task_timeout.is_zero() {
            return Err(Error::InvalidInput("task timeout must be non-zero".into()));
        }
        Ok(())
    }
}

/// The outcome of a [`ClosureScheduler`] run: one entry per submitted label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClosureReport {
    results: BTreeMap<String, Result<CategoryClosure>>,
}

impl ClosureReport {
    pub fn get(&self, label: &str) -> Option<&Result<CategoryClosure>> {
        self.results.get(label)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// All entries, ordered by label.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Result<CategoryClosure>)> {
        self.results.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &CategoryClosure> {
        self.results.values().filter_map(|r| r.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.results
            .iter()
            .filter_map(|(k, r)| r.as_ref().err().map(|e| (k.as_str(), e)))
    }

    /// The label → node-id mapping of the successful categories.
    pub fn node_map(&self) -> BTreeMap<&str, &[NodeId]> {
        self.results
            .iter()
            .filter_map(|(k, r)| r.as_ref().ok().map(|c| (k.as_str(), c.nodes.as_slice())))
            .collect()
    }

    pub fn into_results(self) -> BTreeMap<String, Result<CategoryClosure>> {
        self.results
    }

    fn record(&mut self, label: String, result: Result<CategoryClosure>) {
        self.results.insert(label, result);
    }
}

/// Runs category closures concurrently against one shared store.
#[derive(Clone)]
pub struct ClosureScheduler {
    engine: ClosureEngine,
    store: Arc<dyn GraphStore>,
    config: SchedulerConfig,
    permits: Arc<Semaphore>,
}

impl ClosureScheduler {
    pub fn new(store: Arc<dyn GraphStore>, config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine: ClosureEngine::new(Arc::clone(&store)),
            store,
            permits: Arc::new(Semaphore::new(config.workers)),
            config,
        })
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Compute every category in `roots`.
    ///
    /// Returns once every category has either finished or failed; there is
    /// no ordering between categories.
    pub async fn compute_all(&self, roots: HashMap<String, NodeId>) -> ClosureReport {
        let mut report = ClosureReport::default();
        let mut tasks = JoinSet::new();
        let mut labels: HashMap<Id, String> = HashMap::new();

        for (label, root) in roots {
            let span = tracing::info_span!("category", category = %label);
            let engine = self.engine.clone();
            let permits = Arc::clone(&self.permits);
            let timeout = self.config.task_timeout;
            let task_label = label.clone();
            let handle = tasks.spawn(
                async move {
                    let result = run_category(engine, permits, root, &task_label, timeout).await;
                    (task_label, result)
                }
                .instrument(span),
            );
            labels.insert(handle.id(), label);
        }

        while let Some(joined) = tasks.join_next().await {
            let (label, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    let Some(label) = labels.remove(&e.id()) else {
                        tracing::error!("untracked category task aborted: {e}");
                        continue;
                    };
                    tracing::error!(category = %label, "category task aborted: {e}");
                    let result = Err(Error::TraversalFailure {
                        category: label.clone(),
                        message: format!("task stopped unexpectedly: {e}"),
                    });
                    (label, result)
                }
            };
            if let Err(e) = &result {
                tracing::warn!(category = %label, code = e.code(), "category failed: {e}");
            }
            report.record(label, result);
        }
        report
    }

    /// Resolve configured roots through the store and compute every category
    /// that resolved. Unresolved roots appear in the report as per-category
    /// errors next to the computed results.
    pub async fn compute_categories(
        &self,
        categories: &[CategorySpec],
        curies: &CurieRegistry,
    ) -> ClosureReport {
        let store = Arc::clone(&self.store);
        let registry = curies.clone();
        let specs = categories.to_vec();
        let resolving = tokio::task::spawn_blocking(move || {
            resolve_category_roots(store.as_ref(), &registry, &specs)
        });
        let resolved = match resolving.await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::error!("category root resolution aborted: {e}");
                let mut report = ClosureReport::default();
                for spec in categories {
                    report.record(
                        spec.label.clone(),
                        Err(Error::TraversalFailure {
                            category: spec.label.clone(),
                            message: format!("root resolution stopped unexpectedly: {e}"),
                        }),
                    );
                }
                return report;
            }
        };

        let mut report = self.compute_all(resolved.roots).await;
        for (label, error) in resolved.errors {
            report.record(label, Err(error));
        }
        report
    }
}

/// Run one category under its time bound. The bound covers the wait for a
/// permit as well as the traversal; on expiry the worker is told to stop.
async fn run_category(
    engine: ClosureEngine,
    permits: Arc<Semaphore>,
    root: NodeId,
    label: &str,
    timeout: Duration,
) -> Result<CategoryClosure> {
    let cancel = CancellationFlag::new();
    let run = run_on_worker(engine, permits, root, label, cancel.clone());
    match tokio::time::timeout(timeout, run).await {
        Ok(result) => result,
        Err(_) => {
            cancel.cancel();
            Err(Error::Timeout {
                category: label.to_string(),
                after: timeout,
            })
        }
    }
}

async fn run_on_worker(
    engine: ClosureEngine,
    permits: Arc<Semaphore>,
    root: NodeId,
    label: &str,
    cancel: CancellationFlag,
) -> Result<CategoryClosure> {
    let permit = permits.acquire_owned().await.map_err(|_| Error::Cancelled {
        category: label.to_string(),
    })?;

    let category = label.to_string();
    let span = tracing::Span::current();
    let worker = tokio::task::spawn_blocking(move || {
        // The permit is released when the worker really stops, so a timed
        // out traversal still counts against the pool until it notices.
        let _permit = permit;
        span.in_scope(|| engine.compute_closure_with(root, &category, &cancel))
    });

    worker.await.map_err(|join| Error::TraversalFailure {
        category: label.to_string(),
        message: format!("worker stopped unexpectedly: {join}"),
    })?
}

// ---------------------------------------------------------------------------
// Category configuration
// ---------------------------------------------------------------------------

/// A configured category: a root given as an IRI or curie, and its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub root: String,
    pub label: String,
}

impl CategorySpec {
    pub fn new(root: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            label: label.into(),
        }
    }
}

/// Category roots looked up in the store, plus the ones that failed.
#[derive(Debug, Default)]
pub struct ResolvedCategories {
    pub roots: HashMap<String, NodeId>,
    pub errors: BTreeMap<String, Error>,
}

/// Map each [`CategorySpec`] to a store node.
///
/// Curie roots are expanded through `curies`; anything else is taken as an
/// IRI. A root that is malformed, absent from the store, or whose label is
/// already claimed by another spec becomes an [`Error::InvalidInput`] under
/// its label. A store failure becomes [`Error::StoreUnavailable`].
pub fn resolve_category_roots(
    store: &dyn GraphStore,
    curies: &CurieRegistry,
    categories: &[CategorySpec],
) -> ResolvedCategories {
    let mut out = ResolvedCategories::default();
    for spec in categories {
        if out.roots.contains_key(&spec.label) || out.errors.contains_key(&spec.label) {
            out.roots.remove(&spec.label);
            out.errors.insert(
                spec.label.clone(),
                Error::InvalidInput(format!("category label {:?} is used more than once", spec.label)),
            );
            continue;
        }
        match resolve_root(store, curies, spec) {
            Ok(id) => {
                out.roots.insert(spec.label.clone(), id);
            }
            Err(e) => {
                out.errors.insert(spec.label.clone(), e);
            }
        }
    }
    out
}

fn resolve_root(
    store: &dyn GraphStore,
    curies: &CurieRegistry,
    spec: &CategorySpec,
) -> Result<NodeId> {
    validate_category_label(&spec.label)?;
    validate_root_reference(&spec.root)?;
    let iri = curies
        .expand(&spec.root)
        .unwrap_or_else(|| spec.root.clone());
    store.node_by_iri(&iri)?.ok_or_else(|| {
        Error::InvalidInput(format!(
            "root {:?} of category {:?} is not in the graph",
            spec.root, spec.label
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::closure::tests::{cell_graph, FlakyStore};
    use crate::graph::MemoryGraph;

    fn config(workers: usize) -> SchedulerConfig {
        SchedulerConfig {
            workers,
            task_timeout: Duration::from_secs(10),
        }
    }

    /// Two disjoint trees: animal <- dog <- poodle, plant <- tree.
    fn two_trees() -> (MemoryGraph, NodeId, NodeId) {
        let g = MemoryGraph::new();
        let animal = g.add_node("http://x.org/animal", vec![]);
        let dog = g.add_node("http://x.org/dog", vec![]);
        let poodle = g.add_node("http://x.org/poodle", vec![]);
        let plant = g.add_node("http://x.org/plant", vec![]);
        let tree = g.add_node("http://x.org/tree", vec![]);
        g.add_edge(dog, animal, "SUBCLASS_OF").unwrap();
        g.add_edge(poodle, dog, "SUBCLASS_OF").unwrap();
        g.add_edge(tree, plant, "SUBCLASS_OF").unwrap();
        (g, animal, plant)
    }

    fn sorted(mut v: Vec<NodeId>) -> Vec<NodeId> {
        v.sort();
        v
    }

    #[test]
    fn config_validation() {
        assert!(SchedulerConfig::default().validate().is_ok());
        assert!(config(0).validate().is_err());
        let zero = SchedulerConfig {
            workers: 1,
            task_timeout: Duration::ZERO,
        };
        assert!(matches!(zero.validate(), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn concurrent_matches_sequential() {
        let (g, animal, plant) = two_trees();
        let store: Arc<dyn GraphStore> = Arc::new(g);
        let scheduler = ClosureScheduler::new(Arc::clone(&store), config(4)).unwrap();

        let report = scheduler
            .compute_all(HashMap::from([
                ("animals".to_string(), animal),
                ("plants".to_string(), plant),
            ]))
            .await;

        let engine = ClosureEngine::new(store);
        for (label, root) in [("animals", animal), ("plants", plant)] {
            let sequential = engine.compute_closure(root, label).unwrap();
            let concurrent = report.get(label).unwrap().as_ref().unwrap();
            assert_eq!(sorted(concurrent.nodes.clone()), sorted(sequential.nodes));
        }
        assert_eq!(report.failed().count(), 0);
    }

    #[tokio::test]
    async fn invalid_root_does_not_affect_siblings() {
        let (g, animal, _) = two_trees();
        let scheduler = ClosureScheduler::new(Arc::new(g), config(2)).unwrap();
        let report = scheduler
            .compute_all(HashMap::from([
                ("animals".to_string(), animal),
                ("broken".to_string(), NodeId(9999)),
            ]))
            .await;

        assert_eq!(report.len(), 2);
        assert_eq!(report.get("animals").unwrap().as_ref().unwrap().len(), 3);
        assert!(matches!(
            report.get("broken"),
            Some(Err(Error::InvalidInput(_)))
        ));
        let failed: Vec<&str> = report.failed().map(|(k, _)| k).collect();
        assert_eq!(failed, vec!["broken"]);
    }

    #[tokio::test]
    async fn traversal_failure_is_keyed_by_category() {
        let (g, cell) = cell_graph();
        let mut flaky = FlakyStore::new(g);
        flaky.fail_neighbours_at = Some(0);
        let scheduler = ClosureScheduler::new(Arc::new(flaky), config(1)).unwrap();
        let report = scheduler
            .compute_all(HashMap::from([("cell".to_string(), cell)]))
            .await;
        match report.get("cell") {
            Some(Err(Error::TraversalFailure { category, .. })) => assert_eq!(category, "cell"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_category_times_out() {
        let (g, cell) = cell_graph();
        let mut flaky = FlakyStore::new(g);
        flaky.delay = Some(Duration::from_millis(50));
        let scheduler = ClosureScheduler::new(
            Arc::new(flaky),
            SchedulerConfig {
                workers: 1,
                task_timeout: Duration::from_millis(10),
            },
        )
        .unwrap();

        let report = scheduler
            .compute_all(HashMap::from([("cell".to_string(), cell)]))
            .await;
        assert_eq!(
            report.get("cell"),
            Some(&Err(Error::Timeout {
                category: "cell".into(),
                after: Duration::from_millis(10),
            }))
        );
    }

    #[tokio::test]
    async fn pool_size_bounds_open_transactions() {
        let g = MemoryGraph::new();
        let roots: HashMap<String, NodeId> = (0..6)
            .map(|i| (format!("c{i}"), g.add_node(format!("http://x.org/{i}"), vec![])))
            .collect();
        let mut flaky = FlakyStore::new(g);
        flaky.delay = Some(Duration::from_millis(20));
        let peak = Arc::clone(&flaky.peak);
        let scheduler = ClosureScheduler::new(Arc::new(flaky), config(2)).unwrap();

        let report = scheduler.compute_all(roots).await;
        assert_eq!(report.succeeded().count(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn empty_input_gives_empty_report() {
        let scheduler = ClosureScheduler::new(Arc::new(MemoryGraph::new()), config(1)).unwrap();
        assert!(scheduler.compute_all(HashMap::new()).await.is_empty());
    }

    #[test]
    fn roots_resolve_from_curies_and_iris() {
        let (g, cell) = cell_graph();
        let curies =
            CurieRegistry::from_entries([("CL", "http://purl.obolibrary.org/obo/CL_")]).unwrap();
        let resolved = resolve_category_roots(
            &g,
            &curies,
            &[
                CategorySpec::new("CL:0000000", "cell"),
                CategorySpec::new("http://purl.obolibrary.org/obo/UBERON_0000062", "organ"),
                CategorySpec::new("CL:9999999", "missing"),
                CategorySpec::new("XX:1", "unknown prefix"),
            ],
        );
        assert_eq!(resolved.roots.get("cell"), Some(&cell));
        assert!(resolved.roots.contains_key("organ"));
        assert!(matches!(
            resolved.errors.get("missing"),
            Some(Error::InvalidInput(_))
        ));
        assert!(matches!(
            resolved.errors.get("unknown prefix"),
            Some(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn duplicate_label_is_an_error_for_that_label() {
        let (g, _) = cell_graph();
        let resolved = resolve_category_roots(
            &g,
            &CurieRegistry::new(),
            &[
                CategorySpec::new("http://purl.obolibrary.org/obo/CL_0000000", "x"),
                CategorySpec::new("http://purl.obolibrary.org/obo/CL_0000540", "x"),
            ],
        );
        assert!(resolved.roots.is_empty());
        assert!(matches!(resolved.errors.get("x"), Some(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn compute_categories_merges_resolution_errors() {
        let (g, _) = cell_graph();
        let curies =
            CurieRegistry::from_entries([("CL", "http://purl.obolibrary.org/obo/CL_")]).unwrap();
        let scheduler = ClosureScheduler::new(Arc::new(g), config(2)).unwrap();
        let report = scheduler
            .compute_categories(
                &[
                    CategorySpec::new("CL:0000000", "cell"),
                    CategorySpec::new("CL:0000404", "ghost"),
                ],
                &curies,
            )
            .await;
        assert_eq!(report.get("cell").unwrap().as_ref().unwrap().len(), 6);
        assert!(report.get("ghost").unwrap().is_err());
        assert_eq!(report.node_map().len(), 1);
    }

    #[tokio::test]
    async fn queued_category_times_out_while_the_only_worker_is_stuck() {
        let g = MemoryGraph::new();
        let a = g.add_node("http://x.org/a", vec![]);
        let b = g.add_node("http://x.org/b", vec![]);
        let mut flaky = FlakyStore::new(g);
        flaky.delay = Some(Duration::from_millis(800));
        let calls = Arc::clone(&flaky.calls);
        let open = Arc::clone(&flaky.open);
        let timeout = Duration::from_millis(100);
        let scheduler = ClosureScheduler::new(
            Arc::new(flaky),
            SchedulerConfig {
                workers: 1,
                task_timeout: timeout,
            },
        )
        .unwrap();

        let started = std::time::Instant::now();
        let report = scheduler
            .compute_all(HashMap::from([("a".to_string(), a), ("b".to_string(), b)]))
            .await;
        let elapsed = started.elapsed();

        for label in ["a", "b"] {
            assert_eq!(
                report.get(label),
                Some(&Err(Error::Timeout {
                    category: label.into(),
                    after: timeout,
                }))
            );
        }
        assert!(elapsed < timeout * 4, "aggregate took {elapsed:?}");

        // The stuck worker gives up after the store call in flight, without
        // starting the next relationship expansion.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while open.load(Ordering::SeqCst) > 0 && std::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(open.load(Ordering::SeqCst), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn crashed_worker_is_reported_under_its_label() {
        let (g, cell) = cell_graph();
        let mut flaky = FlakyStore::new(g);
        flaky.panic_in_neighbours = true;
        let scheduler = ClosureScheduler::new(Arc::new(flaky), config(2)).unwrap();
        let report = scheduler
            .compute_all(HashMap::from([("cell".to_string(), cell)]))
            .await;
        match report.get("cell") {
            Some(Err(Error::TraversalFailure { category, message })) => {
                assert_eq!(category, "cell");
                assert!(message.contains("unexpectedly"), "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn root_resolution_runs_off_the_async_thread() {
        let (g, _) = cell_graph();
        let flaky = FlakyStore::new(g);
        let lookup_thread = Arc::clone(&flaky.lookup_thread);
        let curies =
            CurieRegistry::from_entries([("CL", "http://purl.obolibrary.org/obo/CL_")]).unwrap();
        let scheduler = ClosureScheduler::new(Arc::new(flaky), config(1)).unwrap();

        let report = scheduler
            .compute_categories(&[CategorySpec::new("CL:0000000", "cell")], &curies)
            .await;

        assert!(report.get("cell").unwrap().is_ok());
        let recorded = *lookup_thread.lock().unwrap();
        assert!(recorded.is_some());
        assert_ne!(recorded, Some(std::thread::current().id()));
    }
}
