//! Category closure and curie-aware query resolution over ontology graphs.
//!
//! This crate holds everything that does not depend on a transport: the
//! graph store contract, the depth-first closure traversal, the concurrent
//! closure scheduler, the curie registry, and the Cypher relationship
//! rewriter. It is the foundation for the `oweft` CLI and the
//! `ontoweft-node` HTTP service.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`types`] | Core data types: [`NodeId`], [`OwlRelationship`], [`RelationshipSpec`], [`Entity`], [`CategoryClosure`] |
//! | [`store`] | The [`GraphStore`] / [`ReadTransaction`] adapter contract and [`IriPattern`] |
//! | [`graph`] | [`MemoryGraph`], an in-memory store, and the JSON [`GraphDocument`] import format |
//! | [`traversal`] | [`Traversal`], a depth-first iterator with global node uniqueness |
//! | [`closure`] | [`ClosureEngine`]: one category, one transaction |
//! | [`scheduler`] | [`ClosureScheduler`]: many categories over a bounded worker pool |
//! | [`curie`] | [`CurieRegistry`] and its atomically swappable [`SharedCurieRegistry`] |
//! | [`cypher`] | Relationship curie rewriting and entity lookup via [`CypherResolver`] |
//! | [`validation`] | Input checks applied before any store access |
//! | [`render`] | Human-readable text rendering |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::{collections::HashMap, sync::Arc};
//! use ontoweft::{ClosureScheduler, MemoryGraph, SchedulerConfig};
//!
//! let graph = MemoryGraph::new();
//! let cell = graph.add_node("http://purl.obolibrary.org/obo/CL_0000000", vec!["cell".into()]);
//! let neuron = graph.add_node("http://purl.obolibrary.org/obo/CL_0000540", vec![]);
//! graph.add_edge(neuron, cell, "SUBCLASS_OF")?;
//!
//! let scheduler = ClosureScheduler::new(Arc::new(graph), SchedulerConfig::default())?;
//! let report = scheduler
//!     .compute_all(HashMap::from([("cell".to_string(), cell)]))
//!     .await;
//! assert_eq!(report.get("cell").unwrap().as_ref().unwrap().len(), 2);
//! ```

pub mod closure;
pub mod curie;
pub mod cypher;
pub mod error;
pub mod graph;
pub mod render;
pub mod scheduler;
pub mod store;
pub mod traversal;
pub mod types;
pub mod validation;

pub use closure::{CancellationFlag, ClosureEngine};
pub use curie::{CurieEntry, CurieError, CurieRegistry, SharedCurieRegistry};
pub use cypher::{rewrite_relationships, CypherResolver, DEFAULT_ENTITY_LIMIT};
pub use error::{Error, Result};
pub use graph::{GraphDocument, MemoryGraph, TransactionStats};
pub use scheduler::{
    resolve_category_roots, CategorySpec, ClosureReport, ClosureScheduler, SchedulerConfig,
};
pub use store::{GraphStore, IriPattern, ReadTransaction, StoreError};
pub use traversal::{Path, Traversal};
pub use types::{
    CategoryClosure, Direction, Entity, NodeId, OwlRelationship, RelationshipSpec,
    CATEGORY_CLOSURE_SPECS,
};
