//! Shared helpers for the OntoWeft conformance test suite.
//!
//! Provides [`spawn_node`], which binds a `TcpListener` on an ephemeral
//! port, wires up an in-process node backed by a [`MemoryGraph`], and
//! returns both the local URL and the graph so tests can add nodes without
//! going through the HTTP layer.

use std::sync::Arc;

use ontoweft::{CurieRegistry, GraphDocument, GraphStore, MemoryGraph};
use ontoweft_node::{build_router, AppState, JsonSource, NodeConfig};

/// A small slice of the Cell Ontology and GO.
///
/// ```text
/// CL_0000000 cell
///   <- CL_0000540 neuron          (SUBCLASS_OF)
///        <- CL_0000100 motor neuron (SUBCLASS_OF)
///        <- ex:neuron_42           (TYPE)
///   <-> GO_0005623 cell (GO)      (EQUIVALENT_CLASS)
/// UBERON_0000062 organ            (unrelated)
/// ```
pub const GRAPH: &str = r#"{
  "nodes": [
    { "iri": "http://purl.obolibrary.org/obo/CL_0000000", "labels": ["cell"] },
    { "iri": "http://purl.obolibrary.org/obo/CL_0000540", "labels": ["neuron"] },
    { "iri": "http://purl.obolibrary.org/obo/CL_0000100", "labels": ["motor neuron"] },
    { "iri": "http://example.org/neuron_42" },
    { "iri": "http://purl.obolibrary.org/obo/GO_0005623", "labels": ["cell (GO)"] },
    { "iri": "http://purl.obolibrary.org/obo/UBERON_0000062", "labels": ["organ"] }
  ],
  "edges": [
    { "source": "http://purl.obolibrary.org/obo/CL_0000540",
      "target": "http://purl.obolibrary.org/obo/CL_0000000", "rel": "SUBCLASS_OF" },
    { "source": "http://purl.obolibrary.org/obo/CL_0000100",
      "target": "http://purl.obolibrary.org/obo/CL_0000540", "rel": "SUBCLASS_OF" },
    { "source": "http://example.org/neuron_42",
      "target": "http://purl.obolibrary.org/obo/CL_0000540", "rel": "TYPE" },
    { "source": "http://purl.obolibrary.org/obo/GO_0005623",
      "target": "http://purl.obolibrary.org/obo/CL_0000000", "rel": "EQUIVALENT_CLASS" }
  ]
}"#;

/// Curie map served by [`spawn_node`], in this order.
pub const CURIES: &str = r#"{
  "CL": "http://purl.obolibrary.org/obo/CL_",
  "GO": "http://purl.obolibrary.org/obo/GO_",
  "UBERON": "http://purl.obolibrary.org/obo/UBERON_",
  "BFO": "http://purl.obolibrary.org/obo/BFO_",
  "RO": "http://purl.obolibrary.org/obo/RO_"
}"#;

/// Start an ephemeral in-process node over [`GRAPH`] and [`CURIES`] and
/// return `(base_url, graph)`.
///
/// The node runs in a background `tokio` task and is bound to an OS-assigned
/// port on `127.0.0.1`. The returned `String` is the full base URL, e.g.
/// `http://127.0.0.1:51234`.
///
/// # Panics
///
/// Panics if the TCP listener cannot be bound or the node fails to start.
pub async fn spawn_node() -> (String, Arc<MemoryGraph>) {
    spawn_node_with(NodeConfig {
        curies: Some(JsonSource::Inline(CURIES.into())),
        ..NodeConfig::default()
    })
    .await
}

/// Like [`spawn_node`], with caller-chosen configuration. The curie map is
/// loaded from `config.curies`; the graph is always [`GRAPH`].
pub async fn spawn_node_with(mut config: NodeConfig) -> (String, Arc<MemoryGraph>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("get local addr");
    let base_url = format!("http://{addr}");
    config.bind_addr = addr;

    let doc = GraphDocument::from_json(GRAPH).expect("parse conformance graph");
    let graph = Arc::new(MemoryGraph::from_document(&doc).expect("build conformance graph"));
    let curies: CurieRegistry = config.load_curies().expect("load curie map");

    let state = AppState::new(Arc::clone(&graph) as Arc<dyn GraphStore>, curies.into(), config)
        .expect("build node state");
    let router = build_router(state);

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("conformance node error");
    });

    (base_url, graph)
}
