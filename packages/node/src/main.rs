//! `oweft-node`: OntoWeft HTTP node.
//!
//! # Quick start
//!
//! ```sh
//! # In-memory graph loaded from a document, with a curie map:
//! OWEFT_GRAPH=./graph.json OWEFT_CURIES=./curies.json oweft-node
//!
//! # Persistent SQLite graph:
//! OWEFT_DB=./graph.db OWEFT_GRAPH=./graph.json oweft-node
//!
//! # Custom bind address and worker pool:
//! OWEFT_BIND=127.0.0.1:8080 OWEFT_WORKERS=8 oweft-node
//! ```
//!
//! # Environment variables
//!
//! See [`NodeConfig`] for the full list.

use ontoweft_node::{build_router, open_store, AppState, NodeConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ontoweft=info,ontoweft_node=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = NodeConfig::from_env().unwrap_or_else(|e| fatal(&format!("configuration: {e}")));

    let store = open_store(&config).unwrap_or_else(|e| fatal(&e.to_string()));

    let curies = config
        .load_curies()
        .unwrap_or_else(|e| fatal(&format!("curie map: {e}")));
    tracing::info!("curies: {} prefixes loaded", curies.len());

    for spec in &config.categories {
        tracing::info!(root = %spec.root, "category configured: {}", spec.label);
    }
    tracing::info!(
        "scheduler: {} workers, {}s per category",
        config.scheduler.workers,
        config.scheduler.task_timeout.as_secs()
    );

    let state = AppState::new(store, curies.into(), config.clone())
        .unwrap_or_else(|e| fatal(&format!("scheduler: {e}")));
    let app = build_router(state);

    tracing::info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .unwrap_or_else(|e| fatal(&format!("failed to bind {}: {e}", config.bind_addr)));

    axum::serve(listener, app)
        .await
        .unwrap_or_else(|e| fatal(&format!("server error: {e}")));
}

fn fatal(msg: &str) -> ! {
    tracing::error!("{msg}");
    eprintln!("oweft-node: {msg}");
    std::process::exit(1);
}
