//! `oweft`: the OntoWeft command-line interface.
//!
//! Four subcommands, each working against local files or, with `--node`, a
//! running `oweft-node`:
//!
//! - **`closure`**: compute category closures.
//! - **`resolve`**: expand relationship curies in a Cypher query.
//! - **`curies`**: print the curie map.
//! - **`entities`**: list graph nodes under a curie prefix.
//!
//! File arguments accept `-` for stdin.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use ontoweft::{
    render, CategorySpec, ClosureScheduler, CurieRegistry, CypherResolver, GraphDocument,
    MemoryGraph, SchedulerConfig,
};
use ontoweft_node_api::{
    CategoryOutcome, ClosureRequest, ClosureResponse, CurieMap, EntitiesResponse, ErrorResponse,
};

/// oweft: OntoWeft CLI
///
/// Category closure and curie-aware Cypher utilities over ontology graphs.
#[derive(Parser)]
#[command(name = "oweft", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Sources {
    /// Curie map: JSON object `prefix → namespace`.
    #[arg(long, env = "OWEFT_CURIES", value_name = "FILE")]
    curies: Option<PathBuf>,

    /// Base URL of a running node, e.g. `http://127.0.0.1:9000`. When set,
    /// local files are ignored and the node answers.
    #[arg(long, env = "OWEFT_NODE", value_name = "URL")]
    node: Option<String>,

    /// Print the raw JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Compute the closure of one or more categories.
    ///
    /// Categories come from a JSON object `root → label` (`--categories`) or
    /// from a single `--root`/`--category` pair. Roots are IRIs or curies.
    ///
    /// Examples:
    ///   oweft closure -g graph.json --curies curies.json --root CL:0000000 --category cell
    ///   oweft closure -g graph.json --categories categories.json --workers 4
    Closure {
        /// Graph document to load (local mode).
        #[arg(short = 'g', long, env = "OWEFT_GRAPH", value_name = "FILE")]
        graph: Option<PathBuf>,

        /// JSON object `root → label`.
        #[arg(long, value_name = "FILE", conflicts_with_all = ["root", "category"])]
        categories: Option<PathBuf>,

        /// Root of a single category.
        #[arg(long, value_name = "IRI_OR_CURIE", requires = "category")]
        root: Option<String>,

        /// Label of the single category.
        #[arg(long, value_name = "LABEL", requires = "root")]
        category: Option<String>,

        /// Worker-pool size (local mode). Defaults to available parallelism.
        #[arg(long, value_name = "N")]
        workers: Option<usize>,

        /// Per-category time bound in seconds (local mode).
        #[arg(long = "timeout", value_name = "SECS")]
        timeout_secs: Option<u64>,

        #[command(flatten)]
        sources: Sources,
    },

    /// Expand relationship curies in a Cypher query.
    ///
    /// Pass `-` as QUERY to read the query from stdin.
    Resolve {
        query: String,

        #[command(flatten)]
        sources: Sources,
    },

    /// Print the curie map.
    Curies {
        #[command(flatten)]
        sources: Sources,
    },

    /// List graph nodes whose IRI falls under a curie.
    ///
    /// CURIE is a bare prefix (`GO`) or a curie (`GO:0008`).
    Entities {
        curie: String,

        /// Graph document to search (local mode).
        #[arg(short = 'g', long, env = "OWEFT_GRAPH", value_name = "FILE")]
        graph: Option<PathBuf>,

        /// Maximum number of entities (default 20).
        #[arg(short = 'n', long, value_name = "N")]
        limit: Option<i64>,

        #[command(flatten)]
        sources: Sources,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Closure {
            graph,
            categories,
            root,
            category,
            workers,
            timeout_secs,
            sources,
        } => {
            let specs = match (categories, root, category) {
                (Some(path), _, _) => parse_categories(&read_input(&path)),
                (None, Some(root), Some(label)) => vec![CategorySpec::new(root, label)],
                _ => fatal("give --categories FILE or --root and --category"),
            };

            if let Some(node) = &sources.node {
                let request = ClosureRequest {
                    categories: specs.into_iter().map(|s| (s.root, s.label)).collect(),
                };
                let response: ClosureResponse = remote(
                    reqwest::blocking::Client::new()
                        .post(endpoint(node, "/categories/closure"))
                        .json(&request),
                );
                print_json(&response);
                let failed = response
                    .categories
                    .values()
                    .any(|o| matches!(o, CategoryOutcome::Failed { .. }));
                if failed {
                    process::exit(1);
                }
                return;
            }

            let mut config = SchedulerConfig::default();
            if let Some(n) = workers {
                config.workers = n;
            }
            if let Some(secs) = timeout_secs {
                config.task_timeout = Duration::from_secs(secs);
            }
            let store = Arc::new(load_graph(graph.as_deref()));
            let registry = load_curies(sources.curies.as_deref());
            let scheduler =
                ClosureScheduler::new(store, config).unwrap_or_else(|e| fatal(&e.to_string()));

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .unwrap_or_else(|e| fatal(&format!("failed to start runtime: {e}")));
            let report = runtime.block_on(scheduler.compute_categories(&specs, &registry));

            if sources.json {
                print_json(&ClosureResponse::from(&report));
            } else {
                print!("{}", render::render_closures(&report));
            }
            if report.failed().next().is_some() {
                process::exit(1);
            }
        }

        Command::Resolve { query, sources } => {
            let query = if query == "-" {
                read_input(Path::new("-"))
            } else {
                query
            };
            let resolved = match &sources.node {
                Some(node) => remote_text(
                    reqwest::blocking::Client::new()
                        .get(endpoint(node, "/cypher/resolve"))
                        .query(&[("cypherQuery", query.as_str())]),
                ),
                None => ontoweft::rewrite_relationships(
                    &query,
                    &load_curies(sources.curies.as_deref()),
                ),
            };
            println!("{resolved}");
        }

        Command::Curies { sources } => {
            let registry = match &sources.node {
                Some(node) => {
                    let map: CurieMap =
                        remote(reqwest::blocking::Client::new().get(endpoint(node, "/cypher/curies")));
                    registry_from_map(map)
                }
                None => load_curies(sources.curies.as_deref()),
            };
            if sources.json {
                print_json(&registry.to_json_map());
            } else {
                print!("{}", render::render_curies(&registry));
            }
        }

        Command::Entities {
            curie,
            graph,
            limit,
            sources,
        } => {
            let (entities, registry) = match &sources.node {
                Some(node) => {
                    let client = reqwest::blocking::Client::new();
                    let mut req = client
                        .get(endpoint(node, "/cypher/entities"))
                        .query(&[("curie", curie.as_str())]);
                    if let Some(limit) = limit {
                        req = req.query(&[("limit", limit)]);
                    }
                    let response: EntitiesResponse = remote(req);
                    let map: CurieMap = remote(client.get(endpoint(node, "/cypher/curies")));
                    (response.entities, registry_from_map(map))
                }
                None => {
                    let registry = load_curies(sources.curies.as_deref());
                    let store = Arc::new(load_graph(graph.as_deref()));
                    let resolver = CypherResolver::new(registry.clone().into(), store);
                    let entities = resolver
                        .lookup_entities_by_curie(&curie, limit)
                        .unwrap_or_else(|e| fatal(&e.to_string()));
                    (entities, registry)
                }
            };
            if sources.json {
                print_json(&EntitiesResponse { curie, entities });
            } else {
                print!("{}", render::render_entities(&entities, &registry));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Local inputs
// ---------------------------------------------------------------------------

/// Read the full contents of a file, or stdin when the path is `"-"`.
fn read_input(path: &Path) -> String {
    if path.to_str() == Some("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .unwrap_or_else(|e| fatal(&format!("failed to read stdin: {e}")));
        buf
    } else {
        fs::read_to_string(path)
            .unwrap_or_else(|e| fatal(&format!("failed to read {}: {e}", path.display())))
    }
}

fn load_graph(path: Option<&Path>) -> MemoryGraph {
    let Some(path) = path else {
        fatal("no graph given: use --graph FILE or --node URL");
    };
    let doc = GraphDocument::from_json(&read_input(path))
        .unwrap_or_else(|e| fatal(&format!("{} is not a graph document: {e}", path.display())));
    MemoryGraph::from_document(&doc)
        .unwrap_or_else(|e| fatal(&format!("{}: {e}", path.display())))
}

/// No curie file means an empty registry: curies stay unresolved.
fn load_curies(path: Option<&Path>) -> CurieRegistry {
    match path {
        Some(path) => CurieRegistry::from_json(&read_input(path))
            .unwrap_or_else(|e| fatal(&format!("{}: {e}", path.display()))),
        None => CurieRegistry::new(),
    }
}

/// Parse a `{ "root": "label" }` object, keeping file order.
fn parse_categories(json: &str) -> Vec<CategorySpec> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)
        .unwrap_or_else(|e| fatal(&format!("category map is not valid JSON: {e}")));
    if map.is_empty() {
        fatal("category map is empty, nothing to compute");
    }
    map.into_iter()
        .map(|(root, label)| match label {
            serde_json::Value::String(label) => CategorySpec::new(root, label),
            other => fatal(&format!("label for {root:?} must be a string, got {other}")),
        })
        .collect()
}

fn registry_from_map(map: CurieMap) -> CurieRegistry {
    let entries = map
        .into_iter()
        .map(|(prefix, ns)| (prefix, ns.as_str().unwrap_or_default().to_string()));
    CurieRegistry::from_entries(entries)
        .unwrap_or_else(|e| fatal(&format!("node returned an invalid curie map: {e}")))
}

// ---------------------------------------------------------------------------
// Remote mode
// ---------------------------------------------------------------------------

fn endpoint(node: &str, path: &str) -> String {
    format!("{}{path}", node.trim_end_matches('/'))
}

/// Send `req` and decode a JSON success body; error bodies are reported and
/// end the process.
fn remote<T: serde::de::DeserializeOwned>(req: reqwest::blocking::RequestBuilder) -> T {
    let resp = send(req);
    resp.json()
        .unwrap_or_else(|e| fatal(&format!("unexpected response from node: {e}")))
}

fn remote_text(req: reqwest::blocking::RequestBuilder) -> String {
    send(req)
        .text()
        .unwrap_or_else(|e| fatal(&format!("unexpected response from node: {e}")))
}

fn send(req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::Response {
    let resp = req
        .send()
        .unwrap_or_else(|e| fatal(&format!("request failed: {e}")));
    let status = resp.status();
    if status.is_success() {
        return resp;
    }
    match resp.json::<ErrorResponse>() {
        Ok(err) => fatal(&format!("node answered {status}: {} ({})", err.error, err.code)),
        Err(_) => fatal(&format!("node answered {status}")),
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => fatal(&format!("failed to encode output: {e}")),
    }
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &str) -> ! {
    eprintln!("oweft: {msg}");
    process::exit(2);
}
