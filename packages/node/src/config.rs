//! Node configuration, populated from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use ontoweft::{
    CategorySpec, CurieError, CurieRegistry, GraphDocument, SchedulerConfig, DEFAULT_ENTITY_LIMIT,
};

/// Errors raised while reading configuration or the files it points at.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    InvalidVar {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("{what} is not valid JSON: {reason}")]
    Json { what: &'static str, reason: String },

    #[error("curie map rejected: {0}")]
    Curies(#[from] CurieError),
}

/// Where a JSON document comes from: inline text or a file re-read on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonSource {
    Inline(String),
    File(PathBuf),
}

impl JsonSource {
    /// A value that starts with `{` is inline JSON; anything else is a path.
    pub fn parse(value: &str) -> Self {
        if value.trim_start().starts_with('{') {
            JsonSource::Inline(value.to_string())
        } else {
            JsonSource::File(PathBuf::from(value))
        }
    }

    pub fn read(&self) -> Result<String, ConfigError> {
        match self {
            JsonSource::Inline(json) => Ok(json.clone()),
            JsonSource::File(path) => std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Runtime configuration for an OntoWeft node.
///
/// All fields are populated from environment variables with defaults, so a
/// node can be started with zero configuration (it then serves an empty
/// graph with an empty curie map).
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `OWEFT_BIND` | `0.0.0.0:9000` | TCP socket address to listen on |
/// | `OWEFT_DB` | (absent = in-memory) | Path to the SQLite graph database |
/// | `OWEFT_GRAPH` | (absent) | JSON graph document (path or inline) imported at startup |
/// | `OWEFT_CURIES` | (absent = empty) | JSON object `prefix → namespace` (path or inline) |
/// | `OWEFT_CATEGORIES` | (absent = none) | JSON object `root → label` (path or inline) |
/// | `OWEFT_WORKERS` | available parallelism | Closure worker-pool size |
/// | `OWEFT_TASK_TIMEOUT_SECS` | `300` | Per-category time bound |
/// | `OWEFT_ENTITY_LIMIT` | `20` | Default entity lookup limit |
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Socket address the server binds to.
    pub bind_addr: SocketAddr,

    /// Path to the SQLite database file.
    /// `None` means an in-memory graph (lost on restart).
    pub db_path: Option<String>,

    /// Graph document imported into the store at startup.
    pub graph: Option<JsonSource>,

    /// Curie map source. Re-read on `POST /cypher/curies/reload`.
    pub curies: Option<JsonSource>,

    /// Categories computed when a closure request names none.
    pub categories: Vec<CategorySpec>,

    pub scheduler: SchedulerConfig,

    pub entity_limit: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
            db_path: None,
            graph: None,
            curies: None,
            categories: Vec::new(),
            scheduler: SchedulerConfig::default(),
            entity_limit: DEFAULT_ENTITY_LIMIT,
        }
    }
}

impl NodeConfig {
    /// Populate config from environment variables, applying defaults where absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Populate config from an arbitrary variable lookup.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = var("OWEFT_BIND") {
            config.bind_addr = v.parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::InvalidVar {
                    var: "OWEFT_BIND",
                    value: v.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        config.db_path = var("OWEFT_DB").filter(|v| !v.is_empty());
        config.graph = var("OWEFT_GRAPH").map(|v| JsonSource::parse(&v));
        config.curies = var("OWEFT_CURIES").map(|v| JsonSource::parse(&v));

        if let Some(v) = var("OWEFT_CATEGORIES") {
            config.categories = parse_categories(&JsonSource::parse(&v).read()?)?;
        }
        if let Some(v) = var("OWEFT_WORKERS") {
            config.scheduler.workers = parse_positive("OWEFT_WORKERS", &v)?;
        }
        if let Some(v) = var("OWEFT_TASK_TIMEOUT_SECS") {
            config.scheduler.task_timeout =
                Duration::from_secs(parse_positive("OWEFT_TASK_TIMEOUT_SECS", &v)? as u64);
        }
        if let Some(v) = var("OWEFT_ENTITY_LIMIT") {
            config.entity_limit = parse_positive("OWEFT_ENTITY_LIMIT", &v)?;
        }

        Ok(config)
    }

    /// Load the curie registry from the configured source. No source means an
    /// empty registry.
    pub fn load_curies(&self) -> Result<CurieRegistry, ConfigError> {
        match &self.curies {
            Some(source) => Ok(CurieRegistry::from_json(&source.read()?)?),
            None => Ok(CurieRegistry::new()),
        }
    }

    /// Load the configured graph document, if any.
    pub fn load_graph(&self) -> Result<Option<GraphDocument>, ConfigError> {
        let Some(source) = &self.graph else {
            return Ok(None);
        };
        GraphDocument::from_json(&source.read()?)
            .map(Some)
            .map_err(|e| ConfigError::Json {
                what: "graph document",
                reason: e.to_string(),
            })
    }
}

/// Parse a `{ "root": "label", ... }` object, keeping document order.
pub fn parse_categories(json: &str) -> Result<Vec<CategorySpec>, ConfigError> {
    let map: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).map_err(|e| ConfigError::Json {
            what: "category map",
            reason: e.to_string(),
        })?;
    map.into_iter()
        .map(|(root, label)| match label {
            serde_json::Value::String(label) => Ok(CategorySpec::new(root, label)),
            other => Err(ConfigError::Json {
                what: "category map",
                reason: format!("label for {root:?} is {other}, not a string"),
            }),
        })
        .collect()
}

fn parse_positive(var: &'static str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        Ok(_) => Err(ConfigError::InvalidVar {
            var,
            value: value.to_string(),
            reason: "must be at least 1".into(),
        }),
        Err(e) => Err(ConfigError::InvalidVar {
            var,
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let c = NodeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(c.bind_addr.port(), 9000);
        assert!(c.db_path.is_none());
        assert_eq!(c.entity_limit, 20);
        assert_eq!(c.scheduler.task_timeout, Duration::from_secs(300));
        assert!(c.scheduler.workers >= 1);
        assert!(c.load_curies().unwrap().is_empty());
        assert!(c.load_graph().unwrap().is_none());
    }

    #[test]
    fn values_are_read() {
        let c = NodeConfig::from_lookup(lookup(&[
            ("OWEFT_BIND", "127.0.0.1:8123"),
            ("OWEFT_WORKERS", "3"),
            ("OWEFT_TASK_TIMEOUT_SECS", "15"),
            ("OWEFT_ENTITY_LIMIT", "50"),
            ("OWEFT_CURIES", r#"{ "GO": "http://purl.obolibrary.org/obo/GO_" }"#),
            ("OWEFT_CATEGORIES", r#"{ "CL:0000000": "cell", "GO:0008150": "process" }"#),
        ]))
        .unwrap();
        assert_eq!(c.bind_addr.to_string(), "127.0.0.1:8123");
        assert_eq!(c.scheduler.workers, 3);
        assert_eq!(c.scheduler.task_timeout, Duration::from_secs(15));
        assert_eq!(c.entity_limit, 50);
        assert_eq!(c.load_curies().unwrap().len(), 1);
        assert_eq!(
            c.categories,
            vec![
                CategorySpec::new("CL:0000000", "cell"),
                CategorySpec::new("GO:0008150", "process"),
            ]
        );
    }

    #[test]
    fn bad_values_are_errors() {
        assert!(matches!(
            NodeConfig::from_lookup(lookup(&[("OWEFT_BIND", "nope")])),
            Err(ConfigError::InvalidVar { var: "OWEFT_BIND", .. })
        ));
        assert!(matches!(
            NodeConfig::from_lookup(lookup(&[("OWEFT_WORKERS", "0")])),
            Err(ConfigError::InvalidVar { var: "OWEFT_WORKERS", .. })
        ));
        assert!(matches!(
            NodeConfig::from_lookup(lookup(&[("OWEFT_CATEGORIES", r#"{ "x": 1 }"#)])),
            Err(ConfigError::Json { .. })
        ));
    }

    #[test]
    fn invalid_curie_prefix_surfaces_registry_error() {
        let c = NodeConfig::from_lookup(lookup(&[("OWEFT_CURIES", r#"{ "1bad": "http://x/" }"#)]))
            .unwrap();
        assert!(matches!(c.load_curies(), Err(ConfigError::Curies(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let c = NodeConfig::from_lookup(lookup(&[("OWEFT_GRAPH", "/nonexistent/graph.json")]))
            .unwrap();
        assert!(matches!(c.load_graph(), Err(ConfigError::Io { .. })));
    }
}
