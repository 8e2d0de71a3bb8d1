use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Reject empty or whitespace-only category labels.
pub fn validate_category_label(label: &str) -> Result<()> {
    if label.trim().is_empty() {
        return Err(Error::InvalidInput("category label must not be empty".into()));
    }
    Ok(())
}

/// Check an entity lookup limit and convert it to a `usize`.
///
/// Zero and negative values are rejected.
pub fn validate_limit(limit: i64) -> Result<usize> {
    if limit <= 0 {
        return Err(Error::InvalidInput(format!(
            "limit must be a positive integer, got {limit}"
        )));
    }
    usize::try_from(limit)
        .map_err(|_| Error::InvalidInput(format!("limit {limit} is out of range")))
}

/// A category root as configured: either an absolute IRI or a curie.
pub fn validate_root_reference(root: &str) -> Result<()> {
    if root.is_empty() {
        return Err(Error::InvalidInput("root reference must not be empty".into()));
    }
    if root.chars().any(char::is_whitespace) {
        return Err(Error::InvalidInput(format!(
            "root reference {root:?} must not contain whitespace"
        )));
    }
    Ok(())
}

/// Whether `prefix` can be registered as a curie prefix.
///
/// Prefixes follow the XML NCName shape used by OBO and W3C prefix maps:
/// a letter or underscore, then letters, digits, `_`, `-` or `.`.
pub fn is_valid_prefix(prefix: &str) -> bool {
    PREFIX_RE.is_match(prefix)
}

/// `^[A-Za-z_][A-Za-z0-9_.-]*$`
static PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("invalid prefix regex")
});

// --- tests -------------------------------------------------------------------
