//! Human-readable text rendering of closure reports, curie maps and entity
//! lookups.
//!
//! The output is stable plain text for terminals and logs. It is not a
//! canonical format; the JSON served by the node is.

use crate::curie::CurieRegistry;
use crate::scheduler::ClosureReport;
use crate::types::{Entity, NodeId};

/// Render every category of a [`ClosureReport`], successes and failures.
///
/// ```text
/// Category closures  2 categories
/// ───────────────────────────────
///
/// animals  3 nodes  root 0
///   0 1 2
///
/// broken  FAILED invalid_parameter
///   invalid input: root node 9999 of category "broken" does not exist
/// ```
pub fn render_closures(report: &ClosureReport) -> String {
    let total = report.len();
    let header = format!("Category closures  {} {}", total, plural(total, "category", "categories"));
    let rule = "─".repeat(header.chars().count());
    let mut out = format!("{}\n{}\n", header, rule);

    for (label, result) in report.iter() {
        out.push('\n');
        match result {
            Ok(closure) => {
                out.push_str(&format!(
                    "{}  {} {}  root {}\n",
                    label,
                    closure.len(),
                    plural(closure.len(), "node", "nodes"),
                    closure.root
                ));
                out.push_str(&wrap_ids(&closure.nodes, 78));
            }
            Err(e) => {
                out.push_str(&format!("{}  FAILED {}\n", label, e.code()));
                out.push_str(&format!("  {}\n", e));
            }
        }
    }
    out
}

/// Render a curie map as aligned `prefix  namespace` rows.
///
/// ```text
/// Curies  2 prefixes
/// ──────────────────
///   GO   http://purl.obolibrary.org/obo/GO_
///   BFO  http://purl.obolibrary.org/obo/BFO_
/// ```
pub fn render_curies(registry: &CurieRegistry) -> String {
    let total = registry.len();
    let header = format!("Curies  {} {}", total, plural(total, "prefix", "prefixes"));
    let rule = "─".repeat(header.chars().count());
    let mut out = format!("{}\n{}\n", header, rule);

    let width = registry
        .all()
        .iter()
        .map(|e| e.prefix.chars().count())
        .max()
        .unwrap_or(0);
    for entry in registry.all() {
        out.push_str(&format!("  {:<width$}  {}\n", entry.prefix, entry.namespace));
    }
    out
}

/// Render looked-up entities, compacting IRIs where the registry allows.
pub fn render_entities(entities: &[Entity], registry: &CurieRegistry) -> String {
    if entities.is_empty() {
        return "no matching entities\n".to_string();
    }
    let mut out = String::new();
    for e in entities {
        let name = registry.compact(&e.iri).unwrap_or_else(|| e.iri.clone());
        out.push_str(&format!("  {:>6}  {}", e.id.get(), name));
        if !e.labels.is_empty() {
            out.push_str(&format!("  \"{}\"", e.labels.join("\", \"")));
        }
        out.push('\n');
    }
    out
}

// --- helpers -----------------------------------------------------------------

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}

fn wrap_ids(ids: &[NodeId], width: usize) -> String {
    if ids.is_empty() {
        return String::new();
    }
    let mut out = String::from(" ");
    let mut line_len = 1usize;
    for id in ids {
        let s = id.to_string();
        if line_len + s.len() + 1 > width {
            out.push_str("\n ");
            line_len = 1;
        }
        out.push(' ');
        out.push_str(&s);
        line_len += s.len() + 1;
    }
    out.push('\n');
    out
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use crate::graph::MemoryGraph;
    use crate::scheduler::{ClosureScheduler, SchedulerConfig};

    #[tokio::test]
    async fn closures_show_successes_and_failures() {
        let g = MemoryGraph::new();
        let root = g.add_node("http://x.org/root", vec![]);
        let child = g.add_node("http://x.org/child", vec![]);
        g.add_edge(child, root, "SUBCLASS_OF").unwrap();
        let scheduler = ClosureScheduler::new(Arc::new(g), SchedulerConfig::default()).unwrap();
        let report = scheduler
            .compute_all(HashMap::from([
                ("things".to_string(), root),
                ("broken".to_string(), NodeId(77)),
            ]))
            .await;

        let rendered = render_closures(&report);
        assert!(rendered.starts_with("Category closures  2 categories\n"));
        assert!(rendered.contains("things  2 nodes  root 0\n  0 1\n"));
        assert!(rendered.contains("broken  FAILED invalid_parameter"));
    }

    #[test]
    fn curies_are_aligned() {
        let r = CurieRegistry::from_entries([("GO", "http://go/"), ("BFO", "http://bfo/")]).unwrap();
        let rendered = render_curies(&r);
        assert!(rendered.contains("  GO   http://go/\n"));
        assert!(rendered.contains("  BFO  http://bfo/\n"));
        assert!(rendered.starts_with("Curies  2 prefixes"));
    }

    #[test]
    fn entities_use_curies() {
        let r = CurieRegistry::from_entries([("GO", "http://purl.obolibrary.org/obo/GO_")]).unwrap();
        let e = Entity {
            id: NodeId(3),
            iri: "http://purl.obolibrary.org/obo/GO_0005623".into(),
            labels: vec!["cell".into()],
        };
        let rendered = render_entities(&[e], &r);
        assert_eq!(rendered, "       3  GO:0005623  \"cell\"\n");
        assert_eq!(render_entities(&[], &r), "no matching entities\n");
    }

    #[test]
    fn long_id_lists_wrap() {
        let ids: Vec<NodeId> = (1000..1030).map(NodeId).collect();
        let wrapped = wrap_ids(&ids, 40);
        assert!(wrapped.lines().count() > 1);
        assert!(wrapped.lines().all(|l| l.len() <= 40));
    }
}
