//! Lint diagnostics for diagram documents.
//!
//! Reports structural issues without modifying the document. Error-level
//! findings make a document unimportable; warnings and infos are advisory
//! and surface through `archcanvas check`.

use crate::document::DiagramDocument;
use crate::id::NodeId;
use crate::model::NodeKind;
use std::collections::{HashMap, HashSet};
use std::fmt;

// ─── Diagnostic types ────────────────────────────────────────────────────

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LintSeverity {
    /// The document breaks a graph invariant and cannot be loaded.
    Error,
    /// Should be fixed; likely a mistake.
    Warning,
    /// Informational.
    Info,
}

impl fmt::Display for LintSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LintSeverity::Error => "error",
            LintSeverity::Warning => "warning",
            LintSeverity::Info => "info",
        })
    }
}

/// A single lint diagnostic for a node or edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintDiagnostic {
    /// Id of the node or edge the finding is about.
    pub subject: String,
    /// Human-readable message.
    pub message: String,
    pub severity: LintSeverity,
    /// Short rule identifier (e.g. "dangling-edge", "empty-group").
    pub rule: &'static str,
}

impl fmt::Display for LintDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] {}", self.severity, self.rule, self.message)
    }
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Run all lint rules over the document and return diagnostics, grouped
/// by rule in a fixed order.
#[must_use]
pub fn lint_document(doc: &DiagramDocument) -> Vec<LintDiagnostic> {
    let mut diags = Vec::new();
    lint_duplicate_ids(doc, &mut diags);
    lint_edges(doc, &mut diags);
    lint_sizes(doc, &mut diags);
    lint_parents(doc, &mut diags);
    lint_parent_cycles(doc, &mut diags);
    lint_empty_groups(doc, &mut diags);
    lint_isolated_components(doc, &mut diags);
    diags
}

/// Whether any diagnostic is error-level.
pub fn has_errors(diags: &[LintDiagnostic]) -> bool {
    diags.iter().any(|d| d.severity == LintSeverity::Error)
}

// ─── Rules ────────────────────────────────────────────────────────────────

fn error(subject: impl fmt::Display, rule: &'static str, message: String) -> LintDiagnostic {
    LintDiagnostic {
        subject: subject.to_string(),
        message,
        severity: LintSeverity::Error,
        rule,
    }
}

fn lint_duplicate_ids(doc: &DiagramDocument, diags: &mut Vec<LintDiagnostic>) {
    let mut seen = HashSet::new();
    for node in &doc.nodes {
        if !seen.insert(node.id) {
            diags.push(error(
                node.id,
                "duplicate-node-id",
                format!("Node id `{}` is used more than once.", node.id),
            ));
        }
    }
    let mut seen = HashSet::new();
    for edge in &doc.edges {
        if !seen.insert(edge.id) {
            diags.push(error(
                edge.id,
                "duplicate-edge-id",
                format!("Edge id `{}` is used more than once.", edge.id),
            ));
        }
    }
}

fn lint_edges(doc: &DiagramDocument, diags: &mut Vec<LintDiagnostic>) {
    let ids: HashSet<NodeId> = doc.nodes.iter().map(|n| n.id).collect();
    for edge in &doc.edges {
        for endpoint in [edge.source, edge.target] {
            if !ids.contains(&endpoint) {
                diags.push(error(
                    edge.id,
                    "dangling-edge",
                    format!("Edge `{}` references missing node `{endpoint}`.", edge.id),
                ));
            }
        }
        if edge.source == edge.target {
            diags.push(error(
                edge.id,
                "self-loop",
                format!("Edge `{}` connects `{}` to itself.", edge.id, edge.source),
            ));
        }
    }
}

fn lint_sizes(doc: &DiagramDocument, diags: &mut Vec<LintDiagnostic>) {
    for node in &doc.nodes {
        if node.width.is_some() != node.height.is_some() {
            diags.push(error(
                node.id,
                "partial-size",
                format!("Node `{}` has only one of width and height.", node.id),
            ));
        }
    }
}

fn lint_parents(doc: &DiagramDocument, diags: &mut Vec<LintDiagnostic>) {
    let kinds: HashMap<NodeId, NodeKind> = doc.nodes.iter().map(|n| (n.id, n.kind)).collect();
    for node in &doc.nodes {
        let Some(parent) = node.parent_id else {
            continue;
        };
        match kinds.get(&parent) {
            None => diags.push(error(
                node.id,
                "missing-parent",
                format!("Node `{}` has missing parent `{parent}`.", node.id),
            )),
            Some(kind) if *kind != NodeKind::Group => diags.push(error(
                node.id,
                "parent-not-group",
                format!(
                    "Node `{}` is parented to `{parent}`, a {} node; only groups can contain nodes.",
                    node.id,
                    kind.as_str()
                ),
            )),
            Some(_) => {}
        }
    }
}

fn lint_parent_cycles(doc: &DiagramDocument, diags: &mut Vec<LintDiagnostic>) {
    let mut parents: HashMap<NodeId, NodeId> = HashMap::new();
    for node in &doc.nodes {
        if let Some(p) = node.parent_id {
            parents.entry(node.id).or_insert(p);
        }
    }
    for node in &doc.nodes {
        let mut current = parents.get(&node.id).copied();
        for _ in 0..doc.nodes.len() {
            match current {
                Some(p) if p == node.id => {
                    diags.push(error(
                        node.id,
                        "parent-cycle",
                        format!("Node `{}` is its own ancestor.", node.id),
                    ));
                    break;
                }
                Some(p) => current = parents.get(&p).copied(),
                None => break,
            }
        }
    }
}

fn lint_empty_groups(doc: &DiagramDocument, diags: &mut Vec<LintDiagnostic>) {
    let parents: HashSet<NodeId> = doc.nodes.iter().filter_map(|n| n.parent_id).collect();
    for node in &doc.nodes {
        if node.kind == NodeKind::Group && !parents.contains(&node.id) {
            diags.push(LintDiagnostic {
                subject: node.id.to_string(),
                message: format!("Group `{}` contains no nodes.", node.id),
                severity: LintSeverity::Warning,
                rule: "empty-group",
            });
        }
    }
}

fn lint_isolated_components(doc: &DiagramDocument, diags: &mut Vec<LintDiagnostic>) {
    let connected: HashSet<NodeId> = doc
        .edges
        .iter()
        .flat_map(|e| [e.source, e.target])
        .collect();
    for node in &doc.nodes {
        if node.kind == NodeKind::Component && !connected.contains(&node.id) {
            diags.push(LintDiagnostic {
                subject: node.id.to_string(),
                message: format!("Component `{}` has no connections.", node.id),
                severity: LintSeverity::Info,
                rule: "isolated-component",
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_document;

    fn lint(json: &str) -> Vec<LintDiagnostic> {
        lint_document(&parse_document(json).expect("parse failed"))
    }

    fn rules(diags: &[LintDiagnostic]) -> Vec<&'static str> {
        diags.iter().map(|d| d.rule).collect()
    }

    #[test]
    fn clean_document_has_no_errors() {
        let diags = lint(
            r#"{
  "nodes": [
    {"id": "a", "type": "component", "position": {"x": 0, "y": 0},
     "data": {"componentId": "lb", "label": "LB"}},
    {"id": "b", "type": "component", "position": {"x": 100, "y": 0},
     "data": {"componentId": "api", "label": "API"}}
  ],
  "edges": [{"id": "e1", "source": "a", "target": "b"}]
}"#,
        );
        assert!(diags.is_empty(), "unexpected: {diags:?}");
    }

    #[test]
    fn dangling_edge_and_self_loop_are_errors() {
        let diags = lint(
            r#"{
  "nodes": [{"id": "a", "type": "text", "position": {"x": 0, "y": 0}, "data": {"text": "x"}}],
  "edges": [
    {"id": "e1", "source": "a", "target": "ghost"},
    {"id": "e2", "source": "a", "target": "a"}
  ]
}"#,
        );
        assert_eq!(rules(&diags), vec!["dangling-edge", "self-loop"]);
        assert!(has_errors(&diags));
    }

    #[test]
    fn parent_rules() {
        let diags = lint(
            r#"{
  "nodes": [
    {"id": "t", "type": "text", "position": {"x": 0, "y": 0}, "data": {"text": "x"}},
    {"id": "u", "type": "text", "position": {"x": 0, "y": 0}, "data": {"text": "y"}, "parentId": "t"},
    {"id": "v", "type": "text", "position": {"x": 0, "y": 0}, "data": {"text": "z"}, "parentId": "nope"}
  ],
  "edges": []
}"#,
        );
        assert_eq!(rules(&diags), vec!["parent-not-group", "missing-parent"]);
    }

    #[test]
    fn parent_cycle_detected() {
        let diags = lint(
            r#"{
  "nodes": [
    {"id": "g1", "type": "group", "position": {"x": 0, "y": 0}, "data": {}, "parentId": "g2"},
    {"id": "g2", "type": "group", "position": {"x": 0, "y": 0}, "data": {}, "parentId": "g1"}
  ],
  "edges": []
}"#,
        );
        assert_eq!(rules(&diags), vec!["parent-cycle", "parent-cycle"]);
    }

    #[test]
    fn advisory_rules() {
        let diags = lint(
            r#"{
  "nodes": [
    {"id": "g", "type": "group", "position": {"x": 0, "y": 0}, "data": {}},
    {"id": "c", "type": "component", "position": {"x": 0, "y": 0},
     "data": {"componentId": "cdn", "label": "CDN"}}
  ],
  "edges": []
}"#,
        );
        assert_eq!(rules(&diags), vec!["empty-group", "isolated-component"]);
        assert!(!has_errors(&diags));
    }

    #[test]
    fn duplicate_ids() {
        let diags = lint(
            r#"{
  "nodes": [
    {"id": "a", "type": "text", "position": {"x": 0, "y": 0}, "data": {"text": "x"}},
    {"id": "a", "type": "text", "position": {"x": 0, "y": 0}, "data": {"text": "y"}},
    {"id": "b", "type": "text", "position": {"x": 0, "y": 0}, "data": {"text": "z"}}
  ],
  "edges": [
    {"id": "e", "source": "a", "target": "b"},
    {"id": "e", "source": "b", "target": "a"}
  ]
}"#,
        );
        assert_eq!(rules(&diags), vec!["duplicate-node-id", "duplicate-edge-id"]);
    }
}
