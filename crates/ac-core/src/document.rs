//! The portable diagram document: `{ nodes, edges, viewport }`.
//!
//! This is the one format used for export/import, for the auto-saved local
//! copy, and as the source of the submission payload. Import is all or
//! nothing: a document that fails to parse, fails lint at error level, or
//! carries node data that does not decode for its kind is rejected whole,
//! and the caller keeps its current graph.

use crate::id::NodeId;
use crate::lint::{LintDiagnostic, LintSeverity, lint_document};
use crate::model::{Dimensions, DiagramGraph, Edge, Node, NodeData, NodeKind, Position, Viewport};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A node as it appears in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub position: Position,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
}

impl NodeRecord {
    fn from_node(node: &Node, parent_id: Option<NodeId>) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: node.id,
            kind: node.kind(),
            position: node.position,
            data: serde_json::to_value(&node.data)?,
            width: node.size.map(|s| s.width),
            height: node.size.map(|s| s.height),
            parent_id,
        })
    }

    /// Decode into a live node (parent link is applied separately).
    pub fn to_node(&self) -> Result<Node, ImportError> {
        let value = match &self.data {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };
        let data = NodeData::from_value(self.kind, value).map_err(|source| {
            ImportError::Data {
                id: self.id,
                source,
            }
        })?;
        let mut node = Node::new(self.id, data, self.position);
        node.size = match (self.width, self.height) {
            (Some(width), Some(height)) => Some(Dimensions::new(width, height)),
            (None, None) => None,
            _ => return Err(ImportError::PartialSize { id: self.id }),
        };
        Ok(node)
    }
}

/// A whole diagram in interchange form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiagramDocument {
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub viewport: Viewport,
}

impl DiagramDocument {
    /// Capture a graph. Nodes are listed parents-first.
    pub fn from_graph(graph: &DiagramGraph, viewport: Viewport) -> Result<Self, serde_json::Error> {
        let nodes = graph
            .paint_order()
            .into_iter()
            .filter_map(|id| graph.get(id).map(|n| (n, graph.parent_of(id))))
            .map(|(node, parent)| NodeRecord::from_node(node, parent))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            nodes,
            edges: graph.edges.clone(),
            viewport,
        })
    }

    /// Validate and build a live graph.
    pub fn into_graph(self) -> Result<(DiagramGraph, Viewport), ImportError> {
        let errors: Vec<LintDiagnostic> = lint_document(&self)
            .into_iter()
            .filter(|d| d.severity == LintSeverity::Error)
            .collect();
        if !errors.is_empty() {
            return Err(ImportError::Invalid(errors));
        }

        let nodes = self
            .nodes
            .iter()
            .map(NodeRecord::to_node)
            .collect::<Result<Vec<_>, _>>()?;

        let mut graph = DiagramGraph::new();
        for node in nodes {
            graph.add_node(node, None);
        }
        for record in &self.nodes {
            if let Some(parent) = record.parent_id
                && !graph.set_parent(record.id, Some(parent))
            {
                log::warn!("import: could not place {} inside {parent}", record.id);
            }
        }
        for edge in self.edges {
            graph.add_edge(edge);
        }
        Ok((graph, self.viewport))
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────────

/// Why a document could not be imported.
#[derive(Debug)]
pub enum ImportError {
    /// Not JSON, or not shaped like a diagram document.
    Syntax(serde_json::Error),
    /// Breaks graph invariants (dangling edges, bad parents…).
    Invalid(Vec<LintDiagnostic>),
    /// A node's `data` does not match its `type`.
    Data {
        id: NodeId,
        source: serde_json::Error,
    },
    /// Only one of `width` / `height` is present.
    PartialSize { id: NodeId },
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Syntax(e) => write!(f, "not a valid diagram file: {e}"),
            ImportError::Invalid(diags) => {
                let first = diags
                    .first()
                    .map(|d| d.message.as_str())
                    .unwrap_or("unknown problem");
                match diags.len() {
                    0 | 1 => write!(f, "diagram rejected: {first}"),
                    n => write!(f, "diagram rejected: {first} (and {} more)", n - 1),
                }
            }
            ImportError::Data { id, source } => {
                write!(f, "node `{id}` has invalid data: {source}")
            }
            ImportError::PartialSize { id } => {
                write!(f, "node `{id}` needs both width and height, or neither")
            }
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Syntax(e) => Some(e),
            ImportError::Data { source, .. } => Some(source),
            ImportError::Invalid(_) | ImportError::PartialSize { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(e: serde_json::Error) -> Self {
        ImportError::Syntax(e)
    }
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Parse document text without validating graph invariants.
pub fn parse_document(text: &str) -> Result<DiagramDocument, ImportError> {
    Ok(serde_json::from_str(text)?)
}

/// Parse, validate, and build a graph from document text.
pub fn import_document(text: &str) -> Result<(DiagramGraph, Viewport), ImportError> {
    parse_document(text)?.into_graph()
}

/// Serialize a graph as a human-readable document.
pub fn export_document(graph: &DiagramGraph, viewport: Viewport) -> Result<String, serde_json::Error> {
    DiagramDocument::from_graph(graph, viewport)?.to_json_pretty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::EdgeId;
    use pretty_assertions::assert_eq;

    #[test]
    fn export_lists_parents_first() {
        let mut g = DiagramGraph::new();
        let child = NodeId::intern("doc_child");
        let group = NodeId::intern("doc_group");
        g.add_node(Node::text(child, "x", Position::new(5.0, 5.0)), None);
        g.add_node(
            Node::group(group, Position::ORIGIN, Dimensions::new(50.0, 50.0)),
            None,
        );
        g.set_parent(child, Some(group));

        let doc = DiagramDocument::from_graph(&g, Viewport::default()).unwrap();
        let ids: Vec<NodeId> = doc.nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![group, child]);
        assert_eq!(doc.nodes[1].parent_id, Some(group));
        assert_eq!(doc.nodes[0].width, Some(50.0));
    }

    #[test]
    fn import_accepts_children_before_parents() {
        let text = r#"{
  "nodes": [
    {"id": "imp_c", "type": "text", "position": {"x": 1, "y": 2}, "data": {"text": "c"}, "parentId": "imp_g"},
    {"id": "imp_g", "type": "group", "position": {"x": 10, "y": 10}, "data": {}, "width": 100, "height": 80}
  ]
}"#;
        let (g, viewport) = import_document(text).unwrap();
        assert_eq!(viewport, Viewport::default());
        assert_eq!(
            g.parent_of(NodeId::intern("imp_c")),
            Some(NodeId::intern("imp_g"))
        );
        assert_eq!(
            g.absolute_position(NodeId::intern("imp_c")),
            Some(Position::new(11.0, 12.0))
        );
    }

    #[test]
    fn malformed_json_is_a_syntax_error() {
        let err = import_document("{ nodes: ").unwrap_err();
        assert!(matches!(err, ImportError::Syntax(_)));
        assert!(err.to_string().starts_with("not a valid diagram file"));
    }

    #[test]
    fn data_mismatch_is_reported_with_node_id() {
        let text = r#"{"nodes": [{"id": "bad", "type": "component", "position": {"x": 0, "y": 0}, "data": {"text": "x"}}]}"#;
        match import_document(text).unwrap_err() {
            ImportError::Data { id, .. } => assert_eq!(id, NodeId::intern("bad")),
            other => panic!("expected data error, got {other}"),
        }
    }

    #[test]
    fn half_a_size_does_not_decode() {
        let record: NodeRecord = serde_json::from_str(
            r#"{"id": "half", "type": "group", "position": {"x": 0, "y": 0}, "data": {}, "width": 80}"#,
        )
        .unwrap();
        assert!(matches!(
            record.to_node(),
            Err(ImportError::PartialSize { id }) if id == NodeId::intern("half")
        ));

        let text = r#"{"nodes": [{"id": "half", "type": "shape", "position": {"x": 0, "y": 0},
            "data": {"shape": "rectangle"}, "height": 40}]}"#;
        match import_document(text).unwrap_err() {
            ImportError::Invalid(diags) => assert_eq!(diags[0].rule, "partial-size"),
            other => panic!("expected invalid document, got {other}"),
        }
    }

    #[test]
    fn dangling_edge_rejects_whole_document() {
        let text = r#"{
  "nodes": [{"id": "only", "type": "text", "position": {"x": 0, "y": 0}, "data": {"text": "x"}}],
  "edges": [{"id": "e", "source": "ghost", "target": "only"}]
}"#;
        let err = import_document(text).unwrap_err();
        match &err {
            ImportError::Invalid(diags) => assert_eq!(diags[0].rule, "dangling-edge"),
            other => panic!("expected invalid, got {other}"),
        }
        assert_eq!(
            err.to_string(),
            "diagram rejected: Edge `e` references missing node `ghost`."
        );
    }

    #[test]
    fn edge_fields_use_camel_case() {
        let mut g = DiagramGraph::new();
        let a = NodeId::intern("cc_a");
        let b = NodeId::intern("cc_b");
        g.add_node(Node::text(a, "a", Position::ORIGIN), None);
        g.add_node(Node::text(b, "b", Position::ORIGIN), None);
        let mut edge = Edge::new(EdgeId::intern("cc_e"), a, b);
        edge.source_handle = Some("right".into());
        edge.style.dashed = true;
        g.add_edge(edge);

        let json = export_document(&g, Viewport::default()).unwrap();
        assert!(json.contains("\"sourceHandle\": \"right\""));
        assert!(json.contains("\"type\": \"default\""));
        assert!(json.contains("\"dashed\": true"));
    }
}
