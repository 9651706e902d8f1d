//! Submission encoding: the flattened diagram handed to the evaluator.
//!
//! Unlike the document, the payload carries absolute positions and no
//! parent links, so the evaluator never has to resolve group frames.
//! Every optional field is present (as `null`) to keep the shape fixed.

use crate::id::{EdgeId, NodeId};
use crate::model::{DiagramGraph, EdgeCurve, EdgeStyle, NodeKind, Position, Viewport};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmittedNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Absolute canvas position.
    pub position: Position,
    pub data: Value,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub curve: EdgeCurve,
    pub animated: bool,
    pub style: EdgeStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionMetadata {
    pub component_count: usize,
    pub connection_count: usize,
    /// RFC 3339, UTC.
    pub submitted_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionPayload {
    pub nodes: Vec<SubmittedNode>,
    pub edges: Vec<SubmittedEdge>,
    pub viewport: Viewport,
    pub metadata: SubmissionMetadata,
}

impl SubmissionPayload {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug)]
pub enum EncodeError {
    Data(serde_json::Error),
    Timestamp(time::error::Format),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::Data(e) => write!(f, "could not encode node data: {e}"),
            EncodeError::Timestamp(e) => write!(f, "could not format submission time: {e}"),
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EncodeError::Data(e) => Some(e),
            EncodeError::Timestamp(e) => Some(e),
        }
    }
}

/// Flatten a graph into a submission payload.
pub fn encode_submission(
    graph: &DiagramGraph,
    viewport: Viewport,
    submitted_at: OffsetDateTime,
) -> Result<SubmissionPayload, EncodeError> {
    let mut nodes = Vec::with_capacity(graph.node_count());
    for id in graph.paint_order() {
        let (Some(node), Some(position)) = (graph.get(id), graph.absolute_position(id)) else {
            continue;
        };
        nodes.push(SubmittedNode {
            id,
            kind: node.kind(),
            position,
            data: serde_json::to_value(&node.data).map_err(EncodeError::Data)?,
            width: node.size.map(|s| s.width),
            height: node.size.map(|s| s.height),
        });
    }

    let edges = graph
        .edges
        .iter()
        .map(|e| SubmittedEdge {
            id: e.id,
            source: e.source,
            target: e.target,
            source_handle: e.source_handle.clone(),
            target_handle: e.target_handle.clone(),
            label: e.label.clone(),
            curve: e.curve,
            animated: e.animated,
            style: e.style.clone(),
        })
        .collect::<Vec<_>>();

    let submitted_at = submitted_at
        .to_offset(time::UtcOffset::UTC)
        .format(&Rfc3339)
        .map_err(EncodeError::Timestamp)?;

    let component_count = nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Component)
        .count();

    Ok(SubmissionPayload {
        metadata: SubmissionMetadata {
            component_count,
            connection_count: edges.len(),
            submitted_at,
        },
        nodes,
        edges,
        viewport,
    })
}
