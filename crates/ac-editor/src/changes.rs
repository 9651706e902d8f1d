//! Canvas deltas.
//!
//! The canvas layer reports gestures as batches of small changes: a drag
//! emits one `Position` change per frame, a click emits `Select` changes, the
//! delete key emits `Remove` changes. The store folds these into the graph.
//! They deserialize from the canvas' JSON shape (`{"type": "position", …}`).

use ac_core::document::NodeRecord;
use ac_core::id::{EdgeId, NodeId};
use ac_core::model::{Dimensions, Edge, Position};
use serde::Deserialize;
use std::collections::HashSet;

/// A delta against the node set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeChange {
    /// Drag frame or drop. `dragging` is `Some(true)` mid-gesture and
    /// `Some(false)` on the closing frame.
    Position {
        id: NodeId,
        #[serde(default)]
        position: Option<Position>,
        #[serde(default)]
        dragging: Option<bool>,
    },
    /// Resize frame or measurement. `resizing` mirrors `dragging`.
    Dimensions {
        id: NodeId,
        #[serde(default)]
        dimensions: Option<Dimensions>,
        #[serde(default)]
        resizing: Option<bool>,
    },
    Select {
        id: NodeId,
        selected: bool,
    },
    Remove {
        id: NodeId,
    },
    Add {
        item: NodeRecord,
    },
    Replace {
        id: NodeId,
        item: NodeRecord,
    },
}

impl NodeChange {
    pub fn id(&self) -> NodeId {
        match self {
            NodeChange::Position { id, .. }
            | NodeChange::Dimensions { id, .. }
            | NodeChange::Select { id, .. }
            | NodeChange::Remove { id }
            | NodeChange::Replace { id, .. } => *id,
            NodeChange::Add { item } => item.id,
        }
    }

    /// `Some(true)` for a frame inside an interactive drag/resize,
    /// `Some(false)` for the frame that ends one, `None` otherwise.
    pub fn interaction(&self) -> Option<bool> {
        match self {
            NodeChange::Position { dragging, .. } => *dragging,
            NodeChange::Dimensions { resizing, .. } => *resizing,
            _ => None,
        }
    }
}

/// A delta against the edge set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EdgeChange {
    Select { id: EdgeId, selected: bool },
    Remove { id: EdgeId },
    Add { item: Edge },
    Replace { id: EdgeId, item: Edge },
}

/// Keep only the latest position change per node (and drag phase); every
/// other change is kept, in order.
pub fn coalesce_node_changes(changes: Vec<NodeChange>) -> Vec<NodeChange> {
    let mut seen: HashSet<(NodeId, Option<bool>)> = HashSet::new();
    let mut kept: Vec<NodeChange> = changes
        .into_iter()
        .rev()
        .filter(|change| match change {
            NodeChange::Position { id, dragging, .. } => seen.insert((*id, *dragging)),
            _ => true,
        })
        .collect();
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pos(id: &str, x: f64, dragging: Option<bool>) -> NodeChange {
        NodeChange::Position {
            id: NodeId::intern(id),
            position: Some(Position::new(x, 0.0)),
            dragging,
        }
    }

    #[test]
    fn latest_position_wins() {
        let select = NodeChange::Select {
            id: NodeId::intern("b"),
            selected: true,
        };
        let out = coalesce_node_changes(vec![
            pos("a", 1.0, Some(true)),
            select.clone(),
            pos("a", 2.0, Some(true)),
            pos("a", 3.0, Some(true)),
        ]);
        assert_eq!(out, vec![select, pos("a", 3.0, Some(true))]);
    }

    #[test]
    fn drag_phases_are_not_merged() {
        let out = coalesce_node_changes(vec![
            pos("a", 1.0, Some(true)),
            pos("a", 2.0, Some(false)),
            pos("b", 5.0, Some(true)),
        ]);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn deserializes_canvas_shape() {
        let changes: Vec<NodeChange> = serde_json::from_str(
            r#"[
  {"type": "position", "id": "n1", "position": {"x": 4, "y": 2}, "dragging": true},
  {"type": "select", "id": "n1", "selected": false},
  {"type": "remove", "id": "n2"}
]"#,
        )
        .unwrap();
        assert_eq!(changes[0].interaction(), Some(true));
        assert_eq!(changes[2].id(), NodeId::intern("n2"));

        let edge: EdgeChange =
            serde_json::from_str(r#"{"type": "select", "id": "e1", "selected": true}"#).unwrap();
        assert_eq!(
            edge,
            EdgeChange::Select {
                id: EdgeId::intern("e1"),
                selected: true
            }
        );
    }
}
