//! Undo/redo history.
//!
//! Every tracked edit pushes the graph as it was *before* the edit. Undo
//! swaps the current graph with the top of the past stack; redo swaps it
//! back from the future stack.
//!
//! Edits that only move or resize nodes are coalesced: the before/after
//! snapshots are compared with [`snapshots_equivalent`], which ignores
//! positions and sizes, and no entry is pushed when they match. Drag and
//! resize gestures use **snapshot batching** instead: the graph is captured
//! when the gesture starts and one entry is pushed when it ends, so undo
//! after a drag puts the node back exactly where it was picked up.

use ac_core::model::{DiagramGraph, Edge, Node};

/// One undoable step.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// The graph to restore.
    pub snapshot: DiagramGraph,
    pub description: String,
}

/// Whether two snapshots differ only in node positions and sizes.
///
/// Nodes compare on kind, data, and parent. Edges compare on endpoints,
/// handles, label, curve, animation, and style. An id present in only one
/// snapshot makes them different.
pub fn snapshots_equivalent(a: &DiagramGraph, b: &DiagramGraph) -> bool {
    if a.node_count() != b.node_count() || a.edge_count() != b.edge_count() {
        return false;
    }
    let nodes_match = a.nodes().all(|node| {
        b.get(node.id).is_some_and(|other| {
            same_identity(node, other) && a.parent_of(node.id) == b.parent_of(node.id)
        })
    });
    nodes_match
        && a
            .edges
            .iter()
            .all(|edge| b.get_edge(edge.id).is_some_and(|other| same_connection(edge, other)))
}

fn same_identity(a: &Node, b: &Node) -> bool {
    a.kind() == b.kind() && a.data == b.data
}

fn same_connection(a: &Edge, b: &Edge) -> bool {
    a.source == b.source
        && a.target == b.target
        && a.source_handle == b.source_handle
        && a.target_handle == b.target_handle
        && a.label == b.label
        && a.curve == b.curve
        && a.animated == b.animated
        && a.style == b.style
}

/// Past and future stacks with batch grouping for gestures.
pub struct History {
    past: Vec<HistoryEntry>,
    future: Vec<HistoryEntry>,
    /// Maximum undo depth.
    max_depth: usize,
    /// Batch nesting depth (0 = not batching).
    batch_depth: usize,
    /// Graph captured at the start of the outermost batch.
    batch_snapshot: Option<DiagramGraph>,
    batch_description: String,
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            past: Vec::new(),
            future: Vec::new(),
            max_depth,
            batch_depth: 0,
            batch_snapshot: None,
            batch_description: String::new(),
        }
    }

    /// Record a finished edit. Returns whether an entry was pushed.
    ///
    /// Inside a batch this does nothing: the batch snapshot already covers
    /// the edit.
    pub fn record(&mut self, before: DiagramGraph, after: &DiagramGraph, description: &str) -> bool {
        if self.batch_depth > 0 {
            return false;
        }
        if snapshots_equivalent(&before, after) {
            log::debug!("history: `{description}` coalesced");
            return false;
        }
        self.commit(before, description);
        true
    }

    fn commit(&mut self, snapshot: DiagramGraph, description: &str) {
        self.past.push(HistoryEntry {
            snapshot,
            description: description.to_string(),
        });
        if self.past.len() > self.max_depth {
            self.past.remove(0);
        }
        // Clear redo stack on new action
        self.future.clear();
    }

    /// Start a batch group, capturing the current graph. Nested calls only
    /// bump the depth.
    pub fn begin_batch(&mut self, graph: &DiagramGraph, description: &str) {
        if self.batch_depth == 0 {
            self.batch_snapshot = Some(graph.clone());
            self.batch_description = description.to_string();
        }
        self.batch_depth += 1;
    }

    /// End a batch group. When the outermost batch closes and the graph
    /// differs in any way from the captured one, one entry is pushed.
    pub fn end_batch(&mut self, graph: &DiagramGraph) -> bool {
        if self.batch_depth == 0 {
            return false;
        }
        self.batch_depth -= 1;
        if self.batch_depth > 0 {
            return false;
        }
        let description = std::mem::take(&mut self.batch_description);
        match self.batch_snapshot.take() {
            Some(before) if !before.content_eq(graph) => {
                self.commit(before, &description);
                true
            }
            _ => false,
        }
    }

    /// Close any open batch, however deeply nested.
    fn close_batch(&mut self, graph: &DiagramGraph) {
        if self.batch_depth > 0 {
            self.batch_depth = 1;
            self.end_batch(graph);
        }
    }

    /// Undo the last entry. Returns its description.
    pub fn undo(&mut self, graph: &mut DiagramGraph) -> Option<String> {
        self.close_batch(graph);
        let entry = self.past.pop()?;
        let current = std::mem::replace(graph, entry.snapshot);
        self.future.push(HistoryEntry {
            snapshot: current,
            description: entry.description.clone(),
        });
        Some(entry.description)
    }

    /// Redo the last undone entry. Returns its description.
    pub fn redo(&mut self, graph: &mut DiagramGraph) -> Option<String> {
        self.close_batch(graph);
        let entry = self.future.pop()?;
        let current = std::mem::replace(graph, entry.snapshot);
        self.past.push(HistoryEntry {
            snapshot: current,
            description: entry.description.clone(),
        });
        Some(entry.description)
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    /// Number of undoable entries.
    pub fn len(&self) -> usize {
        self.past.len()
    }

    pub fn is_empty(&self) -> bool {
        self.past.is_empty()
    }

    /// Drop both stacks and any open batch.
    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
        self.batch_depth = 0;
        self.batch_snapshot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_core::id::{EdgeId, NodeId};
    use ac_core::model::{Dimensions, Position, ShapeKind};
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    fn with_node(graph: &DiagramGraph, name: &str, x: f64) -> DiagramGraph {
        let mut next = graph.clone();
        next.add_node(Node::text(id(name), name, Position::new(x, 0.0)), None);
        next
    }

    #[test]
    fn redo_cleared_on_new_action() {
        let mut history = History::new(100);
        let mut graph = DiagramGraph::new();

        let before = graph.clone();
        graph = with_node(&graph, "h_a", 0.0);
        history.record(before, &graph, "add a");
        assert_eq!(history.undo(&mut graph).as_deref(), Some("add a"));
        assert!(history.can_redo());

        let before = graph.clone();
        graph = with_node(&graph, "h_b", 0.0);
        history.record(before, &graph, "add b");
        assert!(!history.can_redo());
    }

    #[test]
    fn position_only_edit_is_coalesced() {
        let mut history = History::new(100);
        let before = with_node(&DiagramGraph::new(), "h_move", 0.0);
        let mut after = before.clone();
        after.get_mut(id("h_move")).unwrap().position = Position::new(40.0, 40.0);
        assert!(!history.record(before, &after, "move"));
        assert!(!history.can_undo());
    }

    #[test]
    fn edge_label_counts_as_change() {
        let mut before = with_node(&DiagramGraph::new(), "h_src", 0.0);
        before.add_node(Node::text(id("h_dst"), "dst", Position::ORIGIN), None);
        before.add_edge(Edge::new(EdgeId::intern("h_e"), id("h_src"), id("h_dst")));
        let mut after = before.clone();
        after.get_edge_mut(EdgeId::intern("h_e")).unwrap().label = Some("reads".into());
        assert!(!snapshots_equivalent(&before, &after));
    }

    #[test]
    fn swapped_ids_are_not_equivalent() {
        let a = with_node(&DiagramGraph::new(), "h_x", 0.0);
        let mut b = DiagramGraph::new();
        b.add_node(
            Node::shape(
                id("h_y"),
                ShapeKind::Diamond,
                Position::ORIGIN,
                Dimensions::new(10.0, 10.0),
            ),
            None,
        );
        assert!(!snapshots_equivalent(&a, &b));
    }

    #[test]
    fn max_depth_evicts_oldest() {
        let mut history = History::new(3);
        let mut graph = DiagramGraph::new();
        for i in 0..5 {
            let before = graph.clone();
            graph = with_node(&graph, &format!("h_depth_{i}"), 0.0);
            history.record(before, &graph, &format!("add {i}"));
        }
        assert_eq!(history.len(), 3);
        let mut undone = Vec::new();
        while let Some(desc) = history.undo(&mut graph) {
            undone.push(desc);
        }
        assert_eq!(undone, vec!["add 4", "add 3", "add 2"]);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn batch_is_single_step() {
        let mut history = History::new(100);
        let mut graph = with_node(&DiagramGraph::new(), "h_drag", 0.0);

        history.begin_batch(&graph, "drag");
        for x in 1..=10 {
            graph.get_mut(id("h_drag")).unwrap().position = Position::new(x as f64, 0.0);
        }
        assert!(history.end_batch(&graph));
        assert_eq!(history.len(), 1);

        history.undo(&mut graph);
        assert_eq!(graph.get(id("h_drag")).unwrap().position, Position::ORIGIN);
    }

    #[test]
    fn empty_batch_no_entry() {
        let mut history = History::new(100);
        let graph = with_node(&DiagramGraph::new(), "h_still", 0.0);
        history.begin_batch(&graph, "drag");
        history.begin_batch(&graph, "nested");
        assert!(!history.end_batch(&graph));
        assert!(history.in_batch());
        assert!(!history.end_batch(&graph));
        assert!(!history.can_undo());
    }

    #[test]
    fn undo_closes_open_batch() {
        let mut history = History::new(100);
        let mut graph = with_node(&DiagramGraph::new(), "h_open", 0.0);
        history.begin_batch(&graph, "drag");
        graph.get_mut(id("h_open")).unwrap().position = Position::new(7.0, 7.0);
        assert_eq!(history.undo(&mut graph).as_deref(), Some("drag"));
        assert!(!history.in_batch());
        assert_eq!(graph.get(id("h_open")).unwrap().position, Position::ORIGIN);
    }

    #[test]
    fn undo_at_boundary_is_noop() {
        let mut history = History::new(100);
        let mut graph = DiagramGraph::new();
        assert_eq!(history.undo(&mut graph), None);
        assert_eq!(history.redo(&mut graph), None);
    }
}
