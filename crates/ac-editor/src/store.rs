//! Graph state store: the single source of truth for the open diagram.
//!
//! The store owns the graph, the current selection, the active tool, and
//! the viewport. Every canvas interaction lands here, either as a batch of
//! deltas ([`DiagramStore::apply_node_changes`]) or as a structural edit
//! (add, connect, group, delete…).
//!
//! All operations are total: an edit whose preconditions do not hold
//! (self-connection, grouping a single node, unknown id) is a silent no-op
//! and reports that nothing changed. The store does not record history;
//! [`crate::Editor`] wraps it with the history tracker.

use crate::changes::{EdgeChange, NodeChange, coalesce_node_changes};
use crate::config::EditorConfig;
use crate::tools::{ToolKind, ToolState};
use ac_core::geometry::padded_bounding_box;
use ac_core::id::{EdgeId, NodeId};
use ac_core::model::*;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

/// Selected nodes and edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub nodes: BTreeSet<NodeId>,
    pub edges: BTreeSet<EdgeId>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }
}

/// Partial update of an edge. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgePatch {
    /// `Some(None)` clears the label.
    pub label: Option<Option<String>>,
    pub curve: Option<EdgeCurve>,
    pub animated: Option<bool>,
    pub style: Option<EdgeStyle>,
}

/// Owns the live diagram and everything the canvas reads from it.
///
/// Canvas deltas and structural edits land here; none of them touch
/// history. Invalid edits are no-ops that return `false` (or `None`).
pub struct DiagramStore {
    /// The current diagram (single source of truth).
    pub graph: DiagramGraph,

    pub selection: Selection,

    pub viewport: Viewport,

    tools: ToolState,

    group_padding: f64,

    duplicate_offset: f64,
}

impl DiagramStore {
    /// Create an empty store.
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            graph: DiagramGraph::new(),
            selection: Selection::default(),
            viewport: Viewport::default(),
            tools: ToolState::default(),
            group_padding: config.group_padding,
            duplicate_offset: config.duplicate_offset,
        }
    }

    // ─── Canvas deltas ───────────────────────────────────────────────────

    /// Fold a batch of node deltas into the graph. Position changes are
    /// coalesced first. Deltas naming unknown nodes or carrying items that
    /// do not decode are skipped. Returns whether anything changed.
    pub fn apply_node_changes(&mut self, changes: Vec<NodeChange>) -> bool {
        let mut changed = false;
        for change in coalesce_node_changes(changes) {
            changed |= self.apply_node_change(change);
        }
        changed
    }

    fn apply_node_change(&mut self, change: NodeChange) -> bool {
        match change {
            NodeChange::Position { id, position, .. } => {
                let (Some(node), Some(position)) = (self.graph.get_mut(id), position) else {
                    return false;
                };
                log::trace!("position {id} -> ({}, {})", position.x, position.y);
                let moved = node.position != position;
                node.position = position;
                moved
            }
            NodeChange::Dimensions { id, dimensions, .. } => {
                let (Some(node), Some(dimensions)) = (self.graph.get_mut(id), dimensions) else {
                    return false;
                };
                let resized = node.size != Some(dimensions);
                node.size = Some(dimensions);
                resized
            }
            NodeChange::Select { id, selected } => {
                if !self.graph.contains(id) {
                    return false;
                }
                if selected {
                    self.selection.nodes.insert(id)
                } else {
                    self.selection.nodes.remove(&id)
                }
            }
            NodeChange::Remove { id } => self.remove_node(id),
            NodeChange::Add { item } => match item.to_node() {
                Ok(node) => self.graph.add_node(node, item.parent_id),
                Err(e) => {
                    log::debug!("node add delta skipped: {e}");
                    false
                }
            },
            NodeChange::Replace { id, item } => {
                if item.id != id || !self.graph.contains(id) {
                    return false;
                }
                let node = match item.to_node() {
                    Ok(node) => node,
                    Err(e) => {
                        log::debug!("node replace delta skipped: {e}");
                        return false;
                    }
                };
                if self.graph.parent_of(id) != item.parent_id
                    && !self.graph.set_parent(id, item.parent_id)
                {
                    log::debug!(
                        "node replace delta skipped: {id} cannot move under {:?}",
                        item.parent_id
                    );
                    return false;
                }
                match self.graph.get_mut(id) {
                    Some(slot) if *slot != node => {
                        *slot = node;
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    /// Fold a batch of edge deltas into the graph.
    pub fn apply_edge_changes(&mut self, changes: Vec<EdgeChange>) -> bool {
        let mut changed = false;
        for change in changes {
            changed |= match change {
                EdgeChange::Select { id, selected } => {
                    if self.graph.get_edge(id).is_none() {
                        false
                    } else if selected {
                        self.selection.edges.insert(id)
                    } else {
                        self.selection.edges.remove(&id)
                    }
                }
                EdgeChange::Remove { id } => {
                    self.selection.edges.remove(&id);
                    self.graph.remove_edge(id).is_some()
                }
                EdgeChange::Add { item } => self.graph.add_edge(item),
                EdgeChange::Replace { id, item } => self.replace_edge(id, item),
            };
        }
        changed
    }

    fn replace_edge(&mut self, id: EdgeId, item: Edge) -> bool {
        let valid = item.id == id
            && item.source != item.target
            && self.graph.contains(item.source)
            && self.graph.contains(item.target);
        match self.graph.get_edge_mut(id) {
            Some(slot) if valid && *slot != item => {
                *slot = item;
                true
            }
            _ => false,
        }
    }

    // ─── Structural edits ────────────────────────────────────────────────

    /// Place a node, optionally inside a group.
    pub fn add_node(&mut self, node: Node, parent: Option<NodeId>) -> bool {
        self.graph.add_node(node, parent)
    }

    /// Shallow-merge `patch` into a node's data. A patch that would not
    /// decode for the node's kind is ignored.
    pub fn update_node_properties(&mut self, id: NodeId, patch: &Map<String, Value>) -> bool {
        let Some(node) = self.graph.get_mut(id) else {
            return false;
        };
        match node.data.merged(patch) {
            Ok(data) if data != node.data => {
                node.data = data;
                true
            }
            Ok(_) => false,
            Err(e) => {
                log::debug!("property patch for {id} ignored: {e}");
                false
            }
        }
    }

    /// Connect two nodes. Returns the new edge id, or `None` for a
    /// self-connection, a missing endpoint, or an identical existing edge.
    pub fn connect(&mut self, source: NodeId, target: NodeId, handles: Handles) -> Option<EdgeId> {
        if source == target {
            log::debug!("connect: self-connection on {source} ignored");
            return None;
        }
        let duplicate = self.graph.edges.iter().any(|e| {
            e.source == source
                && e.target == target
                && e.source_handle == handles.source
                && e.target_handle == handles.target
        });
        if duplicate {
            log::debug!("connect: {source} -> {target} already connected");
            return None;
        }
        let edge = Edge::new(EdgeId::with_prefix("edge"), source, target).with_handles(handles);
        let id = edge.id;
        self.graph.add_edge(edge).then_some(id)
    }

    pub fn update_edge(&mut self, id: EdgeId, patch: EdgePatch) -> bool {
        let Some(edge) = self.graph.get_edge_mut(id) else {
            return false;
        };
        let before = edge.clone();
        if let Some(label) = patch.label {
            edge.label = label;
        }
        if let Some(curve) = patch.curve {
            edge.curve = curve;
        }
        if let Some(animated) = patch.animated {
            edge.animated = animated;
        }
        if let Some(style) = patch.style {
            edge.style = style;
        }
        *edge != before
    }

    /// Remove one node: its edges go with it, its children are detached.
    fn remove_node(&mut self, id: NodeId) -> bool {
        let touching: Vec<EdgeId> = self.graph.edges_touching(id).map(|e| e.id).collect();
        if self.graph.remove_node(id).is_none() {
            return false;
        }
        self.selection.nodes.remove(&id);
        for edge in touching {
            self.selection.edges.remove(&edge);
        }
        true
    }

    /// Remove the given nodes (erase gesture). Returns how many existed.
    pub fn delete_nodes(&mut self, ids: &[NodeId]) -> usize {
        ids.iter().filter(|id| self.remove_node(**id)).count()
    }

    /// Remove the selected edges and nodes.
    pub fn delete_selected(&mut self) -> bool {
        let edges: Vec<EdgeId> = self.selection.edges.iter().copied().collect();
        let nodes: Vec<NodeId> = self.selection.nodes.iter().copied().collect();
        let mut changed = false;
        for id in edges {
            changed |= self.graph.remove_edge(id).is_some();
        }
        changed |= self.delete_nodes(&nodes) > 0;
        self.selection.clear();
        changed
    }

    /// Wrap at least two nodes in a new group sized to their padded
    /// bounding box. Nodes whose ancestor is also listed move with that
    /// ancestor and are not counted. The group goes into the members'
    /// common parent, or top level if they have none in common. Returns the
    /// group id and selects it.
    pub fn group(&mut self, ids: &[NodeId]) -> Option<NodeId> {
        let mut listed: Vec<NodeId> = Vec::new();
        for &id in ids {
            if self.graph.contains(id) && !listed.contains(&id) {
                listed.push(id);
            }
        }
        let members: Vec<NodeId> = listed
            .iter()
            .copied()
            .filter(|&id| {
                !listed
                    .iter()
                    .any(|&other| other != id && self.graph.is_ancestor_of(other, id))
            })
            .collect();
        if members.len() < 2 {
            log::debug!("group: need at least two nodes, got {}", members.len());
            return None;
        }

        let bounds = padded_bounding_box(&self.graph, &members, self.group_padding)?;
        let first_parent = self.graph.parent_of(members[0]);
        let parent = if members
            .iter()
            .all(|&id| self.graph.parent_of(id) == first_parent)
        {
            first_parent
        } else {
            None
        };
        let parent_origin = parent
            .and_then(|p| self.graph.absolute_position(p))
            .unwrap_or(Position::ORIGIN);
        let group_origin = Position::new(bounds.x0, bounds.y0);

        let absolute: Vec<(NodeId, Position)> = members
            .iter()
            .filter_map(|&id| self.graph.absolute_position(id).map(|p| (id, p)))
            .collect();

        let group_id = NodeId::with_prefix("group");
        let group = Node::group(
            group_id,
            group_origin - parent_origin,
            Dimensions::new(bounds.width(), bounds.height()),
        );
        self.graph.add_node(group, parent);
        for (id, abs) in absolute {
            self.graph.set_parent(id, Some(group_id));
            if let Some(node) = self.graph.get_mut(id) {
                node.position = abs - group_origin;
            }
        }

        self.selection.clear();
        self.selection.nodes.insert(group_id);
        Some(group_id)
    }

    pub fn group_selected(&mut self) -> Option<NodeId> {
        let ids: Vec<NodeId> = self.selection.nodes.iter().copied().collect();
        self.group(&ids)
    }

    /// Dissolve groups: children move to each group's parent frame with
    /// positions translated, and the emptied group is removed. Non-group
    /// ids are ignored. Returns how many groups were dissolved; the freed
    /// children become the selection.
    pub fn ungroup(&mut self, ids: &[NodeId]) -> usize {
        let mut freed = Vec::new();
        let mut count = 0;
        for &id in ids {
            if !self.graph.get(id).is_some_and(Node::is_group) {
                continue;
            }
            let children = self.graph.children_of(id);
            // Removal detaches the children into the parent frame.
            if self.remove_node(id) {
                freed.extend(children);
                count += 1;
            }
        }
        if count > 0 {
            self.selection.clear();
            self.selection
                .nodes
                .extend(freed.into_iter().filter(|id| self.graph.contains(*id)));
        }
        count
    }

    pub fn ungroup_selected(&mut self) -> usize {
        let ids: Vec<NodeId> = self.selection.nodes.iter().copied().collect();
        self.ungroup(&ids)
    }

    /// Copy the selected nodes (and the edges among them) with an offset.
    /// Children of a copied group are copied into the new group. The
    /// copies become the selection.
    pub fn duplicate_selected(&mut self) -> Vec<NodeId> {
        let sources: Vec<NodeId> = self
            .graph
            .paint_order()
            .into_iter()
            .filter(|id| self.selection.nodes.contains(id))
            .collect();
        let mut mapping: HashMap<NodeId, NodeId> = HashMap::new();
        let mut created = Vec::new();

        for id in sources {
            let Some(mut copy) = self.graph.get(id).cloned() else {
                continue;
            };
            let parent = self.graph.parent_of(id);
            let (parent, offset) = match parent.and_then(|p| mapping.get(&p)) {
                Some(&copied_parent) => (Some(copied_parent), 0.0),
                None => (parent, self.duplicate_offset),
            };
            copy.id = NodeId::with_prefix(copy.kind().as_str());
            copy.position = copy.position + Position::new(offset, offset);
            let new_id = copy.id;
            if self.graph.add_node(copy, parent) {
                mapping.insert(id, new_id);
                created.push(new_id);
            }
        }

        let copies: Vec<Edge> = self
            .graph
            .edges
            .iter()
            .filter_map(|e| {
                let source = *mapping.get(&e.source)?;
                let target = *mapping.get(&e.target)?;
                let mut copy = e.clone();
                copy.id = EdgeId::with_prefix("edge");
                copy.source = source;
                copy.target = target;
                Some(copy)
            })
            .collect();
        for edge in copies {
            self.graph.add_edge(edge);
        }

        if !created.is_empty() {
            self.selection.clear();
            self.selection.nodes.extend(created.iter().copied());
        }
        created
    }

    // ─── Selection, tool, viewport ───────────────────────────────────────

    /// Replace the node selection (unknown ids are dropped).
    pub fn select(&mut self, ids: &[NodeId]) {
        self.selection.clear();
        self.selection
            .nodes
            .extend(ids.iter().copied().filter(|id| self.graph.contains(*id)));
    }

    pub fn select_all(&mut self) {
        self.selection.nodes = self.graph.node_ids().iter().copied().collect();
        self.selection.edges = self.graph.edges.iter().map(|e| e.id).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Drop selected ids that no longer exist (after undo/redo/import).
    pub fn prune_selection(&mut self) {
        let graph = &self.graph;
        self.selection.nodes.retain(|id| graph.contains(*id));
        self.selection
            .edges
            .retain(|id| graph.get_edge(*id).is_some());
    }

    pub fn tool(&self) -> ToolKind {
        self.tools.active()
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tools.set(tool);
    }

    pub fn toggle_last_tool(&mut self) {
        self.tools.toggle_last();
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    // ─── Whole-diagram replacement ───────────────────────────────────────

    /// Swap in a whole graph (import, restore).
    pub fn replace(&mut self, graph: DiagramGraph, viewport: Viewport) {
        self.graph = graph;
        self.viewport = viewport;
        self.selection.clear();
    }

    pub fn clear(&mut self) -> bool {
        if self.graph.is_empty() {
            return false;
        }
        self.graph = DiagramGraph::new();
        self.selection.clear();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_core::NodeRecord;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    fn store_with_two() -> DiagramStore {
        let mut store = DiagramStore::new(&EditorConfig::default());
        store.add_node(
            Node::component(id("st_a"), "lb", "LB", Position::new(0.0, 0.0)),
            None,
        );
        store.add_node(
            Node::component(id("st_b"), "api", "API", Position::new(100.0, 0.0)),
            None,
        );
        store
    }

    #[test]
    fn replace_with_bad_parent_is_skipped() {
        let mut store = store_with_two();
        let g = store.group(&[id("st_a"), id("st_b")]).unwrap();
        let mut record = NodeRecord {
            id: id("st_a"),
            kind: NodeKind::Component,
            position: Position::new(999.0, 999.0),
            data: serde_json::json!({ "componentId": "lb", "label": "Renamed" }),
            width: None,
            height: None,
            parent_id: Some(id("st_b")),
        };

        // `st_b` is not a group: nothing changes, not even the position.
        let before = store.graph.get(id("st_a")).cloned();
        assert!(!store.apply_node_changes(vec![NodeChange::Replace {
            id: id("st_a"),
            item: record.clone(),
        }]));
        assert_eq!(store.graph.get(id("st_a")).cloned(), before);
        assert_eq!(store.graph.parent_of(id("st_a")), Some(g));

        record.parent_id = None;
        assert!(store.apply_node_changes(vec![NodeChange::Replace {
            id: id("st_a"),
            item: record,
        }]));
        assert_eq!(store.graph.parent_of(id("st_a")), None);
        assert_eq!(
            store.graph.get(id("st_a")).unwrap().position,
            Position::new(999.0, 999.0)
        );
    }

    #[test]
    fn group_scenario_matches_padding() {
        let mut store = store_with_two();
        let g = store.group(&[id("st_a"), id("st_b")]).unwrap();
        let group = store.graph.get(g).unwrap();
        assert_eq!(group.position, Position::new(-20.0, -20.0));
        assert_eq!(group.size, Some(Dimensions::new(140.0, 40.0)));
        assert_eq!(
            store.graph.get(id("st_a")).unwrap().position,
            Position::new(20.0, 20.0)
        );
        assert_eq!(
            store.graph.get(id("st_b")).unwrap().position,
            Position::new(120.0, 20.0)
        );
        assert_eq!(store.selection.nodes.iter().copied().collect::<Vec<_>>(), vec![g]);

        assert_eq!(store.ungroup(&[g]), 1);
        assert!(!store.graph.contains(g));
        assert_eq!(
            store.graph.get(id("st_a")).unwrap().position,
            Position::new(0.0, 0.0)
        );
        assert_eq!(
            store.graph.get(id("st_b")).unwrap().position,
            Position::new(100.0, 0.0)
        );
    }

    #[test]
    fn group_needs_two_nodes() {
        let mut store = store_with_two();
        assert_eq!(store.group(&[id("st_a")]), None);
        assert_eq!(store.group(&[id("st_a"), id("st_a")]), None);
        assert_eq!(store.group(&[id("st_a"), id("st_missing")]), None);
        assert_eq!(store.graph.node_count(), 2);
    }

    #[test]
    fn nested_group_lands_in_common_parent() {
        let mut store = store_with_two();
        let outer = store.group(&[id("st_a"), id("st_b")]).unwrap();
        let inner = store.group(&[id("st_a"), id("st_b")]).unwrap();
        assert_eq!(store.graph.parent_of(inner), Some(outer));
        assert_eq!(
            store.graph.absolute_position(id("st_b")),
            Some(Position::new(100.0, 0.0))
        );
    }

    #[test]
    fn self_connection_is_ignored() {
        let mut store = store_with_two();
        assert_eq!(store.connect(id("st_a"), id("st_a"), Handles::default()), None);
        assert_eq!(store.graph.edge_count(), 0);
    }

    #[test]
    fn duplicate_connection_is_ignored() {
        let mut store = store_with_two();
        let first = store.connect(id("st_a"), id("st_b"), Handles::new(Some("r"), Some("l")));
        assert!(first.is_some());
        assert_eq!(
            store.connect(id("st_a"), id("st_b"), Handles::new(Some("r"), Some("l"))),
            None
        );
        // Different handles make a different connection.
        assert!(
            store
                .connect(id("st_a"), id("st_b"), Handles::new(Some("b"), Some("t")))
                .is_some()
        );
    }

    #[test]
    fn delete_selected_cascades_edges() {
        let mut store = store_with_two();
        store.connect(id("st_a"), id("st_b"), Handles::default());
        store.select(&[id("st_a")]);
        assert!(store.delete_selected());
        assert_eq!(store.graph.edge_count(), 0);
        assert!(store.selection.is_empty());
    }

    #[test]
    fn update_properties_merges_config() {
        let mut store = store_with_two();
        let patch: Map<String, Value> =
            serde_json::from_str(r#"{"config": {"replicas": 3}, "label": "Edge LB"}"#).unwrap();
        assert!(store.update_node_properties(id("st_a"), &patch));
        assert!(!store.update_node_properties(id("st_a"), &patch));
        match &store.graph.get(id("st_a")).unwrap().data {
            NodeData::Component(c) => {
                assert_eq!(c.label, "Edge LB");
                assert_eq!(c.config["replicas"], Value::from(3));
            }
            other => panic!("expected component, got {other:?}"),
        }
    }

    #[test]
    fn deltas_move_select_and_remove() {
        let mut store = store_with_two();
        let changed = store.apply_node_changes(vec![
            NodeChange::Position {
                id: id("st_a"),
                position: Some(Position::new(5.0, 5.0)),
                dragging: Some(true),
            },
            NodeChange::Position {
                id: id("st_a"),
                position: Some(Position::new(9.0, 9.0)),
                dragging: Some(true),
            },
            NodeChange::Select {
                id: id("st_b"),
                selected: true,
            },
            NodeChange::Position {
                id: id("st_ghost"),
                position: Some(Position::ORIGIN),
                dragging: None,
            },
        ]);
        assert!(changed);
        assert_eq!(
            store.graph.get(id("st_a")).unwrap().position,
            Position::new(9.0, 9.0)
        );
        assert!(store.selection.nodes.contains(&id("st_b")));

        store.apply_node_changes(vec![NodeChange::Remove { id: id("st_b") }]);
        assert!(!store.graph.contains(id("st_b")));
        assert!(store.selection.nodes.is_empty());
    }

    #[test]
    fn duplicate_copies_internal_edges() {
        let mut store = store_with_two();
        store.connect(id("st_a"), id("st_b"), Handles::default());
        store.select_all();
        let copies = store.duplicate_selected();
        assert_eq!(copies.len(), 2);
        assert_eq!(store.graph.node_count(), 4);
        assert_eq!(store.graph.edge_count(), 2);
        let first = store.graph.get(copies[0]).unwrap();
        assert_eq!(first.position, Position::new(20.0, 20.0));
    }
}
