//! Core diagram data model.
//!
//! A diagram is a set of placed nodes (components, text annotations, shapes,
//! groups) and a set of directed edges between them. Nodes live in an arena
//! (`StableDiGraph`) indexed by id; the arena's own edges are parent → child
//! containment links from a group to its members, so the parent/child
//! adjacency is explicit and never dangles. Connection edges are kept
//! separately in `DiagramGraph::edges`.
//!
//! A node's `position` is relative to its parent group's origin when it has
//! one, absolute otherwise.

use crate::id::{EdgeId, NodeId};
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::{Add, Sub};

// ─── Coordinates ─────────────────────────────────────────────────────────

/// A 2D canvas coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Width and height of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Pan offset and zoom of the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

// ─── Node payloads ───────────────────────────────────────────────────────

/// The four kinds of placed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// An infrastructure component from the catalog (load balancer, cache…).
    Component,
    /// A free-standing text annotation.
    Text,
    /// A container whose children are positioned relative to it.
    Group,
    /// A plain drawn shape.
    Shape,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Component => "component",
            NodeKind::Text => "text",
            NodeKind::Group => "group",
            NodeKind::Shape => "shape",
        }
    }
}

/// Outline drawn by a shape node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Ellipse,
    Diamond,
    Cylinder,
}

/// Data carried by a component node: which catalog entry it places and how
/// the user configured it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentData {
    /// Catalog entry reference, e.g. `"redis-cache"`.
    pub component_id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Free-form configuration options (replicas, region, eviction policy…).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextData {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeData {
    #[serde(default)]
    pub shape: ShapeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Kind-specific node data. Serializes as the bare payload object; the kind
/// travels next to it (`type` in the document), so decoding goes through
/// [`NodeData::from_value`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeData {
    Component(ComponentData),
    Text(TextData),
    Group(GroupData),
    Shape(ShapeData),
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Component(_) => NodeKind::Component,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Group(_) => NodeKind::Group,
            NodeData::Shape(_) => NodeKind::Shape,
        }
    }

    /// Decode a payload object for the given kind.
    pub fn from_value(kind: NodeKind, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            NodeKind::Component => NodeData::Component(serde_json::from_value(value)?),
            NodeKind::Text => NodeData::Text(serde_json::from_value(value)?),
            NodeKind::Group => NodeData::Group(serde_json::from_value(value)?),
            NodeKind::Shape => NodeData::Shape(serde_json::from_value(value)?),
        })
    }

    /// Shallow-merge `patch` into this payload, keeping the kind.
    /// Fails if the merged object no longer decodes for this kind.
    pub fn merged(&self, patch: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let mut object = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in patch {
            object.insert(key.clone(), value.clone());
        }
        NodeData::from_value(self.kind(), Value::Object(object))
    }
}

// ─── Nodes ───────────────────────────────────────────────────────────────

/// A placed diagram element.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub data: NodeData,
    /// Parent-relative when the node sits in a group.
    pub position: Position,
    /// Declared for groups and shapes, measured by the canvas for the rest.
    pub size: Option<Dimensions>,
}

impl Node {
    pub fn new(id: NodeId, data: NodeData, position: Position) -> Self {
        Self {
            id,
            data,
            position,
            size: None,
        }
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.size = Some(Dimensions::new(width, height));
        self
    }

    pub fn component(id: NodeId, component_id: &str, label: &str, position: Position) -> Self {
        Self::new(
            id,
            NodeData::Component(ComponentData {
                component_id: component_id.to_string(),
                label: label.to_string(),
                icon: None,
                config: BTreeMap::new(),
            }),
            position,
        )
    }

    pub fn text(id: NodeId, text: &str, position: Position) -> Self {
        Self::new(
            id,
            NodeData::Text(TextData {
                text: text.to_string(),
                font_size: None,
            }),
            position,
        )
    }

    pub fn group(id: NodeId, position: Position, size: Dimensions) -> Self {
        let mut node = Self::new(id, NodeData::Group(GroupData::default()), position);
        node.size = Some(size);
        node
    }

    pub fn shape(id: NodeId, shape: ShapeKind, position: Position, size: Dimensions) -> Self {
        let mut node = Self::new(
            id,
            NodeData::Shape(ShapeData {
                shape,
                label: None,
                color: None,
            }),
            position,
        );
        node.size = Some(size);
        node
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    pub fn is_group(&self) -> bool {
        matches!(self.data, NodeData::Group(_))
    }
}

// ─── Edges (connections between nodes) ───────────────────────────────────

/// How the edge path is drawn between its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeCurve {
    #[default]
    Default,
    Straight,
    Step,
    SmoothStep,
}

/// Visual stroke of an edge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    /// Dashed vs solid.
    #[serde(default)]
    pub dashed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
}

/// Named connection points on the source and target boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Handles {
    pub source: Option<String>,
    pub target: Option<String>,
}

impl Handles {
    pub fn new(source: Option<&str>, target: Option<&str>) -> Self {
        Self {
            source: source.map(str::to_string),
            target: target.map(str::to_string),
        }
    }
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", default)]
    pub curve: EdgeCurve,
    #[serde(default)]
    pub animated: bool,
    #[serde(default)]
    pub style: EdgeStyle,
}

impl Edge {
    pub fn new(id: EdgeId, source: NodeId, target: NodeId) -> Self {
        Self {
            id,
            source,
            target,
            source_handle: None,
            target_handle: None,
            label: None,
            curve: EdgeCurve::default(),
            animated: false,
            style: EdgeStyle::default(),
        }
    }

    pub fn with_handles(mut self, handles: Handles) -> Self {
        self.source_handle = handles.source;
        self.target_handle = handles.target;
        self
    }

    /// Same endpoints and same handles.
    pub fn same_connection(&self, other: &Edge) -> bool {
        self.source == other.source
            && self.target == other.target
            && self.source_handle == other.source_handle
            && self.target_handle == other.target_handle
    }

    pub fn touches(&self, id: NodeId) -> bool {
        self.source == id || self.target == id
    }
}

// ─── Diagram graph ───────────────────────────────────────────────────────

/// The complete diagram: node arena, containment links, and connections.
///
/// Every mutation keeps three invariants:
/// - a containment parent is always an existing group node,
/// - no connection references a missing node or loops on one node,
/// - removing a group detaches (never deletes) its children.
#[derive(Debug, Clone, Default)]
pub struct DiagramGraph {
    /// Node arena; arena edges go parent → child.
    pub graph: StableDiGraph<Node, ()>,

    /// Index from NodeId → NodeIndex for fast lookup.
    pub id_index: HashMap<NodeId, NodeIndex>,

    /// Connections between nodes.
    pub edges: Vec<Edge>,

    /// Insertion order of nodes (the arena reuses vacant slots).
    order: Vec<NodeId>,
}

impl DiagramGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty() && self.edges.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.id_index.contains_key(&id)
    }

    pub fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.id_index.get(&id).map(|idx| &self.graph[*idx])
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.id_index
            .get(&id)
            .copied()
            .map(|idx| &mut self.graph[idx])
    }

    /// Node ids in insertion order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.order.iter().filter_map(|id| self.get(*id))
    }

    fn parent_index(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .next()
    }

    /// The group a node sits in, if any.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.index_of(id)
            .and_then(|idx| self.parent_index(idx))
            .map(|pidx| self.graph[pidx].id)
    }

    /// Direct children of a group, in insertion order.
    pub fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        let Some(idx) = self.index_of(id) else {
            return Vec::new();
        };
        let children: HashSet<NodeId> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|c| self.graph[c].id)
            .collect();
        self.order
            .iter()
            .copied()
            .filter(|n| children.contains(n))
            .collect()
    }

    /// Node ids with every parent before its children; siblings keep
    /// insertion order.
    pub fn paint_order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.order.len());
        for &id in &self.order {
            if self.parent_of(id).is_none() {
                self.push_subtree(id, &mut out);
            }
        }
        out
    }

    fn push_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        for child in self.children_of(id) {
            self.push_subtree(child, out);
        }
    }

    /// Whether `ancestor` encloses `descendant` (directly or transitively).
    pub fn is_ancestor_of(&self, ancestor: NodeId, descendant: NodeId) -> bool {
        let mut current = self.parent_of(descendant);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent_of(p);
        }
        false
    }

    /// Position in canvas coordinates, resolving the parent chain.
    pub fn absolute_position(&self, id: NodeId) -> Option<Position> {
        let mut idx = self.index_of(id)?;
        let mut pos = self.graph[idx].position;
        while let Some(pidx) = self.parent_index(idx) {
            pos = pos + self.graph[pidx].position;
            idx = pidx;
        }
        Some(pos)
    }

    /// Insert a node, optionally inside a group. Returns `false` (and leaves
    /// the graph untouched) when the id is already present. A parent that is
    /// missing or not a group is ignored and the node is placed at top level.
    pub fn add_node(&mut self, node: Node, parent: Option<NodeId>) -> bool {
        let id = node.id;
        if self.contains(id) {
            log::debug!("add_node: {id} already exists");
            return false;
        }
        let parent_idx = parent.and_then(|p| match self.get(p) {
            Some(pnode) if pnode.is_group() => self.index_of(p),
            _ => {
                log::debug!("add_node: parent {p} is not a group, placing {id} at top level");
                None
            }
        });
        let idx = self.graph.add_node(node);
        if let Some(pidx) = parent_idx {
            self.graph.add_edge(pidx, idx, ());
        }
        self.id_index.insert(id, idx);
        self.order.push(id);
        true
    }

    /// Move a node under another group (or to top level) without touching
    /// its stored position. Rejects non-group parents and cycles.
    pub fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let new_parent = match parent {
            Some(p) => {
                let valid = p != id
                    && self.get(p).is_some_and(Node::is_group)
                    && !self.is_ancestor_of(id, p);
                if !valid {
                    return false;
                }
                self.index_of(p)
            }
            None => None,
        };
        if let Some(old) = self.parent_index(idx)
            && let Some(edge) = self.graph.find_edge(old, idx)
        {
            self.graph.remove_edge(edge);
        }
        if let Some(pidx) = new_parent {
            self.graph.add_edge(pidx, idx, ());
        }
        true
    }

    /// Remove a node. Its connections are removed with it; its children are
    /// detached into its own parent frame with positions translated so they
    /// stay where they were on the canvas.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let idx = self.index_of(id)?;
        let offset = self.graph[idx].position;
        let grandparent = self.parent_index(idx);
        let children: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        for child in children {
            if let Some(edge) = self.graph.find_edge(idx, child) {
                self.graph.remove_edge(edge);
            }
            if let Some(gp) = grandparent {
                self.graph.add_edge(gp, child, ());
            }
            let node = &mut self.graph[child];
            node.position = node.position + offset;
        }
        self.edges.retain(|e| !e.touches(id));
        self.order.retain(|n| *n != id);
        self.id_index.remove(&id);
        self.graph.remove_node(idx)
    }

    pub fn get_edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn get_edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.id == id)
    }

    /// Append a connection. Rejects self-loops, missing endpoints, and
    /// duplicate edge ids.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        if edge.source == edge.target {
            log::debug!("add_edge: self-loop on {} rejected", edge.source);
            return false;
        }
        if !self.contains(edge.source) || !self.contains(edge.target) {
            log::debug!("add_edge: {} has a missing endpoint", edge.id);
            return false;
        }
        if self.get_edge(edge.id).is_some() {
            log::debug!("add_edge: {} already exists", edge.id);
            return false;
        }
        self.edges.push(edge);
        true
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let pos = self.edges.iter().position(|e| e.id == id)?;
        Some(self.edges.remove(pos))
    }

    /// Connections with `id` as source or target.
    pub fn edges_touching(&self, id: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.touches(id))
    }

    /// Full equality: same nodes (all fields), same parents, same edges.
    pub fn content_eq(&self, other: &DiagramGraph) -> bool {
        self.node_count() == other.node_count()
            && self.edge_count() == other.edge_count()
            && self.nodes().all(|n| {
                other.get(n.id) == Some(n) && self.parent_of(n.id) == other.parent_of(n.id)
            })
            && self
                .edges
                .iter()
                .all(|e| other.get_edge(e.id) == Some(e))
    }
}
