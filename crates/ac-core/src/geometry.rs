//! Canvas-space geometry over the diagram: absolute node bounds and
//! bounding boxes. Nodes without a size are treated as points.

use crate::id::NodeId;
use crate::model::{Dimensions, DiagramGraph, Position};
use kurbo::{Point, Rect};

impl From<Position> for Point {
    fn from(p: Position) -> Point {
        Point::new(p.x, p.y)
    }
}

impl From<Point> for Position {
    fn from(p: Point) -> Position {
        Position::new(p.x, p.y)
    }
}

/// The canvas-space rectangle a node occupies.
pub fn absolute_bounds(graph: &DiagramGraph, id: NodeId) -> Option<Rect> {
    let origin = graph.absolute_position(id)?;
    let size = graph
        .get(id)?
        .size
        .unwrap_or(Dimensions::new(0.0, 0.0));
    Some(Rect::from_origin_size(
        Point::from(origin),
        (size.width, size.height),
    ))
}

/// Union of the absolute bounds of `ids`; unknown ids are skipped.
pub fn bounding_box(graph: &DiagramGraph, ids: &[NodeId]) -> Option<Rect> {
    ids.iter()
        .filter_map(|id| absolute_bounds(graph, *id))
        .reduce(|acc, r| acc.union(r))
}

/// Bounding box grown by `padding` on every side.
pub fn padded_bounding_box(graph: &DiagramGraph, ids: &[NodeId], padding: f64) -> Option<Rect> {
    bounding_box(graph, ids).map(|r| r.inflate(padding, padding))
}
