//! Hit testing: canvas point → node lookup.
//!
//! Walks the graph front-to-back (reverse paint order, so children before
//! their group) over absolute bounds.

use ac_core::geometry::absolute_bounds;
use ac_core::id::NodeId;
use ac_core::model::DiagramGraph;
use ac_core::{Point, Rect};

/// Find the topmost node at `point`, or `None` for the background.
pub fn hit_test(graph: &DiagramGraph, point: Point) -> Option<NodeId> {
    graph.paint_order().into_iter().rev().find(|&id| {
        absolute_bounds(graph, id).is_some_and(|b| {
            point.x >= b.x0 && point.x <= b.x1 && point.y >= b.y0 && point.y <= b.y1
        })
    })
}

/// All nodes whose bounds touch `rect`, in paint order. Used for marquee
/// selection and eraser sweeps.
pub fn hit_test_rect(graph: &DiagramGraph, rect: Rect) -> Vec<NodeId> {
    let rect = rect.abs();
    graph
        .paint_order()
        .into_iter()
        .filter(|&id| {
            absolute_bounds(graph, id).is_some_and(|b| {
                b.x0 <= rect.x1 && b.x1 >= rect.x0 && b.y0 <= rect.y1 && b.y1 >= rect.y0
            })
        })
        .collect()
}
