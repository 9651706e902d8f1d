//! Alignment guides for dragged nodes.
//!
//! A dragged rectangle snaps when one of its vertical anchors (left,
//! centre, right) or horizontal anchors (top, middle, bottom) comes within
//! the snap threshold of the same kind of anchor on another node. The
//! closest candidate per axis wins; the guide lines that hold after snapping
//! are reported for the canvas to draw.

use ac_core::geometry::absolute_bounds;
use ac_core::id::NodeId;
use ac_core::Rect;
use ac_core::model::{DiagramGraph, Position};
use smallvec::SmallVec;

/// Orientation of a guide line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideAxis {
    /// A vertical line at `x = at`.
    Vertical,
    /// A horizontal line at `y = at`.
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Guide {
    pub axis: GuideAxis,
    pub at: f64,
}

/// Outcome of snapping one dragged rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct Snap {
    /// Absolute top-left after snapping.
    pub position: Position,
    pub guides: SmallVec<[Guide; 4]>,
}

const EPSILON: f64 = 1e-6;

fn x_anchors(r: &Rect) -> [f64; 3] {
    [r.x0, r.center().x, r.x1]
}

fn y_anchors(r: &Rect) -> [f64; 3] {
    [r.y0, r.center().y, r.y1]
}

/// Smallest correction that aligns any of `moving` with any of `fixed`,
/// if one is within `threshold`.
fn best_delta(moving: &[f64; 3], targets: &[[f64; 3]], threshold: f64) -> Option<f64> {
    let mut best: Option<f64> = None;
    for fixed in targets {
        for (m, f) in moving.iter().zip(fixed) {
            let delta = f - m;
            if delta.abs() <= threshold && best.is_none_or(|b| delta.abs() < b.abs()) {
                best = Some(delta);
            }
        }
    }
    best
}

/// Snap `proposed` (absolute bounds of `moving` at its drag position)
/// against every node that is neither `moving` nor inside it.
pub fn snap_to_guides(graph: &DiagramGraph, moving: NodeId, proposed: Rect, threshold: f64) -> Snap {
    let others: Vec<Rect> = graph
        .node_ids()
        .iter()
        .filter(|&&id| id != moving && !graph.is_ancestor_of(moving, id))
        .filter_map(|&id| absolute_bounds(graph, id))
        .collect();
    let xs: Vec<[f64; 3]> = others.iter().map(x_anchors).collect();
    let ys: Vec<[f64; 3]> = others.iter().map(y_anchors).collect();

    let dx = best_delta(&x_anchors(&proposed), &xs, threshold).unwrap_or(0.0);
    let dy = best_delta(&y_anchors(&proposed), &ys, threshold).unwrap_or(0.0);
    let snapped = Rect::new(
        proposed.x0 + dx,
        proposed.y0 + dy,
        proposed.x1 + dx,
        proposed.y1 + dy,
    );

    let mut guides: SmallVec<[Guide; 4]> = SmallVec::new();
    let mut push = |axis: GuideAxis, at: f64| {
        if !guides
            .iter()
            .any(|g| g.axis == axis && (g.at - at).abs() < EPSILON)
        {
            guides.push(Guide { axis, at });
        }
    };
    for fixed in &xs {
        for (m, f) in x_anchors(&snapped).iter().zip(fixed) {
            if (m - f).abs() < EPSILON {
                push(GuideAxis::Vertical, *f);
            }
        }
    }
    for fixed in &ys {
        for (m, f) in y_anchors(&snapped).iter().zip(fixed) {
            if (m - f).abs() < EPSILON {
                push(GuideAxis::Horizontal, *f);
            }
        }
    }

    Snap {
        position: Position::new(snapped.x0, snapped.y0),
        guides,
    }
}
