//! Active canvas tool.
//!
//! The tool decides how the canvas interprets pointer input; the store only
//! remembers which one is active and which was active before it.

use ac_core::model::{NodeKind, ShapeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolKind {
    /// Pick, drag, and connect nodes.
    #[default]
    Select,
    /// Pan the viewport; nodes are not draggable.
    Pan,
    /// Click to place a text annotation.
    Text,
    /// Drag out a shape.
    Shape(ShapeKind),
    /// Sweep over nodes and edges to delete them.
    Eraser,
}

impl ToolKind {
    /// Whether nodes follow the pointer while this tool is active.
    pub fn drags_nodes(&self) -> bool {
        matches!(self, ToolKind::Select)
    }

    /// The kind of node a click with this tool creates, if any.
    pub fn creates(&self) -> Option<NodeKind> {
        match self {
            ToolKind::Text => Some(NodeKind::Text),
            ToolKind::Shape(_) => Some(NodeKind::Shape),
            _ => None,
        }
    }
}

/// Active tool plus the one before it, for quick toggling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToolState {
    active: ToolKind,
    previous: ToolKind,
}

impl ToolState {
    pub fn active(&self) -> ToolKind {
        self.active
    }

    pub fn set(&mut self, tool: ToolKind) {
        if tool != self.active {
            self.previous = self.active;
            self.active = tool;
        }
    }

    /// Swap back to the previously active tool.
    pub fn toggle_last(&mut self) {
        std::mem::swap(&mut self.active, &mut self.previous);
    }
}
