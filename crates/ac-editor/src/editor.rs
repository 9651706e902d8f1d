//! Editor facade: store + history + autosave + submission gate.
//!
//! Every user-facing edit goes through [`Editor`], which snapshots the graph,
//! runs the store operation, lets the history tracker decide whether the
//! edit is worth an undo entry, and queues an autosave when anything changed.
//!
//! - **Discrete edits** (add, connect, group, delete…) are compared with the
//!   position-blind equivalence filter, so a node nudged by a layout pass
//!   does not flood the undo stack.
//! - **Gestures** (canvas deltas with `dragging`/`resizing` set) are batched:
//!   the first `true` frame opens a batch, the closing `false` frame commits
//!   one entry that restores the exact pre-gesture positions.

use crate::changes::{EdgeChange, NodeChange};
use crate::config::EditorConfig;
use crate::guides::{Snap, snap_to_guides};
use crate::hit::{hit_test, hit_test_rect};
use crate::history::History;
use crate::persistence::{AutoSaver, StorageBackend, StorageResult, StorageScope};
use crate::shortcuts::ShortcutAction;
use crate::store::{DiagramStore, EdgePatch, Selection};
use crate::submit::{SubmissionGate, SubmissionGuard, SubmitError};
use crate::tools::ToolKind;
use ac_core::document::{ImportError, export_document, import_document};
use ac_core::geometry::absolute_bounds;
use ac_core::id::{EdgeId, NodeId};
use ac_core::model::*;
use ac_core::submission::{SubmissionPayload, encode_submission};
use ac_core::{Point, Rect};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;

/// One editing session: the store plus undo/redo, autosave and the
/// submission gate. Every user-facing edit goes through here so it is
/// recorded and saved.
pub struct Editor {
    store: DiagramStore,
    history: History,
    config: EditorConfig,
    autosave: Option<AutoSaver>,
    submissions: SubmissionGate,
    /// A drag/resize gesture batch is open.
    gesture: bool,
}

impl Editor {
    /// An empty editor with no persistence.
    pub fn new(config: EditorConfig) -> Self {
        Self {
            store: DiagramStore::new(&config),
            history: History::new(config.history_limit),
            config,
            autosave: None,
            submissions: SubmissionGate::default(),
            gesture: false,
        }
    }

    /// An editor bound to a storage slot. The stored draft is restored if
    /// there is one; a draft that fails to load or validate is logged and
    /// ignored, leaving an empty canvas.
    pub fn with_autosave(
        config: EditorConfig,
        backend: Arc<dyn StorageBackend>,
        scope: StorageScope,
    ) -> Self {
        let saver = AutoSaver::new(backend, &scope, config.autosave_debounce());
        let mut editor = Self::new(config);
        match saver.load() {
            Ok(Some(text)) => match import_document(&text) {
                Ok((graph, viewport)) => {
                    log::info!(
                        "restored {} nodes and {} edges from {}",
                        graph.node_count(),
                        graph.edge_count(),
                        saver.key()
                    );
                    editor.store.replace(graph, viewport);
                }
                Err(e) => log::warn!("ignoring stored draft {}: {e}", saver.key()),
            },
            Ok(None) => log::debug!("no stored draft under {}", saver.key()),
            Err(e) => log::warn!(
                "could not read {} from {}: {e}",
                saver.key(),
                saver.backend().name()
            ),
        }
        editor.autosave = Some(saver);
        editor
    }

    // ─── Read access ─────────────────────────────────────────────────────

    pub fn graph(&self) -> &DiagramGraph {
        &self.store.graph
    }

    pub fn selection(&self) -> &Selection {
        &self.store.selection
    }

    pub fn viewport(&self) -> Viewport {
        self.store.viewport
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn tool(&self) -> ToolKind {
        self.store.tool()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Number of undoable steps.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    // ─── Tracked edits ───────────────────────────────────────────────────

    /// Run `op` against the store, record history, and queue an autosave
    /// if the graph changed.
    fn track<R>(&mut self, description: &str, op: impl FnOnce(&mut DiagramStore) -> R) -> R {
        let before = self.store.graph.clone();
        let result = op(&mut self.store);
        let changed = !before.content_eq(&self.store.graph);
        if self.history.record(before, &self.store.graph, description) {
            log::debug!("history: committed `{description}`");
        }
        if changed {
            self.queue_autosave();
        }
        result
    }

    pub fn add_node(&mut self, node: Node, parent: Option<NodeId>) -> bool {
        self.track("add node", |s| s.add_node(node, parent))
    }

    pub fn update_node_properties(&mut self, id: NodeId, patch: &Map<String, Value>) -> bool {
        self.track("edit properties", |s| s.update_node_properties(id, patch))
    }

    pub fn connect(&mut self, source: NodeId, target: NodeId, handles: Handles) -> Option<EdgeId> {
        self.track("connect", |s| s.connect(source, target, handles))
    }

    pub fn update_edge(&mut self, id: EdgeId, patch: EdgePatch) -> bool {
        self.track("edit connection", |s| s.update_edge(id, patch))
    }

    pub fn delete_selected(&mut self) -> bool {
        self.track("delete", DiagramStore::delete_selected)
    }

    /// Eraser: remove the given nodes.
    pub fn erase(&mut self, ids: &[NodeId]) -> usize {
        self.track("erase", |s| s.delete_nodes(ids))
    }

    /// Eraser sweep: remove every node touching `rect`.
    pub fn erase_in(&mut self, rect: Rect) -> usize {
        let ids = hit_test_rect(&self.store.graph, rect);
        self.erase(&ids)
    }

    pub fn group(&mut self, ids: &[NodeId]) -> Option<NodeId> {
        self.track("group", |s| s.group(ids))
    }

    pub fn group_selected(&mut self) -> Option<NodeId> {
        self.track("group", DiagramStore::group_selected)
    }

    pub fn ungroup(&mut self, ids: &[NodeId]) -> usize {
        self.track("ungroup", |s| s.ungroup(ids))
    }

    pub fn ungroup_selected(&mut self) -> usize {
        self.track("ungroup", DiagramStore::ungroup_selected)
    }

    pub fn duplicate_selected(&mut self) -> Vec<NodeId> {
        self.track("duplicate", DiagramStore::duplicate_selected)
    }

    /// Remove everything.
    pub fn clear(&mut self) -> bool {
        self.track("clear", DiagramStore::clear)
    }

    // ─── Canvas deltas ───────────────────────────────────────────────────

    /// Apply a batch of node deltas from the canvas. A `dragging`/`resizing`
    /// frame opens a gesture; the closing frame commits it.
    pub fn apply_node_changes(&mut self, changes: Vec<NodeChange>) -> bool {
        let opens = changes.iter().any(|c| c.interaction() == Some(true));
        let closes = changes.iter().any(|c| c.interaction() == Some(false));
        if opens && !self.gesture {
            let description = match changes.iter().find(|c| c.interaction().is_some()) {
                Some(NodeChange::Dimensions { .. }) => "resize",
                _ => "move",
            };
            self.history.begin_batch(&self.store.graph, description);
            self.gesture = true;
        }
        let changed = self.track("edit nodes", |s| s.apply_node_changes(changes));
        if closes && self.gesture {
            self.gesture = false;
            if self.history.end_batch(&self.store.graph) {
                log::debug!("history: gesture committed");
            }
        }
        changed
    }

    pub fn apply_edge_changes(&mut self, changes: Vec<EdgeChange>) -> bool {
        self.track("edit connections", |s| s.apply_edge_changes(changes))
    }

    /// Open an explicit batch: every edit until [`end_batch`](Self::end_batch)
    /// becomes one undo step.
    pub fn begin_batch(&mut self, description: &str) {
        self.history.begin_batch(&self.store.graph, description);
    }

    pub fn end_batch(&mut self) -> bool {
        self.history.end_batch(&self.store.graph)
    }

    // ─── History ─────────────────────────────────────────────────────────

    pub fn undo(&mut self) -> Option<String> {
        self.gesture = false;
        let description = self.history.undo(&mut self.store.graph)?;
        self.store.prune_selection();
        self.queue_autosave();
        Some(description)
    }

    pub fn redo(&mut self) -> Option<String> {
        self.gesture = false;
        let description = self.history.redo(&mut self.store.graph)?;
        self.store.prune_selection();
        self.queue_autosave();
        Some(description)
    }

    // ─── Selection, tool, viewport ───────────────────────────────────────

    pub fn select(&mut self, ids: &[NodeId]) {
        self.store.select(ids);
    }

    pub fn select_all(&mut self) {
        self.store.select_all();
    }

    pub fn clear_selection(&mut self) {
        self.store.clear_selection();
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.store.set_tool(tool);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if self.store.viewport != viewport {
            self.store.set_viewport(viewport);
            self.queue_autosave();
        }
    }

    // ─── Canvas queries ──────────────────────────────────────────────────

    /// Topmost node under a canvas point.
    pub fn node_at(&self, point: Point) -> Option<NodeId> {
        hit_test(&self.store.graph, point)
    }

    /// Alignment snap for `id` dragged to the absolute position `proposed`.
    pub fn snap(&self, id: NodeId, proposed: Position) -> Option<Snap> {
        let bounds = absolute_bounds(&self.store.graph, id)?;
        let rect = Rect::new(
            proposed.x,
            proposed.y,
            proposed.x + bounds.width(),
            proposed.y + bounds.height(),
        );
        Some(snap_to_guides(
            &self.store.graph,
            id,
            rect,
            self.config.snap_threshold,
        ))
    }

    // ─── Export / import ─────────────────────────────────────────────────

    pub fn export(&self) -> Result<String, serde_json::Error> {
        export_document(&self.store.graph, self.store.viewport)
    }

    /// Replace the diagram with an imported document. On error nothing
    /// changes. A successful import is one undo step.
    pub fn import(&mut self, text: &str) -> Result<(), ImportError> {
        let (graph, viewport) = import_document(text)?;
        log::info!(
            "imported {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        self.track("import", |s| s.replace(graph, viewport));
        // Viewport-only differences still need saving.
        self.queue_autosave();
        Ok(())
    }

    // ─── Autosave ────────────────────────────────────────────────────────

    fn queue_autosave(&mut self) {
        let Some(saver) = self.autosave.as_mut() else {
            return;
        };
        match export_document(&self.store.graph, self.store.viewport) {
            Ok(text) => saver.notify_at(Instant::now(), text),
            Err(e) => log::warn!("autosave: could not serialize diagram: {e}"),
        }
    }

    /// Drive the autosave debounce. Returns whether a write happened.
    pub fn tick_at(&mut self, now: Instant) -> StorageResult<bool> {
        match self.autosave.as_mut() {
            Some(saver) => saver.tick_at(now),
            None => Ok(false),
        }
    }

    /// Write any pending autosave immediately.
    pub fn flush(&mut self) -> StorageResult<bool> {
        match self.autosave.as_mut() {
            Some(saver) => saver.flush(),
            None => Ok(false),
        }
    }

    pub fn has_pending_save(&self) -> bool {
        self.autosave.as_ref().is_some_and(AutoSaver::has_pending)
    }

    // ─── Submission ──────────────────────────────────────────────────────

    /// Encode the diagram for submission. The returned guard keeps further
    /// submissions out until it is dropped; the graph is never touched.
    pub fn prepare_submission(
        &self,
        submitted_at: OffsetDateTime,
    ) -> Result<(SubmissionGuard, SubmissionPayload), SubmitError> {
        let guard = self.submissions.acquire()?;
        let payload = encode_submission(&self.store.graph, self.store.viewport, submitted_at)?;
        log::info!(
            "submission prepared: {} components, {} connections",
            payload.metadata.component_count,
            payload.metadata.connection_count
        );
        Ok((guard, payload))
    }

    pub fn is_submitting(&self) -> bool {
        self.submissions.is_busy()
    }

    // ─── Shortcuts ───────────────────────────────────────────────────────

    /// Dispatch a resolved shortcut. Returns whether it did anything.
    pub fn run_shortcut(&mut self, action: ShortcutAction) -> bool {
        match action {
            ShortcutAction::ToolSelect => self.switch_tool(ToolKind::Select),
            ShortcutAction::ToolPan => self.switch_tool(ToolKind::Pan),
            ShortcutAction::ToolText => self.switch_tool(ToolKind::Text),
            ShortcutAction::ToolShape => self.switch_tool(ToolKind::Shape(ShapeKind::default())),
            ShortcutAction::ToolEraser => self.switch_tool(ToolKind::Eraser),
            ShortcutAction::ToggleLastTool => {
                self.store.toggle_last_tool();
                true
            }
            ShortcutAction::Undo => self.undo().is_some(),
            ShortcutAction::Redo => self.redo().is_some(),
            ShortcutAction::Delete => self.delete_selected(),
            ShortcutAction::SelectAll => {
                self.select_all();
                true
            }
            ShortcutAction::Duplicate => !self.duplicate_selected().is_empty(),
            ShortcutAction::Group => self.group_selected().is_some(),
            ShortcutAction::Ungroup => self.ungroup_selected() > 0,
            ShortcutAction::Deselect => {
                let had = !self.store.selection.is_empty();
                self.clear_selection();
                had
            }
        }
    }

    fn switch_tool(&mut self, tool: ToolKind) -> bool {
        let changed = self.store.tool() != tool;
        self.store.set_tool(tool);
        changed
    }
}
