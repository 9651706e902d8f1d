//! Editor tuning knobs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings shared by the store, history, and autosave.
///
/// Every field has a default, so a partial JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum undo depth; the oldest entry is evicted beyond it.
    pub history_limit: usize,
    /// Space between a new group's border and its members.
    pub group_padding: f64,
    /// Offset applied to duplicated nodes.
    pub duplicate_offset: f64,
    /// Distance within which a dragged node snaps to an alignment guide.
    pub snap_threshold: f64,
    /// Quiet period before an autosave write.
    pub autosave_debounce_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
            group_padding: 20.0,
            duplicate_offset: 20.0,
            snap_threshold: 5.0,
            autosave_debounce_ms: 1000,
        }
    }
}

impl EditorConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}
