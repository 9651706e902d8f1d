pub mod changes;
pub mod config;
pub mod editor;
pub mod guides;
pub mod history;
pub mod hit;
pub mod persistence;
pub mod shortcuts;
pub mod store;
pub mod submit;
pub mod tools;

pub use changes::{EdgeChange, NodeChange};
pub use config::EditorConfig;
pub use editor::Editor;
pub use history::{History, snapshots_equivalent};
pub use persistence::{
    AutoSaver, FileStorage, MemoryStorage, StorageBackend, StorageError, StorageResult,
    StorageScope,
};
pub use shortcuts::{ShortcutAction, ShortcutMap};
pub use store::{DiagramStore, EdgePatch, Selection};
pub use submit::{SubmissionGuard, SubmitError};
pub use tools::ToolKind;
