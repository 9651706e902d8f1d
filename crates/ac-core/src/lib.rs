pub mod document;
pub mod geometry;
pub mod id;
pub mod lint;
pub mod model;
pub mod submission;

pub use document::{DiagramDocument, ImportError, NodeRecord, export_document, import_document};
pub use id::{EdgeId, NodeId};
pub use lint::{LintDiagnostic, LintSeverity, lint_document};
pub use model::*;
pub use submission::{EncodeError, SubmissionPayload, encode_submission};

// Re-export kurbo geometry so downstream crates don't need a direct dependency
pub use kurbo::{Point, Rect};
