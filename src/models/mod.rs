//! Data models for docmeta.

mod document;
mod extraction;
mod field;
mod report;

pub use document::{
    Document, DocumentError, DocumentProfile, DocumentType, QualityMetrics, SegmentRole,
    TextSegment,
};
pub use extraction::{
    ExtractionAttempt, ExtractionTask, FailureReason, FieldResult, Mode, Priority, Resolution,
};
pub use field::{FieldExample, FieldKind, FieldSpec, BUILTIN_FIELDS};
pub use report::ExtractionReport;
