//! Document analysis: segmentation, type detection, and quality scoring.

mod analyzer;
mod quality;

pub use analyzer::{AnalysisError, DocumentAnalyzer};
pub use quality::assess;
