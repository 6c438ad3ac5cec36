//! Document models for metadata extraction runs.
//!
//! A `Document` is the immutable input to a run: OCR-corrected text plus a
//! source identifier. The text is content-addressed with SHA-256 so runs and
//! feedback records can refer to the exact input they saw.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Error raised when constructing a document from unusable input.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document text is empty or whitespace-only")]
    EmptyText,
}

/// Immutable corrected text plus source identity. Created once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Identifier of the source (filename stem, collection id, etc.).
    pub source_id: String,
    /// OCR-corrected plain text (UTF-8).
    pub text: String,
    /// SHA-256 hash of the text content.
    pub content_hash: String,
    /// When this document entered the pipeline.
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Compute SHA-256 hash of text content.
    pub fn compute_hash(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Create a new document. Fails on empty or whitespace-only text.
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Result<Self, DocumentError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(DocumentError::EmptyText);
        }
        Ok(Self {
            source_id: source_id.into(),
            content_hash: Self::compute_hash(&text),
            text,
            created_at: Utc::now(),
        })
    }
}

/// Coarse document category, estimated from lexical signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Letter,
    Newsletter,
    Report,
    Article,
    Unknown,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Letter => "letter",
            Self::Newsletter => "newsletter",
            Self::Report => "report",
            Self::Article => "article",
            Self::Unknown => "unknown",
        }
    }
}

/// Role a text segment plays in the document's structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentRole {
    Header,
    Title,
    Date,
    Body,
    Signature,
    Metadata,
    Unknown,
}

impl SegmentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Title => "title",
            Self::Date => "date",
            Self::Body => "body",
            Self::Signature => "signature",
            Self::Metadata => "metadata",
            Self::Unknown => "unknown",
        }
    }
}

/// One classified span of document text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextSegment {
    /// Trimmed line content.
    pub content: String,
    /// Structural role assigned by the analyzer.
    pub role: SegmentRole,
    /// Classification confidence in [0,1].
    pub confidence: f64,
    /// Zero-based line number in the source text.
    pub line_number: usize,
}

/// Quality metrics for OCR-corrected text, each in [0,1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Character-level clarity (alpha/space/punctuation ratios).
    pub text_clarity: f64,
    /// Line-length regularity.
    pub structure_clarity: f64,
    /// Presence of expected document elements.
    pub completeness: f64,
    /// Weighted combination of the above.
    pub overall: f64,
}

/// Derived structural/quality profile of a document.
///
/// Computed once per run by the analyzer and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentProfile {
    /// Estimated document category.
    pub doc_type: DocumentType,
    /// Confidence in the category estimate, in [0,1].
    pub type_confidence: f64,
    /// OCR-quality metrics.
    pub quality: QualityMetrics,
    /// Ordered role-labeled segments.
    pub segments: Vec<TextSegment>,
    /// Total non-empty lines in the source text.
    pub total_lines: usize,
}

impl DocumentProfile {
    /// All segments with the given role, in document order.
    pub fn segments_with_role(&self, role: SegmentRole) -> impl Iterator<Item = &TextSegment> {
        self.segments.iter().filter(move |s| s.role == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_text() {
        assert!(matches!(
            Document::new("doc", ""),
            Err(DocumentError::EmptyText)
        ));
        assert!(matches!(
            Document::new("doc", "   \n\t  "),
            Err(DocumentError::EmptyText)
        ));
    }

    #[test]
    fn hashes_content() {
        let a = Document::new("a", "same text").unwrap();
        let b = Document::new("b", "same text").unwrap();
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(
            a.content_hash,
            Document::new("c", "other text").unwrap().content_hash
        );
    }
}
