//! Document structure analysis and segmentation.
//!
//! The analyzer is deterministic and purely lexical: it classifies lines into
//! structural roles, estimates a document type from pattern counts, and
//! scores OCR quality. Low-quality text lowers the quality score; it never
//! makes analysis fail. The only failure mode is empty input.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::quality;
use crate::models::{
    DocumentProfile, DocumentType, FieldKind, FieldSpec, SegmentRole, TextSegment,
};

/// Errors from document analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Input was empty or whitespace-only. Fatal before any backend call.
    #[error("document text is empty or whitespace-only")]
    EmptyText,
}

static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // MM/DD/YYYY, MM-DD-YY and friends
        r"\b\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4}\b",
        // YYYY/MM/DD
        r"\b\d{4}[/\-.]\d{1,2}[/\-.]\d{1,2}\b",
        // January 15, 1986 / Jan. 15 1986
        r"(?i)\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}\b",
        r"(?i)\b(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\.?\s+\d{1,2},?\s+\d{4}\b",
        // 6 January 1986
        r"(?i)\b\d{1,2}\s+(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{4}\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("date pattern compiles"))
    .collect()
});

static TITLE_INDICATORS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // ALL CAPS title lines
        r"^[A-Z][A-Z\s]{5,50}$",
        // Title-case lines
        r"^[A-Z][a-zA-Z\s]{10,80}$",
        // Explicit subject markers
        r"(?i)^\s*(?:Re:|Subject:|Title:)\s*.+$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("title pattern compiles"))
    .collect()
});

static SIGNATURE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?:Sincerely|Best regards|Yours truly|Cordially|Respectfully)\b",
        r"(?i)\b(?:Signed|Signature)\s*:",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("signature pattern compiles"))
    .collect()
});

static METADATA_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?:Volume|Vol\.?)\s*\d+",
        r"(?i)\b(?:Issue|No\.?)\s*\d+",
        r"(?i)\b(?:Page|P\.?)\s*\d+",
        r"(?i)\b(?:Edition|Ed\.?)\s*\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("metadata pattern compiles"))
    .collect()
});

static LETTER_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bdear\b",
        r"\bsincerely\b",
        r"\byours\b",
        r"\bbest regards\b",
        r"\bfrom:",
        r"\bto:",
        r"\bsubject:",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("letter marker compiles"))
    .collect()
});

static NEWSLETTER_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bvolume\b",
        r"\bissue\b",
        r"\bnewsletter\b",
        r"\bpublication\b",
        r"\beditor\b",
        r"\barticles?\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("newsletter marker compiles"))
    .collect()
});

static REPORT_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\breport\b",
        r"\banalysis\b",
        r"\bfindings\b",
        r"\bconclusion\b",
        r"\bexecutive summary\b",
        r"\brecommendations?\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("report marker compiles"))
    .collect()
});

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("iso date pattern compiles"));

/// Minimum marker matches before a document type is assigned.
const TYPE_SCORE_THRESHOLD: usize = 2;

/// Lines of surrounding context pulled in around a matched segment.
const CONTEXT_LINES: usize = 2;

/// Structural/quality analysis of corrected document text.
#[derive(Debug, Default)]
pub struct DocumentAnalyzer;

impl DocumentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze text into a profile: segmentation, document type, and quality.
    ///
    /// Deterministic for a given input. Fails only on empty/whitespace text.
    pub fn analyze(&self, text: &str) -> Result<DocumentProfile, AnalysisError> {
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyText);
        }

        let segments = self.segment(text);
        let (doc_type, type_confidence) = self.detect_type(text);
        let quality = quality::assess(text);

        tracing::debug!(
            doc_type = doc_type.as_str(),
            quality = quality.overall,
            segments = segments.len(),
            "document analyzed"
        );

        Ok(DocumentProfile {
            doc_type,
            type_confidence,
            quality,
            total_lines: segments.len(),
            segments,
        })
    }

    /// Split text into classified line segments.
    fn segment(&self, text: &str) -> Vec<TextSegment> {
        let lines: Vec<&str> = text.lines().collect();
        let total = lines.len();

        lines
            .iter()
            .enumerate()
            .filter_map(|(i, raw)| {
                let line = raw.trim();
                if line.is_empty() {
                    return None;
                }
                let role = classify_line(line, i, total);
                Some(TextSegment {
                    content: line.to_string(),
                    role,
                    confidence: segment_confidence(line, role),
                    line_number: i,
                })
            })
            .collect()
    }

    /// Estimate the document type from marker counts. Requires at least
    /// `TYPE_SCORE_THRESHOLD` matches; otherwise the type stays unknown.
    fn detect_type(&self, text: &str) -> (DocumentType, f64) {
        let lowered = text.to_lowercase();
        let count = |patterns: &[Regex]| patterns.iter().filter(|p| p.is_match(&lowered)).count();

        let letter = count(&LETTER_MARKERS);
        let newsletter = count(&NEWSLETTER_MARKERS);
        let report = count(&REPORT_MARKERS);

        // First match wins on ties, so letters beat newsletters beat reports.
        let mut doc_type = DocumentType::Unknown;
        let mut score = 0;
        for (candidate, count) in [
            (DocumentType::Letter, letter),
            (DocumentType::Newsletter, newsletter),
            (DocumentType::Report, report),
        ] {
            if count > score {
                doc_type = candidate;
                score = count;
            }
        }

        if score >= TYPE_SCORE_THRESHOLD {
            let confidence = (0.5 + score as f64 * 0.1).min(0.9);
            (doc_type, confidence)
        } else {
            (DocumentType::Unknown, 0.5)
        }
    }

    /// Select the lines most relevant to one field, with surrounding context.
    ///
    /// Fields with no matching segments fall back to the regions where their
    /// values usually live (titles and dates near the top, signatures at the
    /// bottom).
    pub fn context_for_field(&self, profile: &DocumentProfile, field: &FieldSpec) -> Vec<String> {
        let segments = &profile.segments;

        let roles: &[SegmentRole] = match (field.name, field.kind) {
            ("title", _) => &[SegmentRole::Title, SegmentRole::Header],
            (_, FieldKind::Date) => &[SegmentRole::Date, SegmentRole::Header],
            ("volume_issue", _) | (_, FieldKind::Structured) => {
                &[SegmentRole::Metadata, SegmentRole::Header]
            }
            // Descriptions read from body content.
            _ => &[SegmentRole::Body],
        };

        let mut picked: Vec<usize> = Vec::new();
        for (idx, segment) in segments.iter().enumerate() {
            if roles.contains(&segment.role) {
                let start = idx.saturating_sub(CONTEXT_LINES);
                let end = (idx + CONTEXT_LINES + 1).min(segments.len());
                for i in start..end {
                    if !picked.contains(&i) {
                        picked.push(i);
                    }
                }
            }
        }

        if picked.is_empty() {
            return fallback_context(segments, field);
        }

        // Descriptions cap at the leading body lines to keep prompts short.
        if field.name == "description" {
            picked.truncate(10);
        }

        picked.sort_unstable();
        picked.iter().map(|&i| segments[i].content.clone()).collect()
    }
}

/// Classify a single line based on content and position.
fn classify_line(line: &str, line_number: usize, total_lines: usize) -> SegmentRole {
    if DATE_PATTERNS.iter().any(|p| p.is_match(line)) {
        return SegmentRole::Date;
    }

    // Volume/issue style markers are specific; they beat the positional
    // title heuristics below.
    if METADATA_PATTERNS.iter().any(|p| p.is_match(line)) {
        return SegmentRole::Metadata;
    }

    // Titles cluster near the top of the document.
    if line_number < 5 {
        if TITLE_INDICATORS.iter().any(|p| p.is_match(line)) {
            return SegmentRole::Title;
        }
        if line.len() > 10
            && line.chars().next().is_some_and(|c| c.is_uppercase())
            && line.chars().filter(|c| *c == ' ').count() < 8
        {
            return SegmentRole::Title;
        }
    }

    if line_number < 3
        || (line.len() < 50 && line.chars().any(|c| c.is_alphabetic()) && line == line.to_uppercase())
    {
        return SegmentRole::Header;
    }

    // Signatures cluster near the bottom.
    if line_number + 10 > total_lines && SIGNATURE_PATTERNS.iter().any(|p| p.is_match(line)) {
        return SegmentRole::Signature;
    }

    SegmentRole::Body
}

/// Confidence in a line's role classification.
fn segment_confidence(line: &str, role: SegmentRole) -> f64 {
    match role {
        SegmentRole::Date => {
            if ISO_DATE.is_match(line) {
                0.9
            } else if DATE_PATTERNS[2].is_match(line) {
                0.8
            } else {
                0.6
            }
        }
        SegmentRole::Title => {
            if line == line.to_uppercase() && (10..=60).contains(&line.len()) {
                0.8
            } else {
                0.7
            }
        }
        SegmentRole::Signature => {
            let lowered = line.to_lowercase();
            if ["sincerely", "regards", "yours"]
                .iter()
                .any(|w| lowered.contains(w))
            {
                0.9
            } else {
                0.6
            }
        }
        _ => 0.6,
    }
}

/// Context fallback when no segment matched the field's roles.
fn fallback_context(segments: &[TextSegment], field: &FieldSpec) -> Vec<String> {
    let take_first = |n: usize| {
        segments
            .iter()
            .take(n)
            .map(|s| s.content.clone())
            .collect::<Vec<_>>()
    };

    match field.kind {
        // Titles and dates live near the top when nothing was labeled.
        FieldKind::Date => take_first(5),
        FieldKind::Structured => take_first(5),
        FieldKind::Text if field.name == "title" => take_first(5),
        // Descriptions fall back to everything we have, capped.
        _ => take_first(10),
    }
}
