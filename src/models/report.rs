//! The extraction report: one structured record per run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::models::document::{DocumentProfile, DocumentType};
use crate::models::extraction::{FieldResult, Mode, Priority, Resolution};

/// Full outcome of one extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Source identifier of the input document.
    pub source_id: String,
    /// SHA-256 of the input text.
    pub content_hash: String,
    /// Per-field aggregated results, in field order.
    pub fields: Vec<FieldResult>,
    /// Profile the analyzer derived for this document.
    pub profile: DocumentProfile,
    /// Strategy used for the run.
    pub mode: Mode,
    /// Routing priority used for the run.
    pub priority: Priority,
    /// Total wall-clock time of the run, in milliseconds.
    pub total_time_ms: u64,
    /// When the run completed.
    pub completed_at: DateTime<Utc>,
}

impl ExtractionReport {
    /// Result for a named field, if present.
    pub fn field(&self, name: &str) -> Option<&FieldResult> {
        self.fields.iter().find(|f| f.field == name)
    }

    /// Fields that ended unresolved.
    pub fn unresolved_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.resolution == Resolution::Unresolved)
            .map(|f| f.field.as_str())
            .collect()
    }

    /// Mean confidence across all fields.
    pub fn average_confidence(&self) -> f64 {
        if self.fields.is_empty() {
            return 0.0;
        }
        self.fields.iter().map(|f| f.confidence).sum::<f64>() / self.fields.len() as f64
    }

    /// Estimated document type.
    pub fn document_type(&self) -> DocumentType {
        self.profile.doc_type
    }

    /// Serialize to the output-boundary record: one mapping keyed by field
    /// name, plus `extraction_metadata` and `document_analysis` blocks.
    pub fn to_record(&self) -> Value {
        let mut record = Map::new();
        record.insert("source_id".to_string(), json!(self.source_id));
        record.insert("content_hash".to_string(), json!(self.content_hash));

        for field in &self.fields {
            record.insert(
                field.field.clone(),
                json!({
                    "value": field.value,
                    "confidence": field.confidence,
                    "resolution": field.resolution.as_str(),
                    "models": field.models_used(),
                }),
            );
        }

        record.insert(
            "extraction_metadata".to_string(),
            json!({
                "total_time_ms": self.total_time_ms,
                "mode": self.mode.as_str(),
                "priority": self.priority.as_str(),
                "completed_at": self.completed_at.to_rfc3339(),
            }),
        );
        record.insert(
            "document_analysis".to_string(),
            json!({
                "document_type": self.profile.doc_type.as_str(),
                "quality_score": self.profile.quality.overall,
                "segment_count": self.profile.segments.len(),
            }),
        );

        Value::Object(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::{QualityMetrics, SegmentRole, TextSegment};
    use crate::models::extraction::ExtractionAttempt;
    use std::time::Duration;

    fn sample_report() -> ExtractionReport {
        let attempt = ExtractionAttempt::success(
            "title",
            "fast-model",
            "Quarterly Bulletin",
            0.8,
            Duration::from_millis(120),
        );
        ExtractionReport {
            source_id: "bulletin_1986".to_string(),
            content_hash: "deadbeef".to_string(),
            fields: vec![FieldResult {
                field: "title".to_string(),
                value: Some("Quarterly Bulletin".to_string()),
                confidence: 0.8,
                resolution: Resolution::SingleSource,
                attempts: vec![attempt],
            }],
            profile: DocumentProfile {
                doc_type: DocumentType::Newsletter,
                type_confidence: 0.7,
                quality: QualityMetrics {
                    text_clarity: 0.9,
                    structure_clarity: 0.5,
                    completeness: 1.0,
                    overall: 0.81,
                },
                segments: vec![TextSegment {
                    content: "Quarterly Bulletin".to_string(),
                    role: SegmentRole::Title,
                    confidence: 0.8,
                    line_number: 0,
                }],
                total_lines: 1,
            },
            mode: Mode::Parallel,
            priority: Priority::Balanced,
            total_time_ms: 150,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn record_contains_field_and_metadata_blocks() {
        let record = sample_report().to_record();
        assert_eq!(record["title"]["value"], "Quarterly Bulletin");
        assert_eq!(record["title"]["models"][0], "fast-model");
        assert_eq!(record["extraction_metadata"]["mode"], "parallel");
        assert_eq!(record["extraction_metadata"]["priority"], "balanced");
        assert_eq!(record["document_analysis"]["document_type"], "newsletter");
    }

    #[test]
    fn unresolved_lookup() {
        let mut report = sample_report();
        report.fields.push(FieldResult {
            field: "date".to_string(),
            value: None,
            confidence: 0.0,
            resolution: Resolution::Unresolved,
            attempts: vec![],
        });
        assert_eq!(report.unresolved_fields(), vec!["date"]);
        assert!(report.field("title").is_some());
    }
}
