//! Feedback recording: the boundary to the training/tuning subsystem.
//!
//! The engine only emits; it never waits on feedback or depends on its
//! result beyond logging a failure. Corrections arrive later, when a human
//! reviews a run, through the same interface.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::warn;

use crate::models::ExtractionReport;

/// Sink for extraction outcomes and later human corrections.
#[async_trait]
pub trait FeedbackRecorder: Send + Sync {
    /// Record one run outcome, optionally with corrected field values.
    async fn record(
        &self,
        report: &ExtractionReport,
        corrections: Option<&HashMap<String, String>>,
    ) -> anyhow::Result<()>;
}

/// Fire-and-forget recording: spawn the call and log failures.
pub fn spawn_record(
    recorder: Arc<dyn FeedbackRecorder>,
    report: ExtractionReport,
    corrections: Option<HashMap<String, String>>,
) {
    tokio::spawn(async move {
        if let Err(e) = recorder.record(&report, corrections.as_ref()).await {
            warn!("feedback recording failed: {e:#}");
        }
    });
}

/// Recorder that appends one JSON document per event to a directory.
pub struct JsonFeedbackRecorder {
    dir: PathBuf,
}

impl JsonFeedbackRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn event_path(&self, report: &ExtractionReport) -> PathBuf {
        let safe_source: String = report
            .source_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        // A short random suffix keeps bursts of events from colliding.
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        self.dir
            .join(format!("{safe_source}_{stamp}_{}.json", &nonce[..8]))
    }
}

#[async_trait]
impl FeedbackRecorder for JsonFeedbackRecorder {
    async fn record(
        &self,
        report: &ExtractionReport,
        corrections: Option<&HashMap<String, String>>,
    ) -> anyhow::Result<()> {
        let event = json!({
            "recorded_at": Utc::now().to_rfc3339(),
            "source_id": report.source_id,
            "content_hash": report.content_hash,
            "results": report.to_record(),
            "corrections": corrections,
        });

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.event_path(report);
        tokio::fs::write(&path, serde_json::to_vec_pretty(&event)?).await?;
        tracing::debug!(path = %path.display(), "feedback event recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Document, DocumentProfile, DocumentType, FieldResult, Mode, Priority, QualityMetrics,
        Resolution,
    };

    fn sample_report() -> ExtractionReport {
        let document = Document::new("bulletin_3", "Volume 3, Issue 1\nSpring news.").unwrap();
        ExtractionReport {
            source_id: document.source_id.clone(),
            content_hash: document.content_hash.clone(),
            fields: vec![FieldResult {
                field: "title".to_string(),
                value: Some("Spring Bulletin".to_string()),
                confidence: 0.7,
                resolution: Resolution::SingleSource,
                attempts: vec![],
            }],
            profile: DocumentProfile {
                doc_type: DocumentType::Newsletter,
                type_confidence: 0.7,
                quality: QualityMetrics {
                    text_clarity: 0.8,
                    structure_clarity: 0.5,
                    completeness: 0.6,
                    overall: 0.66,
                },
                segments: vec![],
                total_lines: 2,
            },
            mode: Mode::Parallel,
            priority: Priority::Balanced,
            total_time_ms: 42,
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn writes_one_event_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = JsonFeedbackRecorder::new(dir.path());
        let report = sample_report();

        recorder.record(&report, None).await.unwrap();

        let mut corrections = HashMap::new();
        corrections.insert("title".to_string(), "Spring Community Bulletin".to_string());
        recorder.record(&report, Some(&corrections)).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 2);

        let mut saw_correction = false;
        for entry in entries {
            let content = std::fs::read_to_string(entry.unwrap().path()).unwrap();
            let event: serde_json::Value = serde_json::from_str(&content).unwrap();
            assert_eq!(event["source_id"], "bulletin_3");
            assert_eq!(event["results"]["title"]["value"], "Spring Bulletin");
            if event["corrections"]["title"] == "Spring Community Bulletin" {
                saw_correction = true;
            }
        }
        assert!(saw_correction);
    }
}
