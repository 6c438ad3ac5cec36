//! Extraction run primitives: tasks, attempts, and per-field results.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::ModelProfile;
use crate::models::field::FieldSpec;

/// Extraction strategy for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// One backend per field, all fields concurrent.
    Parallel,
    /// Multiple backends per field, cross-validated.
    Consensus,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Consensus => "consensus",
        }
    }
}

/// Routing priority for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Speed,
    Balanced,
    Accuracy,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Speed => "speed",
            Self::Balanced => "balanced",
            Self::Accuracy => "accuracy",
        }
    }
}

/// One unit of extraction work: a field, a chosen backend, and the prompt to
/// send it. Created by routing, consumed exactly once by the engine.
#[derive(Debug, Clone)]
pub struct ExtractionTask {
    /// Unique task id (appears in logs and attempt records).
    pub id: Uuid,
    /// Field being extracted.
    pub field: FieldSpec,
    /// Backend the router selected.
    pub model: ModelProfile,
    /// Fully assembled prompt.
    pub prompt: String,
}

impl ExtractionTask {
    pub fn new(field: FieldSpec, model: ModelProfile, prompt: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            field,
            model,
            prompt,
        }
    }
}

/// Why an attempt produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum FailureReason {
    /// The backend call itself failed (connection, API error, bad payload).
    Backend(String),
    /// The per-task timeout elapsed.
    Timeout,
    /// The run-level deadline canceled the task.
    Canceled,
    /// The backend answered but with nothing usable.
    EmptyResponse,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backend(_) => "backend",
            Self::Timeout => "timeout",
            Self::Canceled => "canceled",
            Self::EmptyResponse => "empty_response",
        }
    }
}

/// Result of executing one task against one backend. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    /// Field this attempt belongs to.
    pub field: String,
    /// Backend id that produced it.
    pub model: String,
    /// Raw extracted value; `None` when the attempt failed.
    pub value: Option<String>,
    /// Derived or backend-reported confidence in [0,1]; 0.0 on failure.
    pub confidence: f64,
    /// Wall-clock latency of the backend call, in milliseconds.
    pub latency_ms: u64,
    /// Failure reason when the attempt produced no value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

impl ExtractionAttempt {
    /// Successful attempt with a raw value and derived confidence.
    pub fn success(
        field: impl Into<String>,
        model: impl Into<String>,
        value: impl Into<String>,
        confidence: f64,
        latency: Duration,
    ) -> Self {
        Self {
            field: field.into(),
            model: model.into(),
            value: Some(value.into()),
            confidence: confidence.clamp(0.0, 1.0),
            latency_ms: latency.as_millis() as u64,
            failure: None,
        }
    }

    /// Failed attempt carrying the reason; confidence is pinned to zero.
    pub fn failed(
        field: impl Into<String>,
        model: impl Into<String>,
        reason: FailureReason,
        latency: Duration,
    ) -> Self {
        Self {
            field: field.into(),
            model: model.into(),
            value: None,
            confidence: 0.0,
            latency_ms: latency.as_millis() as u64,
            failure: Some(reason),
        }
    }

    /// Whether this attempt produced a value.
    pub fn is_success(&self) -> bool {
        self.value.is_some()
    }
}

/// How a field's final value was chosen among its attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Only one attempt succeeded; its value passed through unchanged.
    SingleSource,
    /// Multiple attempts agreed after normalization.
    Agreement,
    /// Disagreement resolved by strictly higher confidence.
    HighestConfidence,
    /// Confidences within epsilon; higher declared accuracy class won.
    AccuracyTiebreak,
    /// Every attempt failed; no value available.
    Unresolved,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleSource => "single_source",
            Self::Agreement => "agreement",
            Self::HighestConfidence => "highest_confidence",
            Self::AccuracyTiebreak => "accuracy_tiebreak",
            Self::Unresolved => "unresolved",
        }
    }
}

/// Aggregated outcome for one field.
///
/// All contributing attempts are retained, including discarded values, so
/// disagreements stay auditable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldResult {
    /// Field name.
    pub field: String,
    /// Final value; `None` only when resolution is `Unresolved`.
    pub value: Option<String>,
    /// Aggregate confidence in [0,1].
    pub confidence: f64,
    /// How the value was chosen.
    pub resolution: Resolution,
    /// Every attempt made for this field.
    pub attempts: Vec<ExtractionAttempt>,
}

impl FieldResult {
    /// Backend ids that contributed a successful attempt.
    pub fn models_used(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter(|a| a.is_success())
            .map(|a| a.model.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_confidence_is_clamped() {
        let a = ExtractionAttempt::success("title", "m", "v", 1.7, Duration::from_millis(5));
        assert_eq!(a.confidence, 1.0);
        let b = ExtractionAttempt::success("title", "m", "v", -0.2, Duration::from_millis(5));
        assert_eq!(b.confidence, 0.0);
    }

    #[test]
    fn failed_attempt_has_no_value() {
        let a = ExtractionAttempt::failed(
            "date",
            "m",
            FailureReason::Timeout,
            Duration::from_secs(2),
        );
        assert!(!a.is_success());
        assert_eq!(a.confidence, 0.0);
        assert_eq!(a.failure.as_ref().unwrap().as_str(), "timeout");
    }
}
