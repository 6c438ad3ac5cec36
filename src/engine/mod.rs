//! Extraction engine: concurrent field extraction against routed backends.
//!
//! The engine owns no mutable state across runs. Each run analyzes the
//! document, routes every field, fans the resulting tasks out under a
//! bounded worker pool, joins attempts per field, and aggregates them into
//! a report. Per-attempt failures become data; only empty input and an
//! empty catalog abort a run.

mod confidence;
mod prompts;
mod retry;

pub use confidence::estimate as estimate_confidence;
pub use prompts::build_prompt;
pub use retry::{with_retry, RetryPolicy};

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tracing::warn;

use crate::aggregate::{self, DEFAULT_CONFIDENCE_EPSILON};
use crate::analysis::{AnalysisError, DocumentAnalyzer};
use crate::catalog::ModelCatalog;
use crate::feedback::FeedbackRecorder;
use crate::models::{
    Document, ExtractionAttempt, ExtractionReport, ExtractionTask, FailureReason, FieldResult,
    FieldSpec, Mode, Priority, Resolution, BUILTIN_FIELDS,
};
use crate::routing::{self, RoutingError};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum concurrent backend calls across all fields.
    pub max_concurrent_calls: usize,
    /// Per-task timeout.
    pub task_timeout: Duration,
    /// Optional run-level deadline; outstanding tasks past it are canceled.
    pub run_deadline: Option<Duration>,
    /// Confidence window for the aggregator's accuracy tie-break.
    pub confidence_epsilon: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 4,
            task_timeout: Duration::from_secs(120),
            run_deadline: None,
            confidence_epsilon: DEFAULT_CONFIDENCE_EPSILON,
        }
    }
}

/// Errors that abort a run before any partial work is reported.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
}

/// Events emitted during an extraction run.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum ExtractionEvent {
    /// Run started after successful analysis and routing.
    Started {
        fields: usize,
        mode: Mode,
        priority: Priority,
    },
    /// Tasks for one field were dispatched.
    FieldStarted { field: String, models: Vec<String> },
    /// One backend attempt finished (success or failure).
    AttemptCompleted {
        field: String,
        model: String,
        success: bool,
        latency_ms: u64,
    },
    /// One field's attempts were aggregated.
    FieldResolved {
        field: String,
        resolution: Resolution,
        confidence: f64,
    },
    /// The run completed and the report was assembled.
    Complete {
        resolved: usize,
        unresolved: usize,
        total_time_ms: u64,
    },
}

/// Orchestrates one extraction run at a time. Stateless between runs.
pub struct ExtractionEngine {
    catalog: Arc<ModelCatalog>,
    analyzer: DocumentAnalyzer,
    config: EngineConfig,
    recorder: Option<Arc<dyn FeedbackRecorder>>,
}

impl ExtractionEngine {
    pub fn new(catalog: Arc<ModelCatalog>, config: EngineConfig) -> Self {
        Self {
            catalog,
            analyzer: DocumentAnalyzer::new(),
            config,
            recorder: None,
        }
    }

    /// Attach a feedback recorder; the engine fires it after each report.
    pub fn with_recorder(mut self, recorder: Arc<dyn FeedbackRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Run one extraction end to end.
    ///
    /// Progress is reported over `event_tx`; sends are best-effort, so a
    /// dropped receiver never stalls the run.
    pub async fn extract(
        &self,
        document: &Document,
        mode: Mode,
        priority: Priority,
        event_tx: mpsc::Sender<ExtractionEvent>,
    ) -> Result<ExtractionReport, EngineError> {
        let started = Instant::now();

        let profile = self.analyzer.analyze(&document.text)?;
        let profiles = self.catalog.profiles();

        // Route every field up front so an unroutable run aborts before any
        // backend call is made.
        let mut planned: Vec<(&'static FieldSpec, Vec<ExtractionTask>, Vec<String>)> =
            Vec::with_capacity(BUILTIN_FIELDS.len());
        for field in BUILTIN_FIELDS.iter() {
            let selected = routing::route(&profile, field, priority, mode, &profiles)?;
            let context = self.analyzer.context_for_field(&profile, field);
            let prompt = prompts::build_prompt(field, &context);
            let tasks = selected
                .iter()
                .map(|model| ExtractionTask::new(field.clone(), model.clone(), prompt.clone()))
                .collect();
            planned.push((field, tasks, context));
        }

        let _ = event_tx
            .send(ExtractionEvent::Started {
                fields: planned.len(),
                mode,
                priority,
            })
            .await;

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_calls.max(1)));
        let deadline = self
            .config
            .run_deadline
            .map(|d| tokio::time::Instant::now() + d);

        let field_futures = planned.into_iter().map(|(field, tasks, context)| {
            let semaphore = Arc::clone(&semaphore);
            let event_tx = event_tx.clone();
            let profiles = &profiles;
            async move {
                let _ = event_tx
                    .send(ExtractionEvent::FieldStarted {
                        field: field.name.to_string(),
                        models: tasks.iter().map(|t| t.model.id.clone()).collect(),
                    })
                    .await;

                let attempt_futures = tasks.into_iter().map(|task| {
                    self.run_task(task, &context, Arc::clone(&semaphore), deadline, event_tx.clone())
                });
                // The field joins only once all of its attempts resolve.
                let attempts = futures::future::join_all(attempt_futures).await;

                let result = aggregate::aggregate(
                    field,
                    attempts,
                    profiles,
                    self.config.confidence_epsilon,
                );
                let _ = event_tx
                    .send(ExtractionEvent::FieldResolved {
                        field: result.field.clone(),
                        resolution: result.resolution,
                        confidence: result.confidence,
                    })
                    .await;
                result
            }
        });

        let fields: Vec<FieldResult> = futures::future::join_all(field_futures).await;

        for result in &fields {
            if result.resolution == Resolution::Unresolved {
                warn!(field = %result.field, "all extraction attempts failed; field unresolved");
            }
        }

        let total_time_ms = started.elapsed().as_millis() as u64;
        let unresolved = fields
            .iter()
            .filter(|f| f.resolution == Resolution::Unresolved)
            .count();
        let _ = event_tx
            .send(ExtractionEvent::Complete {
                resolved: fields.len() - unresolved,
                unresolved,
                total_time_ms,
            })
            .await;

        let report = ExtractionReport {
            source_id: document.source_id.clone(),
            content_hash: document.content_hash.clone(),
            fields,
            profile,
            mode,
            priority,
            total_time_ms,
            completed_at: Utc::now(),
        };

        if let Some(recorder) = &self.recorder {
            crate::feedback::spawn_record(Arc::clone(recorder), report.clone(), None);
        }

        Ok(report)
    }

    /// Execute one task: wait for a pool slot, call the backend, and absorb
    /// any failure into the attempt record.
    async fn run_task(
        &self,
        task: ExtractionTask,
        context: &[String],
        semaphore: Arc<Semaphore>,
        deadline: Option<tokio::time::Instant>,
        event_tx: mpsc::Sender<ExtractionEvent>,
    ) -> ExtractionAttempt {
        let field = task.field.name;
        let model = task.model.id.clone();
        let start = Instant::now();

        // A deadline shorter than the task timeout turns an elapsed timer
        // into a cancellation; a deadline already in the past skips the
        // dispatch entirely.
        let budget = match deadline {
            Some(d) => {
                let now = tokio::time::Instant::now();
                if d <= now {
                    None
                } else {
                    let remaining = d - now;
                    if remaining < self.config.task_timeout {
                        Some((remaining, true))
                    } else {
                        Some((self.config.task_timeout, false))
                    }
                }
            }
            None => Some((self.config.task_timeout, false)),
        };

        let attempt = match budget {
            None => ExtractionAttempt::failed(
                field,
                model.clone(),
                FailureReason::Canceled,
                Duration::ZERO,
            ),
            Some((wait, deadline_limited)) => {
                let call = async {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .expect("worker pool semaphore is never closed");
                    match self.catalog.backend(&task.model.id) {
                        Some(backend) => backend.extract(&task).await,
                        None => Err(crate::llm::BackendError::Unavailable(format!(
                            "backend '{}' is not registered",
                            task.model.id
                        ))),
                    }
                };
                match tokio::time::timeout(wait, call).await {
                    Ok(Ok(raw)) => {
                        let trimmed = raw.trim();
                        if trimmed.is_empty() {
                            ExtractionAttempt::failed(
                                field,
                                model.clone(),
                                FailureReason::EmptyResponse,
                                start.elapsed(),
                            )
                        } else {
                            let confidence = confidence::estimate(&task.field, trimmed, context);
                            ExtractionAttempt::success(
                                field,
                                model.clone(),
                                trimmed,
                                confidence,
                                start.elapsed(),
                            )
                        }
                    }
                    Ok(Err(e)) => ExtractionAttempt::failed(
                        field,
                        model.clone(),
                        FailureReason::Backend(e.to_string()),
                        start.elapsed(),
                    ),
                    Err(_) => {
                        let reason = if deadline_limited {
                            FailureReason::Canceled
                        } else {
                            FailureReason::Timeout
                        };
                        ExtractionAttempt::failed(field, model.clone(), reason, start.elapsed())
                    }
                }
            }
        };

        let _ = event_tx
            .send(ExtractionEvent::AttemptCompleted {
                field: field.to_string(),
                model,
                success: attempt.is_success(),
                latency_ms: attempt.latency_ms,
            })
            .await;

        attempt
    }
}
