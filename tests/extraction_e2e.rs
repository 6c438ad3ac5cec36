//! End-to-end engine tests with scripted in-memory backends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use docmeta::catalog::{
    AccuracyClass, GenerationOptions, LatencyClass, ModelCatalog, ModelProfile,
};
use docmeta::engine::{EngineConfig, EngineError, ExtractionEngine};
use docmeta::llm::{BackendError, ExtractionBackend};
use docmeta::models::{
    Document, ExtractionTask, FailureReason, Mode, Priority, Resolution,
};

const SAMPLE_TEXT: &str = "COMMUNITY TASK FORCE NEWSLETTER\n\
    Volume 3, Issue 1\n\
    6 January 1986\n\
    \n\
    Dear Friends,\n\
    The task force met this month to plan the year ahead. Many members \
    attended and several new projects were approved for the spring season.\n\
    Fundraising continues for the shelter program and volunteers are needed.\n\
    \n\
    Sincerely,\n\
    The Editors";

/// Scripted backend: canned per-field answers, optional delay, optional
/// hard failure. Records how many calls it served.
struct ScriptedBackend {
    id: String,
    responses: HashMap<&'static str, String>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    fn new(id: &str) -> Self {
        let mut responses = HashMap::new();
        responses.insert("title", "Community Task Force Newsletter".to_string());
        responses.insert("date", "1986-01-06".to_string());
        responses.insert(
            "description",
            "Monthly newsletter covering task force planning, new spring projects, \
             and ongoing fundraising for the shelter program."
                .to_string(),
        );
        responses.insert("volume_issue", "Volume 3, Issue 1".to_string());
        Self {
            id: id.to_string(),
            responses,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn with_response(mut self, field: &'static str, value: &str) -> Self {
        self.responses.insert(field, value.to_string());
        self
    }

    fn without_response(mut self, field: &'static str) -> Self {
        self.responses.remove(field);
        self
    }

    fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ExtractionBackend for ScriptedBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn extract(&self, task: &ExtractionTask) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.responses.get(task.field.name) {
            Some(value) => Ok(value.clone()),
            None => Err(BackendError::Connection("connection refused".to_string())),
        }
    }
}

fn profile(id: &str, latency: LatencyClass, accuracy: AccuracyClass) -> ModelProfile {
    ModelProfile {
        id: id.to_string(),
        latency,
        accuracy,
        cost_weight: 1.0,
        specialties: Vec::new(),
        options: GenerationOptions::default(),
    }
}

fn catalog_with(backends: Vec<(ModelProfile, ScriptedBackend)>) -> ModelCatalog {
    let mut catalog = ModelCatalog::new();
    for (profile, backend) in backends {
        catalog.register(profile, Arc::new(backend));
    }
    catalog
}

fn sample_document() -> Document {
    Document::new("bulletin_1986", SAMPLE_TEXT).unwrap()
}

fn engine_with(catalog: ModelCatalog, config: EngineConfig) -> ExtractionEngine {
    ExtractionEngine::new(Arc::new(catalog), config)
}

fn events() -> mpsc::Sender<docmeta::engine::ExtractionEvent> {
    mpsc::channel(256).0
}

#[tokio::test]
async fn parallel_mode_issues_exactly_one_task_per_field() {
    let fast = ScriptedBackend::new("fast-model");
    let slow = ScriptedBackend::new("slow-model");
    let fast_calls = fast.call_counter();
    let slow_calls = slow.call_counter();

    let catalog = catalog_with(vec![
        (
            profile("fast-model", LatencyClass::Fast, AccuracyClass::Solid),
            fast,
        ),
        (
            profile("slow-model", LatencyClass::Slow, AccuracyClass::Precise),
            slow,
        ),
    ]);
    let engine = engine_with(catalog, EngineConfig::default());

    let report = engine
        .extract(&sample_document(), Mode::Parallel, Priority::Speed, events())
        .await
        .unwrap();

    // Speed priority routes every field to the fast backend, once each.
    assert_eq!(fast_calls.load(Ordering::SeqCst), 4);
    assert_eq!(slow_calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.fields.len(), 4);
    for field in &report.fields {
        assert_eq!(field.attempts.len(), 1);
        assert_eq!(field.resolution, Resolution::SingleSource);
        assert!(field.value.is_some());
        assert!((0.0..=1.0).contains(&field.confidence));
    }
}

#[tokio::test]
async fn consensus_mode_issues_two_tasks_per_field() {
    let a = ScriptedBackend::new("model-a");
    let b = ScriptedBackend::new("model-b");
    let a_calls = a.call_counter();
    let b_calls = b.call_counter();

    let catalog = catalog_with(vec![
        (
            profile("model-a", LatencyClass::Fast, AccuracyClass::Solid),
            a,
        ),
        (
            profile("model-b", LatencyClass::Standard, AccuracyClass::Precise),
            b,
        ),
    ]);
    let engine = engine_with(catalog, EngineConfig::default());

    let report = engine
        .extract(
            &sample_document(),
            Mode::Consensus,
            Priority::Balanced,
            events(),
        )
        .await
        .unwrap();

    assert_eq!(a_calls.load(Ordering::SeqCst), 4);
    assert_eq!(b_calls.load(Ordering::SeqCst), 4);
    for field in &report.fields {
        assert_eq!(field.attempts.len(), 2, "field {}", field.field);
        // Identical scripted answers agree after normalization.
        assert_eq!(field.resolution, Resolution::Agreement);
        assert!(field.value.is_some());
    }
    assert_eq!(report.mode, Mode::Consensus);
}

#[tokio::test]
async fn consensus_disagreement_retains_discarded_values() {
    let a = ScriptedBackend::new("model-a").with_response("volume_issue", "Vol. 3");
    let b = ScriptedBackend::new("model-b").with_response("volume_issue", "Vol 3, No. 2");

    let catalog = catalog_with(vec![
        (
            profile("model-a", LatencyClass::Fast, AccuracyClass::Solid),
            a,
        ),
        (
            profile("model-b", LatencyClass::Standard, AccuracyClass::Precise),
            b,
        ),
    ]);
    let engine = engine_with(catalog, EngineConfig::default());

    let report = engine
        .extract(
            &sample_document(),
            Mode::Consensus,
            Priority::Balanced,
            events(),
        )
        .await
        .unwrap();

    let volume = report.field("volume_issue").unwrap();
    assert!(matches!(
        volume.resolution,
        Resolution::HighestConfidence | Resolution::AccuracyTiebreak
    ));
    let values: Vec<&str> = volume
        .attempts
        .iter()
        .filter_map(|a| a.value.as_deref())
        .collect();
    assert!(values.contains(&"Vol. 3"));
    assert!(values.contains(&"Vol 3, No. 2"));
}

#[tokio::test(start_paused = true)]
async fn task_timeout_produces_failed_attempt_not_a_fault() {
    let a = ScriptedBackend::new("model-a");
    let hung = ScriptedBackend::new("hung-model").with_delay(Duration::from_secs(600));

    let catalog = catalog_with(vec![
        (
            profile("model-a", LatencyClass::Fast, AccuracyClass::Solid),
            a,
        ),
        (
            profile("hung-model", LatencyClass::Slow, AccuracyClass::Precise),
            hung,
        ),
    ]);
    // Enough pool slots that no task spends its timeout budget queued.
    let config = EngineConfig {
        task_timeout: Duration::from_millis(200),
        max_concurrent_calls: 8,
        ..EngineConfig::default()
    };
    let engine = engine_with(catalog, config);

    let report = engine
        .extract(
            &sample_document(),
            Mode::Consensus,
            Priority::Balanced,
            events(),
        )
        .await
        .unwrap();

    // The run completed and every field still resolved from the live backend.
    for field in &report.fields {
        assert_eq!(field.resolution, Resolution::SingleSource);
        let timed_out = field
            .attempts
            .iter()
            .find(|a| a.model == "hung-model")
            .unwrap();
        assert_eq!(timed_out.failure, Some(FailureReason::Timeout));
    }
}

#[tokio::test]
async fn field_with_all_failures_is_unresolved_not_fatal() {
    let a = ScriptedBackend::new("model-a").without_response("date");
    let b = ScriptedBackend::new("model-b").without_response("date");

    let catalog = catalog_with(vec![
        (
            profile("model-a", LatencyClass::Fast, AccuracyClass::Solid),
            a,
        ),
        (
            profile("model-b", LatencyClass::Standard, AccuracyClass::Precise),
            b,
        ),
    ]);
    let engine = engine_with(catalog, EngineConfig::default());

    let report = engine
        .extract(
            &sample_document(),
            Mode::Consensus,
            Priority::Balanced,
            events(),
        )
        .await
        .unwrap();

    let date = report.field("date").unwrap();
    assert_eq!(date.value, None);
    assert_eq!(date.confidence, 0.0);
    assert_eq!(date.resolution, Resolution::Unresolved);
    assert!(date
        .attempts
        .iter()
        .all(|a| matches!(a.failure, Some(FailureReason::Backend(_)))));

    // Other fields are unaffected.
    assert!(report.field("title").unwrap().value.is_some());
    assert_eq!(report.unresolved_fields(), vec!["date"]);
}

#[tokio::test(start_paused = true)]
async fn run_deadline_cancels_outstanding_tasks() {
    let slow = ScriptedBackend::new("slow-model").with_delay(Duration::from_secs(60));

    let catalog = catalog_with(vec![(
        profile("slow-model", LatencyClass::Slow, AccuracyClass::Precise),
        slow,
    )]);
    let config = EngineConfig {
        run_deadline: Some(Duration::from_millis(100)),
        task_timeout: Duration::from_secs(300),
        ..EngineConfig::default()
    };
    let engine = engine_with(catalog, config);

    let report = engine
        .extract(
            &sample_document(),
            Mode::Parallel,
            Priority::Balanced,
            events(),
        )
        .await
        .unwrap();

    // Every attempt was canceled; the run still assembled a report.
    for field in &report.fields {
        assert_eq!(field.resolution, Resolution::Unresolved);
        for attempt in &field.attempts {
            assert_eq!(attempt.failure, Some(FailureReason::Canceled));
            assert!(attempt.value.is_none());
        }
    }
}

#[tokio::test]
async fn empty_catalog_aborts_before_any_backend_call() {
    let engine = engine_with(ModelCatalog::new(), EngineConfig::default());
    let result = engine
        .extract(
            &sample_document(),
            Mode::Parallel,
            Priority::Balanced,
            events(),
        )
        .await;
    assert!(matches!(result, Err(EngineError::Routing(_))));
}

#[tokio::test]
async fn whitespace_document_aborts_with_analysis_error() {
    let a = ScriptedBackend::new("model-a");
    let calls = a.call_counter();
    let catalog = catalog_with(vec![(
        profile("model-a", LatencyClass::Fast, AccuracyClass::Solid),
        a,
    )]);
    let engine = engine_with(catalog, EngineConfig::default());

    // Construct the whitespace document directly; the constructor refuses it.
    let document = Document {
        source_id: "blank".to_string(),
        text: "   \n\t".to_string(),
        content_hash: Document::compute_hash("   \n\t"),
        created_at: chrono::Utc::now(),
    };

    let result = engine
        .extract(&document, Mode::Parallel, Priority::Balanced, events())
        .await;
    assert!(matches!(result, Err(EngineError::Analysis(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn events_report_run_lifecycle() {
    let a = ScriptedBackend::new("model-a");
    let catalog = catalog_with(vec![(
        profile("model-a", LatencyClass::Fast, AccuracyClass::Solid),
        a,
    )]);
    let engine = engine_with(catalog, EngineConfig::default());

    let (tx, mut rx) = mpsc::channel(256);
    let report = engine
        .extract(&sample_document(), Mode::Parallel, Priority::Balanced, tx)
        .await
        .unwrap();
    assert_eq!(report.fields.len(), 4);

    let mut attempt_events = 0;
    let mut saw_complete = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            docmeta::engine::ExtractionEvent::AttemptCompleted { success, .. } => {
                assert!(success);
                attempt_events += 1;
            }
            docmeta::engine::ExtractionEvent::Complete {
                resolved,
                unresolved,
                ..
            } => {
                assert_eq!(resolved, 4);
                assert_eq!(unresolved, 0);
                saw_complete = true;
            }
            _ => {}
        }
    }
    assert_eq!(attempt_events, 4);
    assert!(saw_complete);
}
