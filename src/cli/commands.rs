//! CLI commands implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::catalog::ModelCatalog;
use crate::config::{load_settings_with_options, Config, LoadOptions, Settings};
use crate::engine::{EngineConfig, ExtractionEngine, ExtractionEvent};
use crate::feedback::{FeedbackRecorder, JsonFeedbackRecorder};
use crate::llm::OllamaClient;
use crate::models::{Document, ExtractionReport, Mode, Priority};

use super::helpers::{confidence_badge, truncate};

#[derive(Parser)]
#[command(name = "docmeta")]
#[command(about = "Document metadata extraction engine")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Extract metadata from an OCR-corrected text file
    Extract {
        /// Path to the corrected UTF-8 text file
        file: PathBuf,
        /// Extraction strategy
        #[arg(long, value_enum, default_value = "parallel")]
        mode: Mode,
        /// Routing priority
        #[arg(long, value_enum, default_value = "balanced")]
        priority: Priority,
        /// Maximum concurrent backend calls
        #[arg(short, long)]
        workers: Option<usize>,
        /// Per-task timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Run-level deadline in seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
        /// Directory to write the JSON report to (default: data dir output/)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Skip feedback recording
        #[arg(long)]
        no_feedback: bool,
    },

    /// List the model catalog
    Models,

    /// Check the inference endpoint and model availability
    Check,

    /// Record corrected field values for a saved report
    Feedback {
        /// Path to a saved extraction report JSON
        report: PathBuf,
        /// Corrections as field=value pairs (repeatable)
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config.clone(),
        data_dir: cli.data_dir.clone(),
    };
    let (settings, config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Extract {
            file,
            mode,
            priority,
            workers,
            timeout_secs,
            deadline_secs,
            output,
            no_feedback,
        } => {
            cmd_extract(
                &settings,
                &config,
                &file,
                mode,
                priority,
                workers,
                timeout_secs,
                deadline_secs,
                output,
                no_feedback,
            )
            .await
        }
        Commands::Models => cmd_models(&config),
        Commands::Check => cmd_check(&config).await,
        Commands::Feedback { report, set } => cmd_feedback(&settings, &report, &set).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_extract(
    settings: &Settings,
    config: &Config,
    file: &Path,
    mode: Mode,
    priority: Priority,
    workers: Option<usize>,
    timeout_secs: Option<u64>,
    deadline_secs: Option<u64>,
    output: Option<PathBuf>,
    no_feedback: bool,
) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let source_id = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string();
    let document = Document::new(source_id, text)?;

    let client = Arc::new(OllamaClient::new(config.llm.clone()));
    let catalog = Arc::new(ModelCatalog::from_profiles(
        config.model_profiles(),
        client,
    ));

    let mut engine_config: EngineConfig = config.engine.to_engine_config();
    if let Some(workers) = workers {
        engine_config.max_concurrent_calls = workers;
    }
    if let Some(secs) = timeout_secs {
        engine_config.task_timeout = std::time::Duration::from_secs(secs);
    }
    if let Some(secs) = deadline_secs {
        engine_config.run_deadline = Some(std::time::Duration::from_secs(secs));
    }

    let mut engine = ExtractionEngine::new(catalog, engine_config);
    if !no_feedback {
        let recorder = JsonFeedbackRecorder::new(settings.feedback_dir.clone());
        engine = engine.with_recorder(Arc::new(recorder));
    }

    println!(
        "Processing {} (mode: {}, priority: {})",
        style(file.display()).bold(),
        mode.as_str(),
        priority.as_str()
    );

    let (event_tx, event_rx) = mpsc::channel(64);
    let render = tokio::spawn(render_progress(event_rx));

    let report = engine.extract(&document, mode, priority, event_tx).await?;

    let _ = render.await;

    display_summary(&report);

    let output_dir = output.unwrap_or_else(|| settings.output_dir.clone());
    let path = save_report(&report, &output_dir).await?;
    println!("\nResults saved to: {}", style(path.display()).cyan());

    Ok(())
}

/// Render engine events as spinner progress.
async fn render_progress(mut event_rx: mpsc::Receiver<ExtractionEvent>) {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("progress template is valid"),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    while let Some(event) = event_rx.recv().await {
        match event {
            ExtractionEvent::Started { fields, .. } => {
                spinner.set_message(format!("extracting {} fields", fields));
            }
            ExtractionEvent::FieldStarted { field, models } => {
                spinner.set_message(format!("{} → {}", field, models.join(", ")));
            }
            ExtractionEvent::AttemptCompleted {
                field,
                model,
                success,
                latency_ms,
            } => {
                let mark = if success {
                    style("✓").green()
                } else {
                    style("✗").red()
                };
                spinner.println(format!("  {} {} ({}, {}ms)", mark, field, model, latency_ms));
            }
            ExtractionEvent::FieldResolved { .. } => {}
            ExtractionEvent::Complete {
                resolved,
                unresolved,
                total_time_ms,
            } => {
                spinner.finish_and_clear();
                println!(
                    "{} {} fields resolved, {} unresolved in {:.2}s",
                    style("✓").green(),
                    resolved,
                    unresolved,
                    total_time_ms as f64 / 1000.0
                );
            }
        }
    }
}

/// Print the per-field summary table.
fn display_summary(report: &ExtractionReport) {
    println!("\n{}", style("Extraction Results").bold());
    println!("{}", "-".repeat(50));

    for field in &report.fields {
        let value = match &field.value {
            Some(v) => truncate(v, 70),
            None => style("unresolved").yellow().to_string(),
        };
        println!(
            "  {:<14} {}  ({}, {})",
            field.field,
            value,
            confidence_badge(field.confidence),
            field.resolution.as_str()
        );
    }

    println!(
        "\n  Document type: {}   Quality: {:.2}",
        report.profile.doc_type.as_str(),
        report.profile.quality.overall
    );

    let unresolved = report.unresolved_fields();
    if !unresolved.is_empty() {
        println!(
            "  {} unresolved: {}",
            style("!").yellow(),
            unresolved.join(", ")
        );
    }
}

/// Write the report record to a timestamped JSON file.
async fn save_report(report: &ExtractionReport, output_dir: &Path) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir).await?;

    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let path = output_dir.join(format!("{}_results_{}.json", report.source_id, stamp));

    // The record is the output boundary; the full report rides along for
    // audit and later correction.
    let mut record = report.to_record();
    record["report"] = serde_json::to_value(report)?;

    tokio::fs::write(&path, serde_json::to_vec_pretty(&record)?).await?;
    Ok(path)
}

/// List the model catalog.
fn cmd_models(config: &Config) -> anyhow::Result<()> {
    let profiles = config.model_profiles();

    println!("\n{}", style("Model Catalog").bold());
    println!("{}", "-".repeat(72));
    println!(
        "{:<20} {:<9} {:<12} {:<6} {}",
        style("model").cyan(),
        style("latency").cyan(),
        style("accuracy").cyan(),
        style("cost").cyan(),
        style("specialties").cyan()
    );

    for profile in &profiles {
        println!(
            "{:<20} {:<9} {:<12} {:<6.1} {}",
            profile.id,
            profile.latency.as_str(),
            profile.accuracy.as_str(),
            profile.cost_weight,
            profile.specialties.join(", ")
        );
    }
    println!();
    Ok(())
}

/// Check endpoint and per-model availability.
async fn cmd_check(config: &Config) -> anyhow::Result<()> {
    let client = OllamaClient::new(config.llm.clone());

    println!("\n{}", style("Backend Status").bold());
    println!("{}", "-".repeat(50));
    println!("Endpoint: {}", config.llm.endpoint);

    if !client.is_available().await {
        println!(
            "  {} endpoint unreachable. Is the inference server running?",
            style("✗").red()
        );
        return Ok(());
    }
    println!("  {} endpoint reachable", style("✓").green());

    let served = client.list_models().await.unwrap_or_default();
    println!("\n{}", style("Catalog Models:").cyan());
    let mut missing = 0;
    for profile in config.model_profiles() {
        let present = served.iter().any(|m| m == &profile.id);
        let status = if present {
            style("✓ served").green()
        } else {
            missing += 1;
            style("✗ not served").red()
        };
        println!("  {:<20} {}", profile.id, status);
    }

    if missing > 0 {
        println!(
            "\n{} {} model(s) missing. Pull them with: ollama pull <model>",
            style("!").yellow(),
            missing
        );
    }
    println!();
    Ok(())
}

/// Record human corrections for a saved report.
async fn cmd_feedback(
    settings: &Settings,
    report_path: &Path,
    set: &[String],
) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let contents = tokio::fs::read_to_string(report_path)
        .await
        .with_context(|| format!("failed to read {}", report_path.display()))?;
    let record: serde_json::Value = serde_json::from_str(&contents)?;
    let report: ExtractionReport = serde_json::from_value(
        record
            .get("report")
            .cloned()
            .context("report file has no embedded report (was it produced by `docmeta extract`?)")?,
    )?;

    let mut corrections = HashMap::new();
    for pair in set {
        let (field, value) = pair
            .split_once('=')
            .with_context(|| format!("invalid correction '{}', expected FIELD=VALUE", pair))?;
        corrections.insert(field.trim().to_string(), value.trim().to_string());
    }
    if corrections.is_empty() {
        anyhow::bail!("no corrections given; pass at least one --set FIELD=VALUE");
    }

    for (field, value) in &corrections {
        let previous = report
            .field(field)
            .and_then(|f| f.value.as_deref())
            .unwrap_or("unresolved");
        println!(
            "  {}: {} → {}",
            field,
            truncate(previous, 40),
            style(truncate(value, 40)).green()
        );
    }

    let recorder = JsonFeedbackRecorder::new(settings.feedback_dir.clone());
    recorder.record(&report, Some(&corrections)).await?;
    println!(
        "{} corrections recorded for {}",
        style("✓").green(),
        report.source_id
    );

    // Unknown field names are recorded as-is; warn so typos are visible.
    for field in corrections.keys() {
        if report.field(field).is_none() {
            println!(
                "  {} '{}' is not a field of this report",
                style("!").yellow(),
                field
            );
        }
    }

    Ok(())
}
