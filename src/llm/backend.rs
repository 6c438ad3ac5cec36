//! Backend capability abstraction.
//!
//! Every inference backend implements one interface: take an extraction task,
//! return raw model output. Catalog entries are selected by their declared
//! profile tags, never by concrete type.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::catalog::ModelProfile;
use crate::llm::client::{LlmError, OllamaClient};
use crate::models::ExtractionTask;

/// Errors from executing a task against a backend. Per-attempt; the engine
/// absorbs these into failed attempts rather than propagating them.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Could not reach the backend.
    #[error("connection error: {0}")]
    Connection(String),
    /// Backend answered with an error.
    #[error("api error: {0}")]
    Api(String),
    /// Backend answered with an unparseable payload.
    #[error("parse error: {0}")]
    Parse(String),
    /// Backend is disabled or not configured.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl From<LlmError> for BackendError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Connection(msg) => Self::Connection(msg),
            LlmError::Api(msg) => Self::Api(msg),
            LlmError::Parse(msg) => Self::Parse(msg),
            LlmError::Disabled => Self::Unavailable("llm disabled by configuration".to_string()),
        }
    }
}

/// A single extraction capability: run one task, return raw output.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Backend id as registered in the catalog.
    fn id(&self) -> &str;

    /// Whether the backend can currently serve requests.
    async fn is_available(&self) -> bool;

    /// Execute one extraction task, returning the raw model output.
    async fn extract(&self, task: &ExtractionTask) -> Result<String, BackendError>;
}

/// Ollama-served model as an extraction backend.
pub struct OllamaBackend {
    client: Arc<OllamaClient>,
    profile: ModelProfile,
}

impl OllamaBackend {
    pub fn new(client: Arc<OllamaClient>, profile: ModelProfile) -> Self {
        Self { client, profile }
    }
}

#[async_trait]
impl ExtractionBackend for OllamaBackend {
    fn id(&self) -> &str {
        &self.profile.id
    }

    async fn is_available(&self) -> bool {
        self.client.is_available().await
    }

    async fn extract(&self, task: &ExtractionTask) -> Result<String, BackendError> {
        let output = self
            .client
            .generate(
                &self.profile.id,
                &task.prompt,
                self.profile.options,
                task.field.max_tokens,
            )
            .await?;
        Ok(output)
    }
}
