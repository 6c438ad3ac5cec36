//! LLM inference: the Ollama client and the backend capability trait.

mod backend;
mod client;

pub use backend::{BackendError, ExtractionBackend, OllamaBackend};
pub use client::{LlmConfig, LlmError, OllamaClient};
