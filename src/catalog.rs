//! Model catalog: the registry of inference backends and their declared
//! strengths.
//!
//! Profiles are immutable configuration, independent of any request. Each
//! catalog entry pairs a profile with the capability object that actually
//! talks to the backend, so callers select work by declared tags rather than
//! concrete types. Nothing mutates the catalog during a run.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::{ExtractionBackend, OllamaBackend, OllamaClient};

/// Declared latency tier. Ordering: faster tiers compare smaller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyClass {
    Fast,
    Standard,
    Slow,
}

impl LatencyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Standard => "standard",
            Self::Slow => "slow",
        }
    }
}

/// Declared accuracy tier. Ordering: more accurate tiers compare larger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyClass {
    Approximate,
    Solid,
    Precise,
}

impl AccuracyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approximate => "approximate",
            Self::Solid => "solid",
            Self::Precise => "precise",
        }
    }
}

/// Sampling options sent with every generation request for a model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
            top_k: 40,
        }
    }
}

/// Immutable description of one inference backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Backend identity as the inference server knows it (e.g. "llama3.2:1b").
    pub id: String,
    /// Declared latency tier.
    pub latency: LatencyClass,
    /// Declared accuracy tier.
    pub accuracy: AccuracyClass,
    /// Relative cost weight; cheaper backends break ties.
    #[serde(default = "default_cost_weight")]
    pub cost_weight: f64,
    /// Field names this backend specializes in.
    #[serde(default)]
    pub specialties: Vec<String>,
    /// Sampling options for this backend.
    #[serde(default)]
    pub options: GenerationOptions,
}

fn default_cost_weight() -> f64 {
    1.0
}

impl ModelProfile {
    /// Whether this backend declares a specialty for the named field.
    pub fn specializes_in(&self, field: &str) -> bool {
        self.specialties.iter().any(|s| s == field)
    }
}

/// One registered backend: its profile plus the object that executes calls.
#[derive(Clone)]
pub struct CatalogEntry {
    pub profile: ModelProfile,
    pub backend: Arc<dyn ExtractionBackend>,
}

/// Registry of available inference backends. Read-only during runs.
#[derive(Clone, Default)]
pub struct ModelCatalog {
    entries: Vec<CatalogEntry>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under its profile.
    pub fn register(&mut self, profile: ModelProfile, backend: Arc<dyn ExtractionBackend>) {
        self.entries.push(CatalogEntry { profile, backend });
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All profiles, in registration order.
    pub fn profiles(&self) -> Vec<ModelProfile> {
        self.entries.iter().map(|e| e.profile.clone()).collect()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// The capability object registered for a backend id.
    pub fn backend(&self, id: &str) -> Option<Arc<dyn ExtractionBackend>> {
        self.entries
            .iter()
            .find(|e| e.profile.id == id)
            .map(|e| Arc::clone(&e.backend))
    }

    /// Declared accuracy class for a backend id, if registered.
    pub fn accuracy_of(&self, id: &str) -> Option<AccuracyClass> {
        self.entries
            .iter()
            .find(|e| e.profile.id == id)
            .map(|e| e.profile.accuracy)
    }

    /// Build a catalog from profiles, wiring every entry to the given Ollama
    /// client.
    pub fn from_profiles(profiles: Vec<ModelProfile>, client: Arc<OllamaClient>) -> Self {
        let mut catalog = Self::new();
        for profile in profiles {
            let backend = Arc::new(OllamaBackend::new(Arc::clone(&client), profile.clone()));
            catalog.register(profile, backend);
        }
        catalog
    }

    /// Default catalog wired to an Ollama client.
    pub fn with_defaults(client: Arc<OllamaClient>) -> Self {
        Self::from_profiles(default_profiles(), client)
    }
}

/// Built-in backend profiles.
///
/// The small task specialists handle the day-to-day fields; the larger
/// general models exist for consensus cross-validation and accuracy-priority
/// runs.
pub fn default_profiles() -> Vec<ModelProfile> {
    vec![
        // Title extraction specialist
        ModelProfile {
            id: "phi3.5:3.8b".to_string(),
            latency: LatencyClass::Fast,
            accuracy: AccuracyClass::Precise,
            cost_weight: 1.0,
            specialties: vec!["title".to_string()],
            options: GenerationOptions {
                temperature: 0.1,
                top_p: 0.9,
                top_k: 40,
            },
        },
        // Date extraction specialist (ultra-fast)
        ModelProfile {
            id: "llama3.2:1b".to_string(),
            latency: LatencyClass::Fast,
            accuracy: AccuracyClass::Solid,
            cost_weight: 0.5,
            specialties: vec!["date".to_string()],
            options: GenerationOptions {
                temperature: 0.05,
                top_p: 0.8,
                top_k: 20,
            },
        },
        // Description summarization specialist
        ModelProfile {
            id: "qwen2.5:3b".to_string(),
            latency: LatencyClass::Fast,
            accuracy: AccuracyClass::Precise,
            cost_weight: 1.0,
            specialties: vec!["description".to_string()],
            options: GenerationOptions {
                temperature: 0.2,
                top_p: 0.9,
                top_k: 40,
            },
        },
        // Volume/issue extraction specialist
        ModelProfile {
            id: "gemma2:2b".to_string(),
            latency: LatencyClass::Fast,
            accuracy: AccuracyClass::Solid,
            cost_weight: 0.5,
            specialties: vec!["volume_issue".to_string()],
            options: GenerationOptions {
                temperature: 0.05,
                top_p: 0.8,
                top_k: 20,
            },
        },
        // General model for consensus cross-validation
        ModelProfile {
            id: "llama3.1:8b".to_string(),
            latency: LatencyClass::Standard,
            accuracy: AccuracyClass::Precise,
            cost_weight: 2.0,
            specialties: Vec::new(),
            options: GenerationOptions::default(),
        },
        // Heavyweight fallback for accuracy-priority runs
        ModelProfile {
            id: "granite3.2-vision".to_string(),
            latency: LatencyClass::Slow,
            accuracy: AccuracyClass::Precise,
            cost_weight: 3.0,
            specialties: Vec::new(),
            options: GenerationOptions::default(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_orderings() {
        assert!(LatencyClass::Fast < LatencyClass::Slow);
        assert!(AccuracyClass::Approximate < AccuracyClass::Precise);
    }

    #[test]
    fn defaults_cover_every_builtin_field() {
        let profiles = default_profiles();
        for field in ["title", "date", "description", "volume_issue"] {
            assert!(
                profiles.iter().any(|p| p.specializes_in(field)),
                "no specialist for {field}"
            );
        }
    }

    #[test]
    fn defaults_include_multiple_accuracy_tiers() {
        let profiles = default_profiles();
        assert!(profiles.iter().any(|p| p.accuracy == AccuracyClass::Solid));
        assert!(profiles.iter().any(|p| p.accuracy == AccuracyClass::Precise));
        assert!(profiles.len() >= 2);
    }

    #[test]
    fn profile_roundtrips_through_serde() {
        let profile = &default_profiles()[0];
        let json = serde_json::to_string(profile).unwrap();
        let back: ModelProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, profile.id);
        assert_eq!(back.latency, profile.latency);
        assert_eq!(back.accuracy, profile.accuracy);
    }
}
