use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "CarePath";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable overriding the Ollama base URL.
pub const ENV_OLLAMA_URL: &str = "CAREPATH_OLLAMA_URL";
/// Environment variable overriding the completion model name.
pub const ENV_MODEL: &str = "CAREPATH_MODEL";

/// Default `tracing` filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "carepath=info,warn"
}

/// Get the application data directory.
/// Falls back to the working directory when no home directory exists.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("CarePath")
}

/// SQLite file holding persisted assessment sessions.
pub fn sessions_db_path() -> PathBuf {
    app_data_dir().join("sessions.db")
}

// ═══════════════════════════════════════════════════════════
// Assessment tuning
// ═══════════════════════════════════════════════════════════

/// Knobs for the assessment conversation.
///
/// The similarity threshold and truncation length are empirical values,
/// not derived ones. They live here so deployments can tune them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentConfig {
    /// Hard cap on presented questions (fixed + dynamic).
    pub max_total_questions: usize,
    /// Follow-up generation attempts per dynamic turn before giving up.
    pub max_dynamic_attempts: usize,
    /// Token-overlap ratio above which two questions count as duplicates.
    pub similarity_threshold: f64,
    /// Both normalized strings must be longer than this for containment matching.
    pub containment_min_len: usize,
    /// Generated questions longer than this are truncated with an ellipsis.
    pub max_question_len: usize,
    /// Fewer parsed options than this triggers the generic option set.
    pub min_options: usize,
    /// Parsed options beyond this are dropped.
    pub max_options: usize,
    /// Case-insensitive phrases marking a summary response as a provider error.
    pub error_markers: Vec<String>,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            max_total_questions: 10,
            max_dynamic_attempts: 5,
            similarity_threshold: 0.8,
            containment_min_len: 10,
            max_question_len: 110,
            min_options: 2,
            max_options: 4,
            error_markers: [
                "apologize",
                "trouble connecting",
                "api key",
                "authentication failed",
                "quota",
                "limit",
            ]
            .iter()
            .map(|m| m.to_string())
            .collect(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Completion provider
// ═══════════════════════════════════════════════════════════

/// Connection settings for the bundled Ollama completion client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "medgemma:latest".to_string(),
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    /// Defaults overridden by `CAREPATH_OLLAMA_URL` / `CAREPATH_MODEL` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = non_empty_env(ENV_OLLAMA_URL) {
            config.base_url = url;
        }
        if let Some(model) = non_empty_env(ENV_MODEL) {
            config.model = model;
        }
        config
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
