use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "ClinMeta";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "clinmeta=info"
}

/// Get the application data directory (~/ClinMeta/).
/// Falls back to the working directory when no home directory is known.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location for generated reports.
pub fn results_dir() -> PathBuf {
    app_data_dir().join("results")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Ollama,
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Environment variable holding the API key (OpenAI-compatible endpoints only).
    pub api_key_env: String,
    pub max_response_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            base_url: "https://api.openai.com".into(),
            model: "gpt-4o-mini".into(),
            timeout_secs: 300,
            api_key_env: "OPENAI_API_KEY".into(),
            max_response_tokens: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationMode {
    /// Hebrew values are written as-is.
    None,
    /// Bilingual dictionary file; unknown terms pass through.
    Dictionary,
    /// Translation through the configured LLM.
    Llm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub mode: TranslationMode,
    pub dictionary_path: Option<PathBuf>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            mode: TranslationMode::None,
            dictionary_path: None,
        }
    }
}

/// Everything one pipeline run needs. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub llm: LlmConfig,
    /// Token budget per analysis request.
    pub max_tokens: usize,
    /// Heuristic ratio used when no tokenizer file is configured.
    pub chars_per_token: usize,
    /// HuggingFace `tokenizer.json` (needs the `hf-tokenizer` feature).
    pub tokenizer_path: Option<PathBuf>,
    /// Pathology results within this many days of the procedure belong to it.
    pub pathology_window_days: i64,
    /// Clinical notes within this many months of the procedure are analyzed.
    pub clinical_window_months: u32,
    /// Note categories never sent for analysis.
    pub excluded_note_categories: Vec<String>,
    pub translation: TranslationConfig,
    pub output_dir: PathBuf,
    pub log_file: Option<PathBuf>,
    pub other_cancers_report: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            max_tokens: 120_000,
            chars_per_token: 4,
            tokenizer_path: None,
            pathology_window_days: 2,
            clinical_window_months: 3,
            excluded_note_categories: vec![
                "סיכום אחות מתאמת".into(),
                "עו\"ס הערכה ביופסיכוסוציאלית".into(),
            ],
            translation: TranslationConfig::default(),
            output_dir: results_dir(),
            log_file: None,
            other_cancers_report: true,
        }
    }
}

impl RunConfig {
    /// Load from a JSON file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::from_str(&raw)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be positive".into()));
        }
        if self.chars_per_token == 0 {
            return Err(ConfigError::Invalid("chars_per_token must be positive".into()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.model must not be empty".into()));
        }
        if self.pathology_window_days < 0 {
            return Err(ConfigError::Invalid(
                "pathology_window_days must not be negative".into(),
            ));
        }
        if self.translation.mode == TranslationMode::Dictionary
            && self.translation.dictionary_path.is_none()
        {
            return Err(ConfigError::Invalid(
                "translation.dictionary_path is required in dictionary mode".into(),
            ));
        }
        Ok(())
    }
}
