//! LLM transport and the two capabilities the pipeline consumes:
//! report analysis and batch combination.
//!
//! Everything above this module sees "send text, get back a response with a
//! free-text section and a fenced JSON block". Model choice, HTTP and prompt
//! text live here.

pub mod analyzer;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod prompt;

pub use analyzer::{BatchMerger, LlmReportAnalyzer, ReportAnalyzer, ReportKind};
pub use mock::MockLlmClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use thiserror::Error;

use crate::config::{LlmConfig, LlmProvider};

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM endpoint is not reachable at {0}")]
    Connection(String),

    #[error("LLM endpoint returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("Model returned an empty completion")]
    EmptyCompletion,
}

/// LLM client abstraction (allows mocking).
pub trait LlmClient: Send + Sync {
    fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, LlmError>;

    fn list_models(&self) -> Result<Vec<String>, LlmError>;

    fn is_model_available(&self, model: &str) -> Result<bool, LlmError> {
        let models = self.list_models()?;
        Ok(models.iter().any(|m| m.starts_with(model)))
    }
}

/// Build the configured transport.
pub fn build_client(config: &LlmConfig) -> Result<Box<dyn LlmClient>, LlmError> {
    match config.provider {
        LlmProvider::Ollama => Ok(Box::new(OllamaClient::new(
            &config.base_url,
            config.timeout_secs,
        )?)),
        LlmProvider::OpenAi => {
            let api_key = std::env::var(&config.api_key_env)
                .map_err(|_| LlmError::MissingApiKey(config.api_key_env.clone()))?;
            Ok(Box::new(OpenAiClient::new(
                &config.base_url,
                &api_key,
                config.timeout_secs,
                config.max_response_tokens,
            )?))
        }
    }
}

/// Log (but do not fail) when the configured model is not served by the endpoint.
pub fn preflight(client: &dyn LlmClient, model: &str) {
    match client.is_model_available(model) {
        Ok(true) => tracing::info!(model, "LLM model available"),
        Ok(false) => tracing::warn!(model, "Configured model not listed by the endpoint"),
        Err(e) => tracing::warn!(model, error = %e, "Could not list models; continuing"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_availability_uses_prefix_match() {
        let client = MockLlmClient::new("").with_models(vec!["gpt-4o-mini-2024".into()]);
        assert!(client.is_model_available("gpt-4o-mini").unwrap());
        assert!(!client.is_model_available("llama3").unwrap());
    }

    #[test]
    fn openai_without_key_is_rejected() {
        let config = LlmConfig {
            provider: LlmProvider::OpenAi,
            api_key_env: "CLINMETA_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..LlmConfig::default()
        };
        let result = build_client(&config);
        assert!(matches!(result, Err(LlmError::MissingApiKey(_))));
    }

    #[test]
    fn ollama_client_builds_from_config() {
        let config = LlmConfig {
            provider: LlmProvider::Ollama,
            base_url: "http://localhost:11434/".into(),
            ..LlmConfig::default()
        };
        assert!(build_client(&config).is_ok());
    }
}
