//! Scripted LLM client for tests and dry runs.

use std::sync::Mutex;

use super::{LlmClient, LlmError};

enum Reply {
    Text(String),
    Fail,
}

struct Rule {
    needle: String,
    reply: Reply,
}

/// A recorded `generate` call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub prompt: String,
    pub system: String,
}

/// Mock LLM client. Answers from rules matched against the prompt or system text.
///
/// Rules are checked in registration order; the first whose needle occurs in
/// either the prompt or the system prompt decides the reply. Unmatched calls
/// get the default response.
pub struct MockLlmClient {
    default_response: String,
    rules: Vec<Rule>,
    available_models: Vec<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            default_response: response.to_string(),
            rules: Vec::new(),
            available_models: vec!["gpt-4o-mini".to_string()],
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.available_models = models;
        self
    }

    /// Reply with `response` whenever `needle` appears in the prompt or system text.
    pub fn respond_when(mut self, needle: &str, response: &str) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            reply: Reply::Text(response.to_string()),
        });
        self
    }

    /// Fail with a connection error whenever `needle` appears.
    pub fn fail_when(mut self, needle: &str) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            reply: Reply::Fail,
        });
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                model: model.to_string(),
                prompt: prompt.to_string(),
                system: system.to_string(),
            });
        }

        let rule = self
            .rules
            .iter()
            .find(|r| prompt.contains(&r.needle) || system.contains(&r.needle));

        match rule.map(|r| &r.reply) {
            Some(Reply::Text(text)) => Ok(text.clone()),
            Some(Reply::Fail) => Err(LlmError::Connection("mock://unreachable".into())),
            None => Ok(self.default_response.clone()),
        }
    }

    fn list_models(&self) -> Result<Vec<String>, LlmError> {
        Ok(self.available_models.clone())
    }
}
