//! Analysis and combine capabilities on top of an [`LlmClient`].

use super::prompt::{
    build_combine_prompt, CLINICAL_SYSTEM_PROMPT, COMBINE_SYSTEM_PROMPT, PATHOLOGY_SYSTEM_PROMPT,
};
use super::{LlmClient, LlmError};

/// The two document families that get their own analysis endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Pathology,
    Clinical,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pathology => "pathology",
            Self::Clinical => "clinical",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            Self::Pathology => PATHOLOGY_SYSTEM_PROMPT,
            Self::Clinical => CLINICAL_SYSTEM_PROMPT,
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Send one text, get back a raw response (free text + fenced JSON block).
pub trait ReportAnalyzer {
    fn kind(&self) -> ReportKind;

    fn analyze(&self, text: &str) -> Result<String, LlmError>;
}

/// Merge several raw chunk responses into one, preserving the JSON schema.
pub trait BatchMerger {
    fn combine(&self, responses: &[&str]) -> Result<String, LlmError>;
}

/// Both capabilities backed by a single LLM client and model.
pub struct LlmReportAnalyzer<'a> {
    client: &'a dyn LlmClient,
    model: String,
    kind: ReportKind,
}

impl<'a> LlmReportAnalyzer<'a> {
    pub fn new(client: &'a dyn LlmClient, model: &str, kind: ReportKind) -> Self {
        Self {
            client,
            model: model.to_string(),
            kind,
        }
    }
}

impl ReportAnalyzer for LlmReportAnalyzer<'_> {
    fn kind(&self) -> ReportKind {
        self.kind
    }

    fn analyze(&self, text: &str) -> Result<String, LlmError> {
        self.client
            .generate(&self.model, text, self.kind.system_prompt())
    }
}

impl BatchMerger for LlmReportAnalyzer<'_> {
    fn combine(&self, responses: &[&str]) -> Result<String, LlmError> {
        let prompt = build_combine_prompt(responses);
        self.client
            .generate(&self.model, &prompt, COMBINE_SYSTEM_PROMPT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn analyzer_uses_kind_specific_system_prompt() {
        let client = MockLlmClient::new("ok");
        let pathology = LlmReportAnalyzer::new(&client, "gpt-4o-mini", ReportKind::Pathology);
        let clinical = LlmReportAnalyzer::new(&client, "gpt-4o-mini", ReportKind::Clinical);

        pathology.analyze("report one").unwrap();
        clinical.analyze("note one").unwrap();

        let calls = client.calls();
        assert!(calls[0].system.contains("pathology report"));
        assert!(calls[1].system.contains("medical records"));
        assert_eq!(calls[0].prompt, "report one");
        assert_eq!(calls[1].model, "gpt-4o-mini");
    }

    #[test]
    fn combine_joins_responses_with_separator() {
        let client = MockLlmClient::new("merged");
        let merger = LlmReportAnalyzer::new(&client, "m", ReportKind::Clinical);

        let merged = merger.combine(&["first", "second"]).unwrap();

        assert_eq!(merged, "merged");
        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("first"));
        assert!(calls[0].prompt.contains("--- Next Batch ---"));
        assert!(calls[0].system.contains("summarization assistant"));
    }

    #[test]
    fn report_kind_display() {
        assert_eq!(ReportKind::Pathology.to_string(), "pathology");
        assert_eq!(ReportKind::Clinical.as_str(), "clinical");
    }
}
