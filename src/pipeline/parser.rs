use std::sync::LazyLock;

use regex::Regex;

use crate::models::StructuredData;

const JSON_FENCE: &str = "```json";

/// Lazy match: stops at the last `}` before the first closing fence.
static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("valid regex"));

/// Label models tend to put on the line just before the JSON block.
static JSON_LABEL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|\n)[#*\s]*(?:\d+\.\s*)?JSON(?:\s+Format)?[*:\s]*$").expect("valid regex")
});

/// A raw analysis response split into its two sections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedAnalysis {
    pub free_text: String,
    pub structured: StructuredData,
}

impl ParsedAnalysis {
    /// Nothing usable came back.
    pub fn is_empty(&self) -> bool {
        self.free_text.is_empty() && self.structured.is_empty()
    }
}

/// Split a raw response into free text and the fenced JSON object.
///
/// Never fails: a missing response, a missing block or invalid JSON all
/// degrade to empty structured data (logged), keeping any free text found.
pub fn extract(entity: &str, raw: Option<&str>) -> ParsedAnalysis {
    let Some(raw) = raw else {
        tracing::error!(entity, "No analysis response to parse");
        return ParsedAnalysis::default();
    };

    let free_text = free_text_section(raw);

    let Some(captures) = JSON_BLOCK.captures(raw) else {
        tracing::error!(entity, "No JSON section found in the analysis");
        return ParsedAnalysis {
            free_text,
            structured: StructuredData::default(),
        };
    };

    let json = captures.get(1).map_or("", |m| m.as_str()).trim();
    let structured = match serde_json::from_str::<serde_json::Value>(json) {
        Ok(value) => StructuredData::from_json(value),
        Err(e) => {
            tracing::error!(entity, error = %e, "Failed to decode the analysis JSON");
            StructuredData::default()
        }
    };

    ParsedAnalysis {
        free_text,
        structured,
    }
}

/// Everything before the first fence, without a trailing JSON label line.
fn free_text_section(raw: &str) -> String {
    let before = match raw.find(JSON_FENCE) {
        Some(pos) => &raw[..pos],
        None => raw,
    };
    let trimmed = before.trim();
    JSON_LABEL_LINE.replace(trimmed, "").trim().to_string()
}
