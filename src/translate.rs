//! Hebrew -> English translation of free-form patient fields.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{TranslationConfig, TranslationMode};
use crate::llm::prompt::TRANSLATION_SYSTEM_PROMPT;
use crate::llm::{LlmClient, LlmError};
use crate::models::{Demography, FieldValue, HabitEntry, NONE_PLACEHOLDER};

/// Written to the demography cell when any part fails to translate.
pub const TRANSLATION_ERROR: &str = "Translation Error";

/// Form hints left over from the habits questionnaire.
const HABIT_FORM_HINTS: [&str; 6] = [
    "(detail)",
    "(Detail)",
    "(indicate quantity)",
    "(Indicate quantity)",
    "(specify quantity)",
    "(Specify quantity)",
];

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("LLM translation failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Cannot read dictionary {path}: {source}")]
    DictionaryIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid dictionary JSON: {0}")]
    DictionaryJson(#[from] serde_json::Error),

    #[error("Translation mode {0:?} needs a dictionary path")]
    MissingDictionary(TranslationMode),
}

pub trait Translator {
    fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

/// Leaves text untouched.
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(&self, text: &str) -> Result<String, TranslateError> {
        Ok(text.to_string())
    }
}

/// Bilingual term dictionary. Unknown terms pass through.
pub struct DictionaryTranslator {
    /// Longest term first so multi-word entries win over their parts.
    terms: Vec<(String, String)>,
}

impl DictionaryTranslator {
    pub fn from_entries(entries: HashMap<String, String>) -> Self {
        let mut terms: Vec<(String, String)> = entries
            .into_iter()
            .filter(|(k, _)| !k.trim().is_empty())
            .collect();
        terms.sort_by(|a, b| {
            b.0.chars()
                .count()
                .cmp(&a.0.chars().count())
                .then_with(|| a.0.cmp(&b.0))
        });
        Self { terms }
    }

    /// Load a flat JSON object of `"hebrew": "english"` pairs.
    pub fn load(path: &Path) -> Result<Self, TranslateError> {
        let raw = std::fs::read_to_string(path).map_err(|source| TranslateError::DictionaryIo {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: HashMap<String, String> = serde_json::from_str(&raw)?;
        tracing::info!(terms = entries.len(), "Translation dictionary loaded");
        Ok(Self::from_entries(entries))
    }
}

impl Translator for DictionaryTranslator {
    fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let trimmed = text.trim();
        if let Some((_, english)) = self.terms.iter().find(|(k, _)| k == trimmed) {
            return Ok(english.clone());
        }
        let mut out = text.to_string();
        for (hebrew, english) in &self.terms {
            if out.contains(hebrew.as_str()) {
                out = out.replace(hebrew.as_str(), english);
            }
        }
        Ok(out)
    }
}

/// Translation through the configured model.
pub struct LlmTranslator<'a> {
    client: &'a dyn LlmClient,
    model: String,
}

impl<'a> LlmTranslator<'a> {
    pub fn new(client: &'a dyn LlmClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

impl Translator for LlmTranslator<'_> {
    fn translate(&self, text: &str) -> Result<String, TranslateError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let translated = self
            .client
            .generate(&self.model, text, TRANSLATION_SYSTEM_PROMPT)?;
        Ok(translated.trim().to_string())
    }
}

pub fn build_translator<'a>(
    config: &TranslationConfig,
    client: &'a dyn LlmClient,
    model: &str,
) -> Result<Box<dyn Translator + 'a>, TranslateError> {
    match config.mode {
        TranslationMode::None => Ok(Box::new(IdentityTranslator)),
        TranslationMode::Dictionary => {
            let path = config
                .dictionary_path
                .as_deref()
                .ok_or(TranslateError::MissingDictionary(config.mode))?;
            Ok(Box::new(DictionaryTranslator::load(path)?))
        }
        TranslationMode::Llm => Ok(Box::new(LlmTranslator::new(client, model))),
    }
}

/// Hebrew gender name to the report's English value.
pub fn translate_gender(gender: Option<&str>) -> &'static str {
    match gender.map(str::trim) {
        Some("זכר") => "Male",
        Some("נקבה") => "Female",
        _ => "Unknown",
    }
}

/// Nationality, religion (with ethnicity when the clinical texts name one)
/// and country of birth.
pub fn format_demography(
    translator: &dyn Translator,
    demography: &Demography,
    ethnicity: Option<&FieldValue>,
) -> String {
    let translate = |value: &Option<String>| -> Result<String, TranslateError> {
        match value.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => translator.translate(text),
            _ => Ok(String::new()),
        }
    };

    let result = (|| -> Result<String, TranslateError> {
        let nationality = translate(&demography.nationality)?;
        let religion = translate(&demography.religion)?;
        let country_of_birth = translate(&demography.country_of_birth)?;

        let religion_line = match ethnicity.and_then(FieldValue::as_text).map(str::trim) {
            Some(e) if !e.is_empty() && !e.eq_ignore_ascii_case(NONE_PLACEHOLDER) => {
                format!("Religion/Ethnicity: {religion}/{e}")
            }
            _ => format!("Religion: {religion}"),
        };

        Ok(format!(
            "Nationality: {nationality} \n{religion_line}\nCOB: {country_of_birth}"
        ))
    })();

    result.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Demography translation failed");
        TRANSLATION_ERROR.to_string()
    })
}

/// `paragraph: value` for every answered habit, translated and cleaned.
pub fn format_habits(translator: &dyn Translator, patient: &str, habits: &[HabitEntry]) -> String {
    let combined = habits
        .iter()
        .filter_map(|h| {
            h.value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| format!("{}: {v}", h.paragraph))
        })
        .collect::<Vec<_>>()
        .join("\n");

    if combined.trim().is_empty() {
        return NONE_PLACEHOLDER.to_string();
    }

    match translator.translate(&combined) {
        Ok(translated) => {
            let cleaned = clean_habits_text(&translated);
            if cleaned.is_empty() {
                NONE_PLACEHOLDER.to_string()
            } else {
                cleaned
            }
        }
        Err(e) => {
            tracing::error!(patient, error = %e, "Habits translation failed");
            TRANSLATION_ERROR.to_string()
        }
    }
}

/// Drop questionnaire form hints and normalise whitespace.
pub fn clean_habits_text(text: &str) -> String {
    let mut out = text.to_string();
    for hint in HABIT_FORM_HINTS {
        out = out.replace(hint, "");
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
