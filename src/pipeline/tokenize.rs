//! Token counting and token-budget chunking.
//!
//! Splitting works on whitespace-delimited words only. Words are never
//! split, so a single word larger than the budget becomes its own
//! oversize batch.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::RunConfig;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Tokenizer file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Tokenizer load failed: {0}")]
    Load(String),

    #[error("Tokenizer file {0} configured but the hf-tokenizer feature is disabled")]
    FeatureDisabled(PathBuf),
}

/// Measures text size in model tokens. Must be deterministic.
pub trait TokenCounter {
    fn count_tokens(&self, text: &str) -> usize;
}

/// Character-ratio estimate, summed per word.
///
/// Because the count of a text is the sum of its words' counts, a batch
/// assembled by [`split_into_batches`] never exceeds the budget unless it
/// holds a single oversize word.
pub struct HeuristicTokenCounter {
    chars_per_token: usize,
}

impl HeuristicTokenCounter {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for HeuristicTokenCounter {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenCounter for HeuristicTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace()
            .map(|word| word.chars().count().div_ceil(self.chars_per_token))
            .sum()
    }
}

#[cfg(feature = "hf-tokenizer")]
mod hf {
    use std::path::Path;

    use super::{HeuristicTokenCounter, TokenCounter, TokenizerError};

    /// Exact counts from a HuggingFace `tokenizer.json`.
    pub struct HfTokenCounter {
        tokenizer: tokenizers::Tokenizer,
        fallback: HeuristicTokenCounter,
    }

    impl HfTokenCounter {
        pub fn load(path: &Path) -> Result<Self, TokenizerError> {
            if !path.exists() {
                return Err(TokenizerError::FileNotFound(path.to_path_buf()));
            }
            let tokenizer = tokenizers::Tokenizer::from_file(path)
                .map_err(|e| TokenizerError::Load(e.to_string()))?;
            tracing::info!("Tokenizer loaded from {}", path.display());
            Ok(Self {
                tokenizer,
                fallback: HeuristicTokenCounter::default(),
            })
        }
    }

    impl TokenCounter for HfTokenCounter {
        fn count_tokens(&self, text: &str) -> usize {
            match self.tokenizer.encode(text, false) {
                Ok(encoding) => encoding.len(),
                Err(e) => {
                    tracing::warn!(error = %e, "Tokenizer encode failed, using estimate");
                    self.fallback.count_tokens(text)
                }
            }
        }
    }
}

#[cfg(feature = "hf-tokenizer")]
pub use hf::HfTokenCounter;

/// Pick the counter the run configuration asks for.
pub fn counter_from_config(config: &RunConfig) -> Result<Box<dyn TokenCounter>, TokenizerError> {
    match config.tokenizer_path.as_deref() {
        Some(path) => load_tokenizer_file(path),
        None => Ok(Box::new(HeuristicTokenCounter::new(config.chars_per_token))),
    }
}

#[cfg(feature = "hf-tokenizer")]
fn load_tokenizer_file(path: &Path) -> Result<Box<dyn TokenCounter>, TokenizerError> {
    Ok(Box::new(HfTokenCounter::load(path)?))
}

#[cfg(not(feature = "hf-tokenizer"))]
fn load_tokenizer_file(path: &Path) -> Result<Box<dyn TokenCounter>, TokenizerError> {
    Err(TokenizerError::FeatureDisabled(path.to_path_buf()))
}

/// Split `text` into batches of at most `max_tokens` tokens, in source order.
///
/// A text already within budget is returned unchanged as the only batch.
/// Otherwise words are accumulated greedily and re-joined with single spaces.
pub fn split_into_batches(
    counter: &dyn TokenCounter,
    text: &str,
    max_tokens: usize,
) -> Vec<String> {
    if counter.count_tokens(text) <= max_tokens {
        return vec![text.to_string()];
    }

    let mut batches = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0;

    for word in text.split_whitespace() {
        let word_tokens = counter.count_tokens(word);

        if current_tokens + word_tokens > max_tokens && !current.is_empty() {
            batches.push(current.join(" "));
            current.clear();
            current_tokens = 0;
        }

        current.push(word);
        current_tokens += word_tokens;
    }

    if !current.is_empty() {
        batches.push(current.join(" "));
    }

    batches
}
