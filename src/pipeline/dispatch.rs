//! Per-entity analysis request dispatch.
//!
//! Every entity text becomes one request, or one request per chunk when it
//! exceeds the token budget. Requests are sent strictly one after another.
//! A failed call is recorded as a `None` response for that request only.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use chrono::NaiveDate;

use super::tokenize::{split_into_batches, TokenCounter};
use crate::llm::ReportAnalyzer;
use crate::models::PatientKey;

/// Suffix joining an entity key to its 1-based chunk number.
pub const BATCH_SUFFIX: &str = "_batch_";

/// Entity key for per-date analyses (one pathology date of one patient).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatedKey {
    pub patient: PatientKey,
    pub date: NaiveDate,
}

impl DatedKey {
    pub fn new(patient: &str, date: NaiveDate) -> Self {
        Self {
            patient: patient.to_string(),
            date,
        }
    }
}

impl fmt::Display for DatedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.patient, self.date.format("%Y-%m-%d"))
    }
}

/// One analysis call: the whole entity text or one of its chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRequest<K> {
    /// `key`, or `key_batch_{n}` for chunk `n` (1-based).
    pub request_id: String,
    pub entity: K,
    pub text: String,
}

/// Call counters reported in the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    pub sent: usize,
    pub failed: usize,
}

impl CallStats {
    pub fn add(&mut self, other: CallStats) {
        self.sent += other.sent;
        self.failed += other.failed;
    }
}

/// Raw responses grouped by entity, each list in chunk order.
#[derive(Debug, Clone)]
pub struct DispatchOutcome<K: Ord> {
    pub responses: BTreeMap<K, Vec<Option<String>>>,
    pub stats: CallStats,
}

impl<K: Ord> DispatchOutcome<K> {
    /// Number of chunks dispatched for `key` (0 when never dispatched).
    pub fn chunk_count(&self, key: &K) -> usize {
        self.responses.get(key).map_or(0, Vec::len)
    }
}

/// Build the requests for one entity, splitting only when over budget.
pub fn build_requests<K: Clone + fmt::Display>(
    entity: &K,
    text: &str,
    counter: &dyn TokenCounter,
    max_tokens: usize,
) -> Vec<ChunkRequest<K>> {
    if counter.count_tokens(text) <= max_tokens {
        return vec![ChunkRequest {
            request_id: entity.to_string(),
            entity: entity.clone(),
            text: text.to_string(),
        }];
    }

    split_into_batches(counter, text, max_tokens)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| ChunkRequest {
            request_id: format!("{entity}{BATCH_SUFFIX}{}", i + 1),
            entity: entity.clone(),
            text: chunk,
        })
        .collect()
}

/// Base entity id of a request id: everything before a trailing `_batch_N`.
pub fn base_key(request_id: &str) -> &str {
    match request_id.rfind(BATCH_SUFFIX) {
        Some(pos) => {
            let suffix = &request_id[pos + BATCH_SUFFIX.len()..];
            if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
                &request_id[..pos]
            } else {
                request_id
            }
        }
        None => request_id,
    }
}

/// Sends every entity's requests to one analysis endpoint.
pub struct Dispatcher<'a> {
    analyzer: &'a dyn ReportAnalyzer,
    counter: &'a dyn TokenCounter,
    max_tokens: usize,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        analyzer: &'a dyn ReportAnalyzer,
        counter: &'a dyn TokenCounter,
        max_tokens: usize,
    ) -> Self {
        Self {
            analyzer,
            counter,
            max_tokens,
        }
    }

    /// Dispatch all entity texts in key order.
    ///
    /// Blank texts are not sent; their entity is absent from the outcome.
    pub fn dispatch<K>(&self, texts: &BTreeMap<K, String>) -> DispatchOutcome<K>
    where
        K: Ord + Clone + fmt::Display,
    {
        let kind = self.analyzer.kind();
        let mut responses: BTreeMap<K, Vec<Option<String>>> = BTreeMap::new();
        let mut stats = CallStats::default();

        for (entity, text) in texts {
            if text.trim().is_empty() {
                tracing::warn!(entity = %entity, %kind, "Empty source text, nothing to analyze");
                continue;
            }

            let requests = build_requests(entity, text, self.counter, self.max_tokens);
            if requests.len() > 1 {
                tracing::info!(
                    entity = %entity,
                    %kind,
                    chunks = requests.len(),
                    "Text exceeds token budget, split into chunks"
                );
            }

            for request in requests {
                let response = self.send(&request);
                stats.sent += 1;
                if response.is_none() {
                    stats.failed += 1;
                }
                responses
                    .entry(request.entity)
                    .or_default()
                    .push(response);
            }
        }

        tracing::info!(
            %kind,
            entities = responses.len(),
            sent = stats.sent,
            failed = stats.failed,
            "Dispatch complete"
        );

        DispatchOutcome { responses, stats }
    }

    fn send<K: fmt::Display>(&self, request: &ChunkRequest<K>) -> Option<String> {
        let start = Instant::now();
        let result = self.analyzer.analyze(&request.text);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(response) => {
                tracing::info!(
                    entity = base_key(&request.request_id),
                    request_id = %request.request_id,
                    kind = %self.analyzer.kind(),
                    elapsed_ms,
                    "Analysis complete"
                );
                Some(response)
            }
            Err(e) => {
                tracing::error!(
                    entity = base_key(&request.request_id),
                    request_id = %request.request_id,
                    kind = %self.analyzer.kind(),
                    elapsed_ms,
                    error = %e,
                    "Analysis failed"
                );
                None
            }
        }
    }
}
