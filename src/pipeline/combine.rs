//! Recombination of chunked analyses into one response per entity.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use super::dispatch::{CallStats, DispatchOutcome};
use crate::llm::BatchMerger;

pub struct BatchCombiner<'a> {
    merger: &'a dyn BatchMerger,
}

impl<'a> BatchCombiner<'a> {
    pub fn new(merger: &'a dyn BatchMerger) -> Self {
        Self { merger }
    }

    /// Merge one entity's chunk responses.
    ///
    /// A single response is returned as-is without a model call. Failed
    /// chunks are dropped before merging; when every chunk failed the
    /// entity has no data. A failed merge also yields `None`.
    pub fn combine(
        &self,
        entity: &dyn fmt::Display,
        responses: &[Option<String>],
        stats: &mut CallStats,
    ) -> Option<String> {
        if responses.len() == 1 {
            return responses[0].clone();
        }

        let usable: Vec<&str> = responses.iter().filter_map(|r| r.as_deref()).collect();
        if usable.len() < responses.len() {
            tracing::warn!(
                entity = %entity,
                failed = responses.len() - usable.len(),
                total = responses.len(),
                "Dropping failed chunks before combining"
            );
        }

        match usable.len() {
            0 => {
                tracing::error!(entity = %entity, "No chunk produced a response");
                None
            }
            1 => Some(usable[0].to_string()),
            n => {
                let start = Instant::now();
                let result = self.merger.combine(&usable);
                let elapsed_ms = start.elapsed().as_millis() as u64;
                stats.sent += 1;

                match result {
                    Ok(merged) => {
                        tracing::info!(entity = %entity, chunks = n, elapsed_ms, "Chunks combined");
                        Some(merged)
                    }
                    Err(e) => {
                        stats.failed += 1;
                        tracing::error!(
                            entity = %entity,
                            chunks = n,
                            elapsed_ms,
                            error = %e,
                            "Combining chunks failed"
                        );
                        None
                    }
                }
            }
        }
    }

    /// Combine every entity of a dispatch outcome. Entities keep their key order.
    pub fn combine_all<K>(&self, outcome: DispatchOutcome<K>) -> (BTreeMap<K, Option<String>>, CallStats)
    where
        K: Ord + fmt::Display,
    {
        let mut stats = outcome.stats;
        let combined = outcome
            .responses
            .into_iter()
            .map(|(entity, responses)| {
                let merged = self.combine(&entity, &responses, &mut stats);
                (entity, merged)
            })
            .collect();
        (combined, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmReportAnalyzer, MockLlmClient, ReportKind};

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn single_response_is_identity_without_call() {
        let client = MockLlmClient::new("merged");
        let merger = LlmReportAnalyzer::new(&client, "m", ReportKind::Pathology);
        let combiner = BatchCombiner::new(&merger);
        let mut stats = CallStats::default();

        assert_eq!(combiner.combine(&"P1", &[some("only")], &mut stats), some("only"));
        assert_eq!(combiner.combine(&"P2", &[None], &mut stats), None);
        assert_eq!(client.call_count(), 0);
        assert_eq!(stats, CallStats::default());
    }

    #[test]
    fn multiple_responses_are_merged_in_order() {
        let client = MockLlmClient::new("merged");
        let merger = LlmReportAnalyzer::new(&client, "m", ReportKind::Pathology);
        let combiner = BatchCombiner::new(&merger);
        let mut stats = CallStats::default();

        let merged = combiner.combine(&"P1", &[some("one"), some("two")], &mut stats);

        assert_eq!(merged, some("merged"));
        assert_eq!(stats.sent, 1);
        let prompt = &client.calls()[0].prompt;
        assert!(prompt.find("one").unwrap() < prompt.find("two").unwrap());
        assert!(prompt.contains("--- Next Batch ---"));
    }

    #[test]
    fn failed_chunks_are_dropped() {
        let client = MockLlmClient::new("merged");
        let merger = LlmReportAnalyzer::new(&client, "m", ReportKind::Clinical);
        let combiner = BatchCombiner::new(&merger);
        let mut stats = CallStats::default();

        assert_eq!(
            combiner.combine(&"P1", &[None, some("survivor")], &mut stats),
            some("survivor")
        );
        assert_eq!(combiner.combine(&"P1", &[None, None], &mut stats), None);
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn merge_failure_yields_none() {
        let client = MockLlmClient::new("merged").fail_when("--- Next Batch ---");
        let merger = LlmReportAnalyzer::new(&client, "m", ReportKind::Clinical);
        let combiner = BatchCombiner::new(&merger);
        let mut stats = CallStats::default();

        assert_eq!(combiner.combine(&"P1", &[some("a"), some("b")], &mut stats), None);
        assert_eq!(stats, CallStats { sent: 1, failed: 1 });
    }

    #[test]
    fn combine_all_accumulates_stats() {
        let client = MockLlmClient::new("merged");
        let merger = LlmReportAnalyzer::new(&client, "m", ReportKind::Pathology);
        let combiner = BatchCombiner::new(&merger);

        let mut responses = BTreeMap::new();
        responses.insert("A".to_string(), vec![some("x"), some("y")]);
        responses.insert("B".to_string(), vec![some("z")]);
        let outcome = DispatchOutcome {
            responses,
            stats: CallStats { sent: 3, failed: 0 },
        };

        let (combined, stats) = combiner.combine_all(outcome);

        assert_eq!(combined["A"], some("merged"));
        assert_eq!(combined["B"], some("z"));
        assert_eq!(stats, CallStats { sent: 4, failed: 0 });
    }
}
