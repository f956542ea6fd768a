pub mod assemble;
pub mod combine;
pub mod dispatch;
pub mod format;
pub mod parser;
pub mod reconcile;
pub mod runner;
pub mod tokenize;

pub use assemble::*;
pub use combine::BatchCombiner;
pub use dispatch::{CallStats, ChunkRequest, DatedKey, DispatchOutcome, Dispatcher};
pub use parser::{extract, ParsedAnalysis};
pub use reconcile::{reconcile, FieldClass};
pub use runner::{PipelineError, PipelineRunner, RunReports, RunSummary};
pub use tokenize::{counter_from_config, HeuristicTokenCounter, TokenCounter, TokenizerError};
