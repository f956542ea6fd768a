//! PipelineRunner: orchestrates one batch run end to end.
//!
//! Registry → text preparation → dispatch/combine/parse for pathology and
//! clinical analyses → main report → optional per-date other-cancers
//! report → CSV files. Runs sequentially, one LLM call at a time.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use chrono::Local;
use thiserror::Error;
use uuid::Uuid;

use super::assemble::{Assembler, Report};
use super::combine::BatchCombiner;
use super::dispatch::{CallStats, Dispatcher};
use super::parser::{extract, ParsedAnalysis};
use super::tokenize::{TokenCounter, TokenizerError};
use crate::config::{ConfigError, RunConfig};
use crate::export::{ExportError, ReportWriter};
use crate::llm::{LlmClient, LlmError, LlmReportAnalyzer, ReportAnalyzer, ReportKind};
use crate::models::PatientKey;
use crate::sources::{
    build_cohort, prepare_clinical_texts, prepare_pathology_texts, InputBundle, SourceError,
    WindowMode,
};
use crate::translate::{TranslateError, Translator};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Source(#[from] SourceError),

    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),

    #[error("Translation setup error: {0}")]
    Translate(#[from] TranslateError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Reports produced by a run, before they are written.
#[derive(Debug, Clone)]
pub struct RunReports {
    pub main: Report,
    pub other_cancers: Option<Report>,
    pub skipped: Vec<PatientKey>,
    pub stats: CallStats,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub rows_written: usize,
    pub other_cancer_rows: usize,
    pub patients_skipped: usize,
    /// Analysis and combine calls, failed ones included.
    pub requests_sent: usize,
    pub requests_failed: usize,
    pub main_report: PathBuf,
    pub other_cancers_report: Option<PathBuf>,
    pub duration_ms: u64,
}

pub struct PipelineRunner<'a> {
    config: &'a RunConfig,
    client: &'a dyn LlmClient,
    counter: &'a dyn TokenCounter,
    translator: &'a dyn Translator,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(
        config: &'a RunConfig,
        client: &'a dyn LlmClient,
        counter: &'a dyn TokenCounter,
        translator: &'a dyn Translator,
    ) -> Self {
        Self {
            config,
            client,
            counter,
            translator,
        }
    }

    /// Analyze the bundle and write the report files.
    pub fn run(&self, bundle: &InputBundle) -> Result<RunSummary, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id);
        let _guard = span.enter();

        let start = Instant::now();
        let writer = ReportWriter::new(&self.config.output_dir, Local::now());

        let reports = self.build_reports(bundle);

        let main_report = writer.write_main(&reports.main)?;
        let other_cancers_report = match &reports.other_cancers {
            Some(report) => Some(writer.write_other_cancers(report)?),
            None => None,
        };

        let summary = RunSummary {
            run_id,
            rows_written: reports.main.rows.len(),
            other_cancer_rows: reports.other_cancers.as_ref().map_or(0, |r| r.rows.len()),
            patients_skipped: reports.skipped.len(),
            requests_sent: reports.stats.sent,
            requests_failed: reports.stats.failed,
            main_report,
            other_cancers_report,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        tracing::info!(
            rows = summary.rows_written,
            other_cancer_rows = summary.other_cancer_rows,
            skipped = summary.patients_skipped,
            sent = summary.requests_sent,
            failed = summary.requests_failed,
            duration_ms = summary.duration_ms,
            "Pipeline run complete"
        );
        Ok(summary)
    }

    /// Every step except writing. Per-patient failures degrade the rows,
    /// they never abort the run.
    pub fn build_reports(&self, bundle: &InputBundle) -> RunReports {
        let cohort = build_cohort(bundle);

        let step = Instant::now();
        let pathology_texts = prepare_pathology_texts(
            &bundle.pathology,
            &cohort.index,
            self.config.pathology_window_days,
            WindowMode::InWindow,
        );
        let clinical_texts = prepare_clinical_texts(
            &bundle.clinical_notes,
            &cohort.index,
            self.config.clinical_window_months,
            &self.config.excluded_note_categories,
        );
        tracing::info!(
            elapsed_ms = step.elapsed().as_millis() as u64,
            "Analysis texts prepared"
        );

        let model = self.config.llm.model.as_str();
        let pathology = LlmReportAnalyzer::new(self.client, model, ReportKind::Pathology);
        let clinical = LlmReportAnalyzer::new(self.client, model, ReportKind::Clinical);

        let mut stats = CallStats::default();
        let pathology_analyses =
            self.analyze(&pathology, &pathology_texts.per_patient, &mut stats);
        let clinical_analyses = self.analyze(&clinical, &clinical_texts, &mut stats);

        let assembler = Assembler::new(self.translator);
        let main = assembler.assemble_main(&cohort, &pathology_analyses, &clinical_analyses);

        let other_cancers = if self.config.other_cancers_report {
            let other_texts = prepare_pathology_texts(
                &bundle.pathology,
                &cohort.index,
                self.config.pathology_window_days,
                WindowMode::OutsideWindow,
            );
            let per_date = self.analyze(&pathology, &other_texts.per_date, &mut stats);
            Some(assembler.assemble_other_cancers(&cohort, &per_date))
        } else {
            None
        };

        RunReports {
            main: main.report,
            other_cancers,
            skipped: main.skipped,
            stats,
        }
    }

    /// Dispatch, combine and parse every entity text with one analyzer.
    ///
    /// Every dispatched entity gets an analysis, empty when its calls failed.
    fn analyze<K>(
        &self,
        analyzer: &LlmReportAnalyzer<'_>,
        texts: &BTreeMap<K, String>,
        stats: &mut CallStats,
    ) -> BTreeMap<K, ParsedAnalysis>
    where
        K: Ord + Clone + fmt::Display,
    {
        let start = Instant::now();
        let outcome =
            Dispatcher::new(analyzer, self.counter, self.config.max_tokens).dispatch(texts);
        let (combined, step_stats) = BatchCombiner::new(analyzer).combine_all(outcome);
        stats.add(step_stats);

        let analyses: BTreeMap<K, ParsedAnalysis> = combined
            .into_iter()
            .map(|(entity, raw)| {
                let parsed = extract(&entity.to_string(), raw.as_deref());
                (entity, parsed)
            })
            .collect();

        tracing::info!(
            kind = %analyzer.kind(),
            entities = analyses.len(),
            sent = step_stats.sent,
            failed = step_stats.failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Analysis step complete"
        );
        analyses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::prompt::{
        CLINICAL_SYSTEM_PROMPT, COMBINE_SYSTEM_PROMPT, PATHOLOGY_SYSTEM_PROMPT,
    };
    use crate::llm::MockLlmClient;
    use crate::pipeline::assemble::{
        COL_DATE_OF_DIAGNOSIS, COL_FAMILY_HISTORY, COL_OC, COL_PTNM, COL_STAINED_FOR,
        COL_TYPE_OF_CANCER,
    };
    use crate::pipeline::tokenize::HeuristicTokenCounter;
    use crate::translate::IdentityTranslator;
    use serde_json::json;

    const CHUNK_RESPONSE: &str = "Chunk summary\n```json\n{\"general_cancer_type\": \"Breast Cancer\"}\n```";

    const COMBINED_RESPONSE: &str = r#"Pathology summary
```json
{
  "general_cancer_type": "Breast Cancer",
  "ptnm_results": "pT2N0",
  "tissues_stained_for": ["ER", "PR"]
}
```"#;

    const CLINICAL_RESPONSE: &str = r#"Clinical summary
```json
{
  "general_cancer_type": "Lung Cancer",
  "ptnm_results": "pT2N1",
  "family_history": {
    "maternal": [
      {"relative": "", "condition": "", "age_of_onset": "", "mutations": null}
    ],
    "paternal": [
      {"relative": "Father", "condition": "Colon cancer", "age_of_onset": "", "mutations": null},
      {"relative": "", "condition": "", "age_of_onset": "", "mutations": null}
    ]
  }
}
```"#;

    fn config(output_dir: PathBuf) -> RunConfig {
        RunConfig {
            // Two chunks for P1's pathology text, one for everything else.
            max_tokens: 15,
            output_dir,
            other_cancers_report: false,
            ..RunConfig::default()
        }
    }

    fn client() -> MockLlmClient {
        MockLlmClient::new(CHUNK_RESPONSE)
            .respond_when("summarization assistant", COMBINED_RESPONSE)
            .respond_when("fatigue", CLINICAL_RESPONSE)
    }

    fn bundle() -> InputBundle {
        serde_json::from_value(json!({
            "patients": [
                {"id": "P1", "oc": "OC-1", "procedure_date": "31.10.22"},
                {"id": "P2", "oc": "OC-2", "procedure_date": "31.10.22"}
            ],
            "pathology": [
                {
                    "id": "P1", "owner_ref": "R1", "lab_test_date": "2022-10-31",
                    "result_desc": "Biopsy",
                    "result_text": "Invasive ductal carcinoma grade two"
                },
                {
                    "id": "P1", "owner_ref": "R0", "lab_test_date": "2019-03-01",
                    "result_desc": "Biopsy", "result_text": "Benign"
                },
                {
                    "id": "P2", "owner_ref": "R2", "lab_test_date": "2022-11-01",
                    "result_desc": "Biopsy", "result_text": "Benign"
                }
            ],
            "clinical_notes": [
                {"id": "P1", "date": "2022-10-01", "category": "doctor", "text": "Patient reports fatigue"}
            ]
        }))
        .unwrap()
    }

    fn calls_with_system(client: &MockLlmClient, system: &str) -> usize {
        client.calls().iter().filter(|c| c.system == system).count()
    }

    #[test]
    fn chunked_pathology_is_combined_into_one_row() {
        let client = client();
        let config = config(PathBuf::from("unused"));
        let counter = HeuristicTokenCounter::new(config.chars_per_token);
        let runner = PipelineRunner::new(&config, &client, &counter, &IdentityTranslator);

        let mut bundle = bundle();
        bundle.patients.truncate(1);
        let reports = runner.build_reports(&bundle);

        assert_eq!(calls_with_system(&client, PATHOLOGY_SYSTEM_PROMPT), 2);
        assert_eq!(calls_with_system(&client, CLINICAL_SYSTEM_PROMPT), 1);
        assert_eq!(calls_with_system(&client, COMBINE_SYSTEM_PROMPT), 1);
        assert_eq!(reports.stats.sent, 4);
        assert_eq!(reports.stats.failed, 0);

        assert_eq!(reports.main.rows.len(), 1);
        let row = &reports.main.rows[0];
        assert_eq!(row.get(COL_OC), Some("OC-1"));
        assert_eq!(row.get(COL_TYPE_OF_CANCER), Some("Breast Cancer"));
        assert_eq!(
            row.get(COL_PTNM),
            Some("Pathology report: pT2N0\n\nMedical texts: pT2N1")
        );
        assert_eq!(row.get(COL_STAINED_FOR), Some("ER, PR"));
    }

    #[test]
    fn patient_without_clinical_analysis_is_skipped() {
        let client = client();
        let config = config(PathBuf::from("unused"));
        let counter = HeuristicTokenCounter::new(config.chars_per_token);
        let runner = PipelineRunner::new(&config, &client, &counter, &IdentityTranslator);

        let reports = runner.build_reports(&bundle());

        assert_eq!(reports.main.rows.len(), 1);
        assert_eq!(reports.skipped, vec!["P2".to_string()]);
        assert!(reports.other_cancers.is_none());
    }

    #[test]
    fn family_history_sides_render_by_content() {
        let client = client();
        let config = config(PathBuf::from("unused"));
        let counter = HeuristicTokenCounter::new(config.chars_per_token);
        let runner = PipelineRunner::new(&config, &client, &counter, &IdentityTranslator);

        let reports = runner.build_reports(&bundle());
        let history = reports.main.rows[0].get(COL_FAMILY_HISTORY).unwrap();

        assert!(history.contains("Maternal: None"));
        assert!(history.contains("Paternal:\n  Relative: Father\n  Condition: Colon cancer"));
        assert_eq!(history.matches("Relative:").count(), 2);
    }

    #[test]
    fn failed_calls_degrade_without_aborting() {
        let client = MockLlmClient::new(CHUNK_RESPONSE)
            .fail_when("summarization assistant")
            .respond_when("fatigue", CLINICAL_RESPONSE);
        let config = config(PathBuf::from("unused"));
        let counter = HeuristicTokenCounter::new(config.chars_per_token);
        let runner = PipelineRunner::new(&config, &client, &counter, &IdentityTranslator);

        let reports = runner.build_reports(&bundle());

        assert_eq!(reports.stats.failed, 1);
        let row = &reports.main.rows[0];
        // Pathology merge failed: clinical values fill in.
        assert_eq!(row.get(COL_TYPE_OF_CANCER), Some("Lung Cancer"));
        assert_eq!(row.get(COL_STAINED_FOR), Some("None"));
    }

    #[test]
    fn run_writes_both_reports() {
        let dir = tempfile::tempdir().unwrap();
        let client = client();
        let config = RunConfig {
            other_cancers_report: true,
            ..config(dir.path().to_path_buf())
        };
        let counter = HeuristicTokenCounter::new(config.chars_per_token);
        let runner = PipelineRunner::new(&config, &client, &counter, &IdentityTranslator);

        let summary = runner.run(&bundle()).unwrap();

        assert_eq!(summary.rows_written, 1);
        assert_eq!(summary.patients_skipped, 1);
        assert_eq!(summary.other_cancer_rows, 1);
        assert!(summary.main_report.exists());
        let other_path = summary.other_cancers_report.unwrap();
        assert!(other_path.to_string_lossy().ends_with(" other_cancers.csv"));

        let mut reader = csv::Reader::from_path(&other_path).unwrap();
        let headers = reader.headers().unwrap().clone();
        let date_col = headers.iter().position(|h| h == COL_DATE_OF_DIAGNOSIS).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(&rows[0][0], "OC-1");
        assert_eq!(&rows[0][date_col], "2019-03-01");
    }
}
