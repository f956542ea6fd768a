//! CSV output of the assembled reports.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::pipeline::Report;

pub const REPORT_PREFIX: &str = "patient_metadata";
pub const OTHER_CANCERS_SUFFIX: &str = "other_cancers";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Writes the report files of one run. Both files share the run timestamp.
pub struct ReportWriter {
    output_dir: PathBuf,
    stamp: String,
}

impl ReportWriter {
    pub fn new(output_dir: &Path, started_at: DateTime<Local>) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            stamp: started_at.format("%Y%m%d_%H%M%S").to_string(),
        }
    }

    pub fn main_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{REPORT_PREFIX} {}.csv", self.stamp))
    }

    pub fn other_cancers_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{REPORT_PREFIX} {} {OTHER_CANCERS_SUFFIX}.csv", self.stamp))
    }

    pub fn write_main(&self, report: &Report) -> Result<PathBuf, ExportError> {
        let path = self.main_path();
        self.write(&path, report)?;
        Ok(path)
    }

    pub fn write_other_cancers(&self, report: &Report) -> Result<PathBuf, ExportError> {
        let path = self.other_cancers_path();
        self.write(&path, report)?;
        Ok(path)
    }

    fn write(&self, path: &Path, report: &Report) -> Result<(), ExportError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| ExportError::Io {
            path: self.output_dir.clone(),
            source,
        })?;

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(report.columns)?;
        for row in &report.rows {
            writer.write_record(row.values())?;
        }
        writer.flush().map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!(
            path = %path.display(),
            rows = report.rows.len(),
            "Report written"
        );
        Ok(())
    }
}
