//! Collaborator data as loaded from the input bundle, plus the preparation
//! of the two analysis texts (pathology reports and clinical notes).
//!
//! Spreadsheet parsing happens upstream; the bundle carries the already
//! extracted rows, one JSON array per source.

pub mod bundle;
pub mod clean;
pub mod clinical;
pub mod pathology;

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bundle::build_cohort;
pub use clinical::prepare_clinical_texts;
pub use pathology::{prepare_pathology_texts, PathologyTexts, WindowMode};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Cannot read input bundle {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input bundle JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid date: {0:?}")]
    InvalidDate(String),
}

/// Patient index row. `procedure_date` is the raw cell text (`dd.mm.yy`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRow {
    pub id: String,
    #[serde(default)]
    pub oc: String,
    #[serde(default)]
    pub procedure_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemographyRow {
    pub id: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub death_date: Option<NaiveDate>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub religion: Option<String>,
    #[serde(default)]
    pub country_of_birth: Option<String>,
}

/// One questionnaire answer. Several rows per paragraph over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitRow {
    pub id: String,
    pub paragraph: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub recorded_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Icd9Row {
    pub id: String,
    pub pathology: String,
    #[serde(default)]
    pub first_diagnosed: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcdoRow {
    pub id: String,
    pub cancer_name: String,
    #[serde(default)]
    pub first_diagnosed: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicineRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub issued_on: Option<NaiveDate>,
}

/// One pathology result line. Lines of one report share an `owner_ref`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathologyRow {
    pub id: String,
    pub owner_ref: String,
    #[serde(default)]
    pub lab_test_date: Option<NaiveDate>,
    #[serde(default)]
    pub result_desc: Option<String>,
    #[serde(default)]
    pub result_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalNoteRow {
    pub id: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// Every collaborator's rows for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputBundle {
    pub patients: Vec<PatientRow>,
    pub demography: Vec<DemographyRow>,
    pub habits: Vec<HabitRow>,
    pub icd9: Vec<Icd9Row>,
    pub icdo: Vec<IcdoRow>,
    pub medicines: Vec<MedicineRow>,
    pub pathology: Vec<PathologyRow>,
    pub clinical_notes: Vec<ClinicalNoteRow>,
}

impl InputBundle {
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bundle: Self = serde_json::from_str(&raw)?;
        tracing::info!(
            patients = bundle.patients.len(),
            pathology_rows = bundle.pathology.len(),
            clinical_notes = bundle.clinical_notes.len(),
            "Input bundle loaded from {}",
            path.display()
        );
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_default_to_empty() {
        let bundle: InputBundle =
            serde_json::from_str(r#"{"patients": [{"id": "P1", "oc": "OC-1"}]}"#).unwrap();
        assert_eq!(bundle.patients.len(), 1);
        assert!(bundle.patients[0].procedure_date.is_none());
        assert!(bundle.pathology.is_empty());
        assert!(bundle.clinical_notes.is_empty());
    }

    #[test]
    fn load_reads_dates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        std::fs::write(
            &path,
            r#"{"medicines": [{"id": "P1", "name": "Tamoxifen", "dosage": "20mg", "issued_on": "2022-03-01"}]}"#,
        )
        .unwrap();

        let bundle = InputBundle::load(&path).unwrap();
        assert_eq!(
            bundle.medicines[0].issued_on,
            NaiveDate::from_ymd_opt(2022, 3, 1)
        );
    }

    #[test]
    fn load_reports_missing_file() {
        let err = InputBundle::load(Path::new("/no/such/bundle.json")).unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(InputBundle::load(&path), Err(SourceError::Json(_))));
    }
}
