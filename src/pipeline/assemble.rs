//! Report rows: patient data joined with the reconciled analysis fields.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use super::dispatch::DatedKey;
use super::format::{
    format_allergies, format_family_history, format_optional, format_procedures,
    format_stained_for, format_tissue_data, or_placeholder,
};
use super::parser::ParsedAnalysis;
use super::reconcile::{reconcile, FieldClass};
use crate::models::{
    Cohort, IcdoEntry, Icd9Entry, MedicineOrder, PatientKey, PatientRecord, NONE_PLACEHOLDER,
};
use crate::translate::{format_demography, format_habits, translate_gender, Translator};

// ═══════════════════════════════════════════
// Columns
// ═══════════════════════════════════════════

pub const COL_OC: &str = "OC";
pub const COL_TYPE_OF_CANCER: &str = "TYPE OF CANCER";
pub const COL_YEAR_OF_BIRTH: &str = "YEAR OF BIRTH";
pub const COL_DATE_OF_DEATH: &str = "DATE OF DEATH";
pub const COL_SEX: &str = "SEX";
pub const COL_DEMOGRAPHY: &str = "DEMOGRAPHY";
pub const COL_PROCEDURE_DATE: &str = "DATE OF PROCEDURE/SAMPLE ARRIVAL";
pub const COL_DATE_OF_DIAGNOSIS: &str = "DATE OF DIAGNOSIS";
pub const COL_FAMILY_HISTORY: &str = "FAMILY HISTORY";
pub const COL_PAST_PATHOLOGIES: &str = "PAST PATHOLOGIES";
pub const COL_ICDO_DIAGNOSIS: &str = "ICD-O DIAGNOSIS";
pub const COL_ALLERGIES: &str = "ALLERGIES";
pub const COL_HABITS: &str = "HABITS";
pub const COL_TYPE_OF_PROCEDURE: &str = "TYPE OF PROCEDURE";
pub const COL_DIAGNOSIS: &str = "DIAGNOSIS";
pub const COL_METASTASES: &str = "METASTASES";
pub const COL_STAGE_GRADE: &str = "TUMOR STAGE/GRADE";
pub const COL_PTNM: &str = "PTNM/PTMN";
pub const COL_TREATMENTS_PRIOR: &str = "TREATMENTS PREVIOUS TO SAMPLE ARRIVAL";
pub const COL_TREATMENTS_POST: &str = "TREATMENTS POST TO SAMPLE ARRIVAL";
pub const COL_STAINED_FOR: &str = "STAINED FOR";
pub const COL_IMMUNOSTAINING: &str = "IMMUNOSTAINING RESULTS";
pub const COL_MMR: &str = "IMMUNISTAININGS FOR MMR";
pub const COL_TISSUES: &str = "TISSUES EXAMINED/STAINED";
pub const COL_PDL1: &str = "PDL1";
pub const COL_TMB: &str = "TUMOR BURDEN TMB";
pub const COL_CANCER_CELLS: &str = "% CANCER CELLS";
pub const COL_CEA: &str = "CEA";
pub const COL_METADATA: &str = "METADATA";
pub const COL_COMMENTS: &str = "COMMENTS";
pub const COL_LLM_OUTPUT: &str = "LLM OUTPUT";

pub const MAIN_COLUMNS: [&str; 30] = [
    COL_OC,
    COL_TYPE_OF_CANCER,
    COL_YEAR_OF_BIRTH,
    COL_DATE_OF_DEATH,
    COL_SEX,
    COL_DEMOGRAPHY,
    COL_PROCEDURE_DATE,
    COL_FAMILY_HISTORY,
    COL_PAST_PATHOLOGIES,
    COL_ICDO_DIAGNOSIS,
    COL_ALLERGIES,
    COL_HABITS,
    COL_TYPE_OF_PROCEDURE,
    COL_DIAGNOSIS,
    COL_METASTASES,
    COL_STAGE_GRADE,
    COL_PTNM,
    COL_TREATMENTS_PRIOR,
    COL_TREATMENTS_POST,
    COL_STAINED_FOR,
    COL_IMMUNOSTAINING,
    COL_MMR,
    COL_TISSUES,
    COL_PDL1,
    COL_TMB,
    COL_CANCER_CELLS,
    COL_CEA,
    COL_METADATA,
    COL_COMMENTS,
    COL_LLM_OUTPUT,
];

pub const OTHER_CANCERS_COLUMNS: [&str; 21] = [
    COL_OC,
    COL_TYPE_OF_CANCER,
    COL_DATE_OF_DIAGNOSIS,
    COL_TYPE_OF_PROCEDURE,
    COL_DIAGNOSIS,
    COL_METASTASES,
    COL_STAGE_GRADE,
    COL_PTNM,
    COL_TREATMENTS_PRIOR,
    COL_TREATMENTS_POST,
    COL_STAINED_FOR,
    COL_IMMUNOSTAINING,
    COL_MMR,
    COL_TISSUES,
    COL_PDL1,
    COL_TMB,
    COL_CANCER_CELLS,
    COL_CEA,
    COL_METADATA,
    COL_COMMENTS,
    COL_LLM_OUTPUT,
];

// JSON keys of the analysis blocks.
const KEY_CANCER_TYPE: &str = "general_cancer_type";
const KEY_DIAGNOSIS: &str = "diagnosis_or_type_of_cancer";
const KEY_PROCEDURES: &str = "type_of_procedure_performed";
const KEY_METASTASES: &str = "metastases";
const KEY_STAGE_GRADE: &str = "tumor_stage_or_grade";
const KEY_PTNM: &str = "ptnm_results";
const KEY_STAINED_FOR: &str = "tissues_stained_for";
const KEY_IMMUNOSTAINING: &str = "immunostaining_results";
const KEY_MMR: &str = "immunostaining_for_mmr";
const KEY_TISSUES: &str = "tissues_examined_and_stained";
const KEY_PDL1: &str = "pdl1";
const KEY_TMB: &str = "tumor_burden_tmb";
const KEY_CANCER_CELLS: &str = "percentage_of_cancer_cells_stained_for_pdl1";
const KEY_CEA: &str = "cea";
const KEY_METADATA: &str = "genetic_metadata";
const KEY_COMMENTS: &str = "comments";
const KEY_ETHNICITY: &str = "ethnicity";
const KEY_FAMILY_HISTORY: &str = "family_history";
const KEY_ALLERGIES: &str = "allergies";

// ═══════════════════════════════════════════
// Records
// ═══════════════════════════════════════════

/// One output row. Holds a value for every declared column.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRecord {
    columns: &'static [&'static str],
    values: Vec<String>,
}

impl ReconciledRecord {
    pub fn columns(&self) -> &'static [&'static str] {
        self.columns
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| *c == column)
            .map(|i| self.values[i].as_str())
    }
}

/// Collects cell values; columns never set become the placeholder.
pub struct RecordBuilder {
    entity: String,
    columns: &'static [&'static str],
    values: Vec<Option<String>>,
}

impl RecordBuilder {
    pub fn new(entity: &str, columns: &'static [&'static str]) -> Self {
        Self {
            entity: entity.to_string(),
            columns,
            values: vec![None; columns.len()],
        }
    }

    /// Blank values collapse to the placeholder.
    pub fn set(&mut self, column: &str, value: impl Into<String>) -> &mut Self {
        self.put(column, or_placeholder(value))
    }

    /// Store the value verbatim, blank allowed.
    pub fn set_raw(&mut self, column: &str, value: impl Into<String>) -> &mut Self {
        self.put(column, value.into())
    }

    fn put(&mut self, column: &str, value: String) -> &mut Self {
        match self.columns.iter().position(|c| *c == column) {
            Some(i) => self.values[i] = Some(value),
            None => tracing::warn!(entity = %self.entity, column, "Unknown report column"),
        }
        self
    }

    pub fn finish(self) -> ReconciledRecord {
        let values = self
            .columns
            .iter()
            .zip(self.values)
            .map(|(column, value)| {
                value.unwrap_or_else(|| {
                    tracing::warn!(entity = %self.entity, column, "Column not filled, using placeholder");
                    NONE_PLACEHOLDER.to_string()
                })
            })
            .collect();
        ReconciledRecord {
            columns: self.columns,
            values,
        }
    }
}

/// A finished table: header plus rows.
#[derive(Debug, Clone)]
pub struct Report {
    pub columns: &'static [&'static str],
    pub rows: Vec<ReconciledRecord>,
}

/// Main report plus the patients left out of it.
#[derive(Debug, Clone)]
pub struct MainReport {
    pub report: Report,
    pub skipped: Vec<PatientKey>,
}

// ═══════════════════════════════════════════
// Patient field helpers
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MedicineWindow {
    /// Issued strictly before the reference date.
    Prior,
    /// Issued on or after the reference date.
    Post,
}

/// `"{name}, {dosage} ({dd-mm-YYYY})"` for each order in the window.
pub fn format_medicines_by_date(
    medicines: &[MedicineOrder],
    reference: Option<NaiveDate>,
    window: MedicineWindow,
) -> String {
    let Some(reference) = reference else {
        return NONE_PLACEHOLDER.to_string();
    };
    let entries: Vec<String> = medicines
        .iter()
        .filter(|m| match (m.issued_on, window) {
            (Some(issued), MedicineWindow::Prior) => issued < reference,
            (Some(issued), MedicineWindow::Post) => issued >= reference,
            (None, _) => false,
        })
        .map(|m| format!("{}, {} ({})", m.name, m.dosage, m.issued_on_string()))
        .collect();
    or_placeholder(entries.join(", "))
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map_or_else(
        || NONE_PLACEHOLDER.to_string(),
        |d| d.format("%Y-%m-%d").to_string(),
    )
}

fn name_with_date(name: &str, date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => format!("{name} ({})", d.format("%Y-%m-%d")),
        None => name.to_string(),
    }
}

pub fn format_past_pathologies(entries: &[Icd9Entry]) -> String {
    or_placeholder(
        entries
            .iter()
            .map(|e| name_with_date(&e.pathology, e.first_diagnosed))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

pub fn format_icdo(entry: Option<&IcdoEntry>) -> String {
    entry.map_or_else(
        || NONE_PLACEHOLDER.to_string(),
        |e| or_placeholder(name_with_date(&e.cancer_name, e.first_diagnosed)),
    )
}

/// Free text and pretty JSON of each analysis, in the given order.
pub fn format_llm_output(analyses: &[&ParsedAnalysis]) -> String {
    analyses
        .iter()
        .map(|a| format!("{}\n{}", a.free_text, a.structured.to_pretty_json()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ═══════════════════════════════════════════
// Assembly
// ═══════════════════════════════════════════

pub struct Assembler<'a> {
    translator: &'a dyn Translator,
}

impl<'a> Assembler<'a> {
    pub fn new(translator: &'a dyn Translator) -> Self {
        Self { translator }
    }

    /// One row per indexed patient with both analyses.
    pub fn assemble_main(
        &self,
        cohort: &Cohort,
        pathology: &BTreeMap<PatientKey, ParsedAnalysis>,
        clinical: &BTreeMap<PatientKey, ParsedAnalysis>,
    ) -> MainReport {
        let mut rows = Vec::new();
        let mut skipped = Vec::new();

        for entry in &cohort.index {
            let (Some(p), Some(c)) = (pathology.get(&entry.id), clinical.get(&entry.id)) else {
                tracing::warn!(
                    patient = %entry.id,
                    has_pathology = pathology.contains_key(&entry.id),
                    has_clinical = clinical.contains_key(&entry.id),
                    "Patient skipped, analysis missing"
                );
                skipped.push(entry.id.clone());
                continue;
            };
            let Some(record) = cohort.record(&entry.id) else {
                skipped.push(entry.id.clone());
                continue;
            };
            rows.push(self.main_row(record, p, c));
        }

        tracing::info!(rows = rows.len(), skipped = skipped.len(), "Main report assembled");
        MainReport {
            report: Report {
                columns: &MAIN_COLUMNS,
                rows,
            },
            skipped,
        }
    }

    fn main_row(
        &self,
        record: &PatientRecord,
        pathology: &ParsedAnalysis,
        clinical: &ParsedAnalysis,
    ) -> ReconciledRecord {
        let p = &pathology.structured;
        let c = &clinical.structured;
        let demography = record.demography.as_ref();

        let mut row = RecordBuilder::new(&record.key, &MAIN_COLUMNS);
        row.set_raw(COL_OC, record.oc.as_str())
            .set(
                COL_TYPE_OF_CANCER,
                reconcile(FieldClass::SourcePriority, p.get(KEY_CANCER_TYPE), c.get(KEY_CANCER_TYPE)),
            )
            .set(
                COL_YEAR_OF_BIRTH,
                demography
                    .and_then(|d| d.birth_date)
                    .map(|d| d.year().to_string())
                    .unwrap_or_default(),
            )
            .set(COL_DATE_OF_DEATH, format_date(demography.and_then(|d| d.death_date)))
            .set(
                COL_SEX,
                translate_gender(demography.and_then(|d| d.gender.as_deref())),
            )
            .set(
                COL_DEMOGRAPHY,
                demography.map_or_else(
                    || NONE_PLACEHOLDER.to_string(),
                    |d| format_demography(self.translator, d, c.get(KEY_ETHNICITY)),
                ),
            )
            .set(COL_PROCEDURE_DATE, format_date(record.procedure_date))
            .set(COL_FAMILY_HISTORY, format_family_history(c.get(KEY_FAMILY_HISTORY)))
            .set(COL_PAST_PATHOLOGIES, format_past_pathologies(&record.icd9))
            .set(COL_ICDO_DIAGNOSIS, format_icdo(record.icdo.as_ref()))
            .set(COL_ALLERGIES, format_allergies(c.get(KEY_ALLERGIES)))
            .set(
                COL_HABITS,
                format_habits(self.translator, &record.key, &record.habits),
            )
            .set(
                COL_METASTASES,
                reconcile(FieldClass::DualLabeled, p.get(KEY_METASTASES), c.get(KEY_METASTASES)),
            )
            .set(
                COL_STAGE_GRADE,
                reconcile(FieldClass::StageGrade, p.get(KEY_STAGE_GRADE), c.get(KEY_STAGE_GRADE)),
            )
            .set(
                COL_PTNM,
                reconcile(FieldClass::DualLabeled, p.get(KEY_PTNM), c.get(KEY_PTNM)),
            )
            .set(
                COL_METADATA,
                reconcile(FieldClass::DualLabeled, p.get(KEY_METADATA), c.get(KEY_METADATA)),
            )
            .set(COL_LLM_OUTPUT, format_llm_output(&[pathology, clinical]));

        self.fill_pathology_columns(&mut row, pathology, record);
        row.finish()
    }

    /// Columns read from the pathology analysis alone, shared by both reports.
    fn fill_pathology_columns(
        &self,
        row: &mut RecordBuilder,
        pathology: &ParsedAnalysis,
        record: &PatientRecord,
    ) {
        let p = &pathology.structured;
        row.set(COL_TYPE_OF_PROCEDURE, format_procedures(p.get(KEY_PROCEDURES)))
            .set(COL_DIAGNOSIS, format_optional(p.get(KEY_DIAGNOSIS)))
            .set(
                COL_TREATMENTS_PRIOR,
                format_medicines_by_date(&record.medicines, record.procedure_date, MedicineWindow::Prior),
            )
            .set(
                COL_TREATMENTS_POST,
                format_medicines_by_date(&record.medicines, record.procedure_date, MedicineWindow::Post),
            )
            .set(COL_STAINED_FOR, format_stained_for(p.get(KEY_STAINED_FOR)))
            .set(COL_IMMUNOSTAINING, format_optional(p.get(KEY_IMMUNOSTAINING)))
            .set(COL_MMR, format_optional(p.get(KEY_MMR)))
            .set(COL_TISSUES, format_tissue_data(p.get(KEY_TISSUES)))
            .set(COL_PDL1, format_optional(p.get(KEY_PDL1)))
            .set(COL_TMB, format_optional(p.get(KEY_TMB)))
            .set(COL_CANCER_CELLS, format_optional(p.get(KEY_CANCER_CELLS)))
            .set(COL_CEA, format_optional(p.get(KEY_CEA)))
            .set(COL_COMMENTS, format_optional(p.get(KEY_COMMENTS)));
    }

    /// One row per patient and lab-test date, pathology fields only.
    /// The OC cell is filled on each patient's first row only.
    pub fn assemble_other_cancers(
        &self,
        cohort: &Cohort,
        per_date: &BTreeMap<DatedKey, ParsedAnalysis>,
    ) -> Report {
        let mut rows = Vec::new();

        for entry in &cohort.index {
            let Some(record) = cohort.record(&entry.id) else {
                continue;
            };
            let range = DatedKey::new(&entry.id, NaiveDate::MIN)..=DatedKey::new(&entry.id, NaiveDate::MAX);

            for (i, (key, analysis)) in per_date.range(range).enumerate() {
                let p = &analysis.structured;
                let mut row = RecordBuilder::new(&key.to_string(), &OTHER_CANCERS_COLUMNS);
                row.set_raw(COL_OC, if i == 0 { record.oc.as_str() } else { "" })
                    .set(COL_TYPE_OF_CANCER, format_optional(p.get(KEY_CANCER_TYPE)))
                    .set(COL_DATE_OF_DIAGNOSIS, format_date(Some(key.date)))
                    .set(COL_METASTASES, format_optional(p.get(KEY_METASTASES)))
                    .set(COL_STAGE_GRADE, format_optional(p.get(KEY_STAGE_GRADE)))
                    .set(COL_PTNM, format_optional(p.get(KEY_PTNM)))
                    .set(COL_METADATA, format_optional(p.get(KEY_METADATA)))
                    .set(COL_LLM_OUTPUT, format_llm_output(&[analysis]));
                self.fill_pathology_columns(&mut row, analysis, record);
                rows.push(row.finish());
            }
        }

        tracing::info!(rows = rows.len(), "Other-cancers report assembled");
        Report {
            columns: &OTHER_CANCERS_COLUMNS,
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Demography, HabitEntry, PatientIndexEntry, PatientRegistry, StructuredData};
    use crate::translate::IdentityTranslator;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn cohort() -> Cohort {
        let index = ["P1", "P2"]
            .iter()
            .map(|id| PatientIndexEntry {
                id: id.to_string(),
                oc: format!("OC-{id}"),
                procedure_date: Some(date(2022, 10, 31)),
            })
            .collect();
        let mut registry = PatientRegistry::from_index(index);
        registry
            .patient("P1")
            .demography(Demography {
                gender: Some("נקבה".into()),
                birth_date: Some(date(1961, 4, 2)),
                ..Demography::default()
            })
            .habits(vec![HabitEntry {
                paragraph: "Smoking".into(),
                value: Some("Never".into()),
            }])
            .add_icd9(Icd9Entry {
                pathology: "Hypertension".into(),
                first_diagnosed: Some(date(2010, 1, 5)),
            })
            .add_medicine(MedicineOrder {
                name: "Letrozole".into(),
                dosage: "2.5mg".into(),
                issued_on: Some(date(2022, 9, 1)),
            })
            .add_medicine(MedicineOrder {
                name: "Tamoxifen".into(),
                dosage: "20mg".into(),
                issued_on: Some(date(2022, 10, 31)),
            });
        registry.build()
    }

    fn analysis(free: &str, value: serde_json::Value) -> ParsedAnalysis {
        ParsedAnalysis {
            free_text: free.into(),
            structured: StructuredData::from_json(value),
        }
    }

    #[test]
    fn medicines_split_on_reference_date() {
        let meds = &cohort().records["P1"].medicines;
        let reference = Some(date(2022, 10, 31));
        assert_eq!(
            format_medicines_by_date(meds, reference, MedicineWindow::Prior),
            "Letrozole, 2.5mg (01-09-2022)"
        );
        assert_eq!(
            format_medicines_by_date(meds, reference, MedicineWindow::Post),
            "Tamoxifen, 20mg (31-10-2022)"
        );
        assert_eq!(
            format_medicines_by_date(meds, Some(date(2020, 1, 1)), MedicineWindow::Prior),
            "None"
        );
        assert_eq!(format_medicines_by_date(meds, None, MedicineWindow::Post), "None");
    }

    #[test]
    fn builder_fills_unset_columns() {
        let mut builder = RecordBuilder::new("P1", &OTHER_CANCERS_COLUMNS);
        builder.set(COL_CEA, "").set_raw(COL_OC, "");
        let record = builder.finish();
        assert_eq!(record.values().len(), OTHER_CANCERS_COLUMNS.len());
        assert_eq!(record.get(COL_CEA), Some("None"));
        assert_eq!(record.get(COL_OC), Some(""));
        assert_eq!(record.get(COL_PDL1), Some("None"));
        assert_eq!(record.get("NOT A COLUMN"), None);
    }

    #[test]
    fn main_report_skips_patients_missing_an_analysis() {
        let cohort = cohort();
        let mut pathology = BTreeMap::new();
        let mut clinical = BTreeMap::new();
        pathology.insert("P1".to_string(), analysis("p", json!({})));
        pathology.insert("P2".to_string(), analysis("p", json!({})));
        clinical.insert("P1".to_string(), analysis("c", json!({})));

        let main = Assembler::new(&IdentityTranslator).assemble_main(&cohort, &pathology, &clinical);

        assert_eq!(main.report.rows.len(), 1);
        assert_eq!(main.skipped, vec!["P2".to_string()]);
    }

    #[test]
    fn main_row_joins_patient_and_analysis_fields() {
        let cohort = cohort();
        let mut pathology = BTreeMap::new();
        let mut clinical = BTreeMap::new();
        pathology.insert(
            "P1".to_string(),
            analysis(
                "Pathology summary",
                json!({
                    "general_cancer_type": "Breast Cancer",
                    "ptnm_results": "pT2N0",
                    "tissues_stained_for": ["ER", "PR"],
                    "type_of_procedure_performed": ["Lumpectomy."],
                    "pdl1": null,
                    "CEA": "2.1"
                }),
            ),
        );
        clinical.insert(
            "P1".to_string(),
            analysis(
                "Clinical summary",
                json!({
                    "general_cancer_type": "Lung Cancer",
                    "ptnm_results": "pT2N1",
                    "tumor_stage_or_grade": "Stage IIB",
                    "allergies": {"drug_related": ["Penicillin"]}
                }),
            ),
        );

        let main = Assembler::new(&IdentityTranslator).assemble_main(&cohort, &pathology, &clinical);
        let row = &main.report.rows[0];

        assert_eq!(row.get(COL_OC), Some("OC-P1"));
        assert_eq!(row.get(COL_TYPE_OF_CANCER), Some("Breast Cancer"));
        assert_eq!(row.get(COL_YEAR_OF_BIRTH), Some("1961"));
        assert_eq!(row.get(COL_DATE_OF_DEATH), Some("None"));
        assert_eq!(row.get(COL_SEX), Some("Female"));
        assert_eq!(row.get(COL_DEMOGRAPHY), Some("Nationality:  \nReligion: \nCOB: "));
        assert_eq!(row.get(COL_PROCEDURE_DATE), Some("2022-10-31"));
        assert_eq!(row.get(COL_PAST_PATHOLOGIES), Some("Hypertension (2010-01-05)"));
        assert_eq!(row.get(COL_ICDO_DIAGNOSIS), Some("None"));
        assert_eq!(row.get(COL_HABITS), Some("Smoking: Never"));
        assert_eq!(
            row.get(COL_PTNM),
            Some("Pathology report: pT2N0\n\nMedical texts: pT2N1")
        );
        assert_eq!(row.get(COL_STAGE_GRADE), Some("Stage IIB"));
        assert_eq!(row.get(COL_STAINED_FOR), Some("ER, PR"));
        assert_eq!(row.get(COL_TYPE_OF_PROCEDURE), Some("Lumpectomy"));
        assert_eq!(row.get(COL_PDL1), Some("None"));
        assert_eq!(row.get(COL_CEA), Some("2.1"));
        assert_eq!(row.get(COL_FAMILY_HISTORY), Some("None"));
        assert!(row.get(COL_ALLERGIES).unwrap().contains("  - Penicillin"));
        assert_eq!(
            row.get(COL_TREATMENTS_PRIOR),
            Some("Letrozole, 2.5mg (01-09-2022)")
        );
        let llm = row.get(COL_LLM_OUTPUT).unwrap();
        assert!(llm.find("Pathology summary").unwrap() < llm.find("Clinical summary").unwrap());
        assert!(row.values().iter().all(|v| !v.is_empty()));
    }

    #[test]
    fn other_cancers_rows_per_date_with_oc_once() {
        let cohort = cohort();
        let mut per_date = BTreeMap::new();
        per_date.insert(
            DatedKey::new("P1", date(2019, 3, 1)),
            analysis("old", json!({"general_cancer_type": "Colorectal Cancer"})),
        );
        per_date.insert(
            DatedKey::new("P1", date(2021, 6, 1)),
            analysis("newer", json!({"tumor_stage_or_grade": "G2"})),
        );
        per_date.insert(
            DatedKey::new("P2", date(2020, 1, 1)),
            analysis("p2", json!({})),
        );

        let report = Assembler::new(&IdentityTranslator).assemble_other_cancers(&cohort, &per_date);

        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.rows[0].get(COL_OC), Some("OC-P1"));
        assert_eq!(report.rows[0].get(COL_DATE_OF_DIAGNOSIS), Some("2019-03-01"));
        assert_eq!(report.rows[0].get(COL_TYPE_OF_CANCER), Some("Colorectal Cancer"));
        assert_eq!(report.rows[1].get(COL_OC), Some(""));
        assert_eq!(report.rows[1].get(COL_STAGE_GRADE), Some("G2"));
        assert_eq!(report.rows[2].get(COL_OC), Some("OC-P2"));
        assert_eq!(report.rows[2].get(COL_STAINED_FOR), Some("None"));
    }
}
