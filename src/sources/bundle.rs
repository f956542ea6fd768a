//! Registry merge of each tabular source in the bundle.

use std::collections::BTreeMap;

use super::clean::{clean_key, parse_procedure_date};
use super::{DemographyRow, HabitRow, Icd9Row, IcdoRow, InputBundle, MedicineRow, PatientRow};
use crate::models::{
    Cohort, Demography, HabitEntry, Icd9Entry, IcdoEntry, MedicineOrder, PatientDataSource,
    PatientIndexEntry, PatientRegistry,
};

/// Index rows with parsed procedure dates. Unparseable dates become `None`.
pub fn patient_index(rows: &[PatientRow]) -> Vec<PatientIndexEntry> {
    rows.iter()
        .map(|row| {
            let procedure_date = match row.procedure_date.as_deref() {
                Some(raw) if !raw.trim().is_empty() => match parse_procedure_date(raw) {
                    Ok(date) => Some(date),
                    Err(e) => {
                        tracing::warn!(patient = %row.id, error = %e, "Unparseable procedure date");
                        None
                    }
                },
                _ => {
                    tracing::warn!(patient = %row.id, "Patient has no procedure date");
                    None
                }
            };
            PatientIndexEntry {
                id: row.id.trim().to_string(),
                oc: row.oc.trim().to_string(),
                procedure_date,
            }
        })
        .collect()
}

/// Seed the registry from the index and merge every tabular source.
pub fn build_cohort(bundle: &InputBundle) -> Cohort {
    let mut registry = PatientRegistry::from_index(patient_index(&bundle.patients));

    registry.merge(&HabitsSource(&bundle.habits));
    registry.merge(&DemographySource(&bundle.demography));
    registry.merge(&IcdoSource(&bundle.icdo));
    registry.merge(&Icd9Source(&bundle.icd9));
    registry.merge(&MedicinesSource(&bundle.medicines));

    let cohort = registry.build();
    tracing::info!(
        patients = cohort.index.len(),
        records = cohort.records.len(),
        "Patient cohort built"
    );
    cohort
}

pub struct DemographySource<'a>(pub &'a [DemographyRow]);

impl PatientDataSource for DemographySource<'_> {
    fn name(&self) -> &'static str {
        "demography"
    }

    fn merge_into(&self, registry: &mut PatientRegistry) {
        for row in self.0 {
            registry.patient(row.id.trim()).demography(Demography {
                gender: row.gender.clone(),
                birth_date: row.birth_date,
                death_date: row.death_date,
                nationality: row.nationality.clone(),
                religion: row.religion.clone(),
                country_of_birth: row.country_of_birth.clone(),
            });
        }
    }
}

/// Latest answer per questionnaire paragraph.
///
/// Every patient gets one entry per paragraph seen anywhere in the source,
/// in first-seen order; paragraphs the patient never answered have no value.
pub struct HabitsSource<'a>(pub &'a [HabitRow]);

impl HabitsSource<'_> {
    fn paragraph_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        for row in self.0 {
            let paragraph = clean_key(&row.paragraph);
            if !order.contains(&paragraph) {
                order.push(paragraph);
            }
        }
        order
    }

    fn habit_value(row: &HabitRow) -> Option<String> {
        let section = row.section.as_deref().map(str::trim).unwrap_or_default();
        match row.comments.as_deref().map(str::trim) {
            Some(comments) if !comments.is_empty() => Some(format!("{section}, {comments}")),
            _ if !section.is_empty() => Some(section.to_string()),
            _ => None,
        }
    }
}

impl PatientDataSource for HabitsSource<'_> {
    fn name(&self) -> &'static str {
        "habits"
    }

    fn merge_into(&self, registry: &mut PatientRegistry) {
        let order = self.paragraph_order();

        // Stable sort by date: among equal dates the later row wins.
        let mut by_patient: BTreeMap<&str, Vec<&HabitRow>> = BTreeMap::new();
        for row in self.0 {
            by_patient.entry(row.id.trim()).or_default().push(row);
        }

        for (patient, mut rows) in by_patient {
            rows.sort_by_key(|r| r.recorded_on);
            let mut latest: BTreeMap<String, Option<String>> = BTreeMap::new();
            for row in rows {
                latest.insert(clean_key(&row.paragraph), Self::habit_value(row));
            }

            let habits = order
                .iter()
                .map(|paragraph| HabitEntry {
                    paragraph: paragraph.clone(),
                    value: latest.get(paragraph).cloned().flatten(),
                })
                .collect();
            registry.patient(patient).habits(habits);
        }
    }
}

pub struct Icd9Source<'a>(pub &'a [Icd9Row]);

impl PatientDataSource for Icd9Source<'_> {
    fn name(&self) -> &'static str {
        "icd9"
    }

    fn merge_into(&self, registry: &mut PatientRegistry) {
        for row in self.0 {
            registry.patient(row.id.trim()).add_icd9(Icd9Entry {
                pathology: row.pathology.trim().to_string(),
                first_diagnosed: row.first_diagnosed,
            });
        }
    }
}

pub struct IcdoSource<'a>(pub &'a [IcdoRow]);

impl PatientDataSource for IcdoSource<'_> {
    fn name(&self) -> &'static str {
        "icdo"
    }

    fn merge_into(&self, registry: &mut PatientRegistry) {
        for row in self.0 {
            registry.patient(row.id.trim()).icdo(IcdoEntry {
                cancer_name: row.cancer_name.trim().to_string(),
                first_diagnosed: row.first_diagnosed,
            });
        }
    }
}

pub struct MedicinesSource<'a>(pub &'a [MedicineRow]);

impl PatientDataSource for MedicinesSource<'_> {
    fn name(&self) -> &'static str {
        "medicines"
    }

    fn merge_into(&self, registry: &mut PatientRegistry) {
        for row in self.0 {
            registry.patient(row.id.trim()).add_medicine(MedicineOrder {
                name: row.name.trim().to_string(),
                dosage: row.dosage.trim().to_string(),
                issued_on: row.issued_on,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn habit(id: &str, paragraph: &str, section: &str, comments: Option<&str>, on: NaiveDate) -> HabitRow {
        HabitRow {
            id: id.into(),
            paragraph: paragraph.into(),
            section: Some(section.into()),
            comments: comments.map(Into::into),
            recorded_on: Some(on),
        }
    }

    #[test]
    fn index_parses_and_tolerates_bad_dates() {
        let rows = vec![
            PatientRow {
                id: " P1 ".into(),
                oc: "OC-1".into(),
                procedure_date: Some("31.10.".into()),
            },
            PatientRow {
                id: "P2".into(),
                oc: "OC-2".into(),
                procedure_date: Some("??".into()),
            },
        ];
        let index = patient_index(&rows);
        assert_eq!(index[0].id, "P1");
        assert_eq!(index[0].procedure_date, Some(date(2022, 10, 31)));
        assert_eq!(index[1].procedure_date, None);
    }

    #[test]
    fn habits_keep_latest_row_per_paragraph() {
        let rows = vec![
            habit("P1", "Smoking", "Smoker", Some("10/day"), date(2020, 1, 1)),
            habit("P1", "Smoking", "Former smoker", None, date(2022, 1, 1)),
            habit("P2", "Alcohol", "Occasionally", None, date(2021, 1, 1)),
        ];
        let mut registry = PatientRegistry::from_index(vec![]);
        registry.merge(&HabitsSource(&rows));
        let cohort = registry.build();

        let p1 = &cohort.records["P1"].habits;
        assert_eq!(p1.len(), 2);
        assert_eq!(p1[0].paragraph, "Smoking");
        assert_eq!(p1[0].value.as_deref(), Some("Former smoker"));
        assert_eq!(p1[1].paragraph, "Alcohol");
        assert_eq!(p1[1].value, None);
    }

    #[test]
    fn habit_value_includes_comments() {
        let row = habit("P1", "Smoking", "Smoker", Some(" 10/day "), date(2020, 1, 1));
        assert_eq!(HabitsSource::habit_value(&row).as_deref(), Some("Smoker, 10/day"));
    }

    #[test]
    fn cohort_merges_every_source() {
        let bundle: InputBundle = serde_json::from_value(serde_json::json!({
            "patients": [{"id": "P1", "oc": "OC-1", "procedure_date": "31.10.22"}],
            "demography": [{"id": "P1", "gender": "זכר", "birth_date": "1960-05-01"}],
            "icd9": [{"id": "P1", "pathology": "Hypertension", "first_diagnosed": "2010-01-01"}],
            "icdo": [{"id": "P1", "cancer_name": "Adenocarcinoma", "first_diagnosed": "2022-10-01"}],
            "medicines": [{"id": "P1", "name": "Tamoxifen", "dosage": "20mg", "issued_on": "2022-11-01"}]
        }))
        .unwrap();

        let cohort = build_cohort(&bundle);
        let record = cohort.record("P1").unwrap();
        assert_eq!(record.procedure_date, Some(date(2022, 10, 31)));
        assert_eq!(record.demography.as_ref().unwrap().gender.as_deref(), Some("זכר"));
        assert_eq!(record.icd9.len(), 1);
        assert_eq!(record.icdo.as_ref().unwrap().cancer_name, "Adenocarcinoma");
        assert_eq!(record.medicines[0].name, "Tamoxifen");
    }
}
