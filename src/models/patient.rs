//! Per-patient record assembled from the collaborator data sources.
//!
//! Each source merges its own field group through [`PatientRegistry`];
//! the registry is built once into immutable [`PatientRecord`]s.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Opaque patient identifier joining every data source.
pub type PatientKey = String;

/// One row of the patient index: the cohort the reports iterate over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientIndexEntry {
    pub id: PatientKey,
    /// OC label written in the first report column.
    pub oc: String,
    pub procedure_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demography {
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub religion: Option<String>,
    pub country_of_birth: Option<String>,
}

/// Latest answer recorded for one habits questionnaire paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitEntry {
    pub paragraph: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Icd9Entry {
    pub pathology: String,
    pub first_diagnosed: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcdoEntry {
    pub cancer_name: String,
    pub first_diagnosed: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicineOrder {
    pub name: String,
    pub dosage: String,
    pub issued_on: Option<NaiveDate>,
}

impl MedicineOrder {
    /// Issue date as written in the report (`dd-mm-YYYY`).
    pub fn issued_on_string(&self) -> String {
        self.issued_on
            .map(|d| d.format("%d-%m-%Y").to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatientRecord {
    pub key: PatientKey,
    pub oc: String,
    pub procedure_date: Option<NaiveDate>,
    pub demography: Option<Demography>,
    pub habits: Vec<HabitEntry>,
    pub icd9: Vec<Icd9Entry>,
    pub icdo: Option<IcdoEntry>,
    /// Chronological.
    pub medicines: Vec<MedicineOrder>,
}

/// Accumulates one patient's field groups before the record is frozen.
#[derive(Debug, Clone, Default)]
pub struct PatientRecordBuilder {
    key: PatientKey,
    oc: String,
    procedure_date: Option<NaiveDate>,
    demography: Option<Demography>,
    habits: Vec<HabitEntry>,
    icd9: Vec<Icd9Entry>,
    icdo: Option<IcdoEntry>,
    medicines: Vec<MedicineOrder>,
}

impl PatientRecordBuilder {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    pub fn demography(&mut self, demography: Demography) -> &mut Self {
        if self.demography.is_some() {
            tracing::warn!(patient = %self.key, "Duplicate demography row, keeping the last one");
        }
        self.demography = Some(demography);
        self
    }

    pub fn habits(&mut self, habits: Vec<HabitEntry>) -> &mut Self {
        self.habits = habits;
        self
    }

    pub fn add_icd9(&mut self, entry: Icd9Entry) -> &mut Self {
        self.icd9.push(entry);
        self
    }

    pub fn icdo(&mut self, entry: IcdoEntry) -> &mut Self {
        if self.icdo.is_some() {
            tracing::warn!(patient = %self.key, "Duplicate ICD-O row, keeping the last one");
        }
        self.icdo = Some(entry);
        self
    }

    pub fn add_medicine(&mut self, order: MedicineOrder) -> &mut Self {
        self.medicines.push(order);
        self
    }

    fn build(mut self) -> PatientRecord {
        self.icd9.sort_by_key(|e| e.first_diagnosed);
        self.medicines.sort_by_key(|m| m.issued_on);
        PatientRecord {
            key: self.key,
            oc: self.oc,
            procedure_date: self.procedure_date,
            demography: self.demography,
            habits: self.habits,
            icd9: self.icd9,
            icdo: self.icdo,
            medicines: self.medicines,
        }
    }
}

/// A collaborator that contributes one field group per patient.
pub trait PatientDataSource {
    fn name(&self) -> &'static str;

    fn merge_into(&self, registry: &mut PatientRegistry);
}

/// The cohort (in index order) plus every patient's frozen record.
#[derive(Debug, Clone, Default)]
pub struct Cohort {
    pub index: Vec<PatientIndexEntry>,
    pub records: BTreeMap<PatientKey, PatientRecord>,
}

impl Cohort {
    pub fn record(&self, key: &str) -> Option<&PatientRecord> {
        self.records.get(key)
    }
}

/// Mutable staging area the data sources merge into.
#[derive(Debug, Default)]
pub struct PatientRegistry {
    index: Vec<PatientIndexEntry>,
    builders: BTreeMap<PatientKey, PatientRecordBuilder>,
}

impl PatientRegistry {
    /// Seed the registry from the patient index. Duplicate ids keep the first row.
    pub fn from_index(index: Vec<PatientIndexEntry>) -> Self {
        let mut registry = Self::default();
        for entry in index {
            if registry.builders.contains_key(&entry.id) {
                tracing::warn!(patient = %entry.id, "Duplicate patient index row ignored");
                continue;
            }
            let mut builder = PatientRecordBuilder::new(&entry.id);
            builder.oc = entry.oc.clone();
            builder.procedure_date = entry.procedure_date;
            registry.builders.insert(entry.id.clone(), builder);
            registry.index.push(entry);
        }
        registry
    }

    /// Builder for `key`; patients unknown to the index get a fresh record.
    pub fn patient(&mut self, key: &str) -> &mut PatientRecordBuilder {
        if !self.builders.contains_key(key) {
            tracing::warn!(patient = %key, "Source row for a patient missing from the index");
        }
        self.builders
            .entry(key.to_string())
            .or_insert_with(|| PatientRecordBuilder::new(key))
    }

    pub fn merge(&mut self, source: &dyn PatientDataSource) {
        tracing::debug!(source = source.name(), "Merging patient data source");
        source.merge_into(self);
    }

    pub fn build(self) -> Cohort {
        Cohort {
            index: self.index,
            records: self
                .builders
                .into_iter()
                .map(|(key, builder)| (key, builder.build()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn index_entry(id: &str) -> PatientIndexEntry {
        PatientIndexEntry {
            id: id.into(),
            oc: format!("OC-{id}"),
            procedure_date: Some(date(2022, 10, 31)),
        }
    }

    struct MedicineSource(Vec<(&'static str, MedicineOrder)>);

    impl PatientDataSource for MedicineSource {
        fn name(&self) -> &'static str {
            "medicines"
        }

        fn merge_into(&self, registry: &mut PatientRegistry) {
            for (key, order) in &self.0 {
                registry.patient(key).add_medicine(order.clone());
            }
        }
    }

    #[test]
    fn index_order_is_kept_and_duplicates_dropped() {
        let registry =
            PatientRegistry::from_index(vec![index_entry("B"), index_entry("A"), index_entry("B")]);
        let cohort = registry.build();
        let ids: Vec<&str> = cohort.index.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
        assert_eq!(cohort.records.len(), 2);
    }

    #[test]
    fn sources_fill_only_their_field_group() {
        let mut registry = PatientRegistry::from_index(vec![index_entry("P1")]);
        registry.patient("P1").demography(Demography {
            gender: Some("נקבה".into()),
            ..Demography::default()
        });
        registry.merge(&MedicineSource(vec![(
            "P1",
            MedicineOrder {
                name: "Tamoxifen".into(),
                dosage: "20mg".into(),
                issued_on: Some(date(2022, 1, 1)),
            },
        )]));

        let cohort = registry.build();
        let record = cohort.record("P1").unwrap();
        assert_eq!(record.oc, "OC-P1");
        assert!(record.demography.is_some());
        assert_eq!(record.medicines.len(), 1);
        assert!(record.icd9.is_empty());
    }

    #[test]
    fn unknown_patient_gets_a_record_but_no_index_row() {
        let mut registry = PatientRegistry::from_index(vec![index_entry("P1")]);
        registry.patient("X9").add_icd9(Icd9Entry {
            pathology: "Hypertension".into(),
            first_diagnosed: None,
        });
        let cohort = registry.build();
        assert_eq!(cohort.index.len(), 1);
        assert!(cohort.record("X9").is_some());
    }

    #[test]
    fn build_sorts_medicines_chronologically() {
        let mut registry = PatientRegistry::from_index(vec![index_entry("P1")]);
        for (name, day) in [("late", 20), ("early", 2)] {
            registry.patient("P1").add_medicine(MedicineOrder {
                name: name.into(),
                dosage: "1".into(),
                issued_on: Some(date(2022, 3, day)),
            });
        }
        let cohort = registry.build();
        let names: Vec<&str> = cohort.records["P1"]
            .medicines
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[test]
    fn issued_on_string_uses_day_first() {
        let order = MedicineOrder {
            name: "X".into(),
            dosage: "1".into(),
            issued_on: Some(date(2023, 4, 9)),
        };
        assert_eq!(order.issued_on_string(), "09-04-2023");
    }
}
