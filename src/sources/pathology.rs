//! Pathology report selection and text assembly.
//!
//! A report (`owner_ref`) belongs to the procedure when any of its result
//! lines was dated within the window around the procedure date. All lines
//! of a selected report are kept, whatever their own date.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Duration, NaiveDate};

use super::clean::clean_text;
use super::PathologyRow;
use crate::llm::prompt::TEXT_TOO_LONG_MARKER;
use crate::models::{PatientIndexEntry, PatientKey};
use crate::pipeline::DatedKey;

/// Hebrew "see ...": a description that only points at another result.
const CROSS_REFERENCE_PREFIX: &str = "ראו";

/// Hebrew "the answer is too long": the export truncated the result text.
const TOO_LONG_PREFIX: &str = "התשובה ארוכה מידי";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// Reports around the procedure (main report).
    InWindow,
    /// Every other report of the patient (other-cancers report).
    OutsideWindow,
}

/// Analysis texts for one window mode.
#[derive(Debug, Clone, Default)]
pub struct PathologyTexts {
    /// All selected dates of a patient, in date order.
    pub per_patient: BTreeMap<PatientKey, String>,
    /// One text per patient and lab-test date.
    pub per_date: BTreeMap<DatedKey, String>,
}

fn in_window(date: NaiveDate, procedure: NaiveDate, window_days: i64) -> bool {
    let window = Duration::days(window_days);
    date >= procedure - window && date <= procedure + window
}

/// Rows of the reports selected for `mode`, for indexed patients only.
pub fn select_rows<'a>(
    rows: &'a [PathologyRow],
    index: &[PatientIndexEntry],
    window_days: i64,
    mode: WindowMode,
) -> Vec<&'a PathologyRow> {
    let procedure_dates: HashMap<&str, NaiveDate> = index
        .iter()
        .filter_map(|e| e.procedure_date.map(|d| (e.id.as_str(), d)))
        .collect();

    let selected: BTreeSet<(&str, &str)> = rows
        .iter()
        .filter_map(|row| {
            let id = row.id.trim();
            let procedure = *procedure_dates.get(id)?;
            let lab_date = row.lab_test_date?;
            let inside = in_window(lab_date, procedure, window_days);
            let wanted = match mode {
                WindowMode::InWindow => inside,
                WindowMode::OutsideWindow => !inside,
            };
            wanted.then_some((id, row.owner_ref.as_str()))
        })
        .collect();

    rows.iter()
        .filter(|row| selected.contains(&(row.id.trim(), row.owner_ref.as_str())))
        .collect()
}

/// Analysis text of one result line; empty when it carries nothing useful.
pub fn entry_text(row: &PathologyRow) -> String {
    let mut text = String::new();

    let desc = row.result_desc.as_deref().map(clean_text).unwrap_or_default();
    if !desc.is_empty() && !desc.starts_with(CROSS_REFERENCE_PREFIX) {
        text.push_str(&format!("**Result Description**: {desc}\n"));
    }

    let result = row.result_text.as_deref().map(clean_text).unwrap_or_default();
    if !result.is_empty() {
        if result.starts_with(TOO_LONG_PREFIX) {
            text.push_str(&format!("\n{TEXT_TOO_LONG_MARKER}\n"));
        } else {
            text.push_str(&format!("**Result Text**: {result}\n"));
        }
    }

    text
}

/// Group the selected rows by patient and date and build the texts.
pub fn prepare_pathology_texts(
    rows: &[PathologyRow],
    index: &[PatientIndexEntry],
    window_days: i64,
    mode: WindowMode,
) -> PathologyTexts {
    let mut grouped: BTreeMap<DatedKey, Vec<&PathologyRow>> = BTreeMap::new();
    for row in select_rows(rows, index, window_days, mode) {
        match row.lab_test_date {
            Some(date) => grouped
                .entry(DatedKey::new(row.id.trim(), date))
                .or_default()
                .push(row),
            None => tracing::warn!(
                patient = %row.id,
                owner_ref = %row.owner_ref,
                "Pathology line without lab-test date skipped"
            ),
        }
    }

    let mut texts = PathologyTexts::default();
    for (key, entries) in grouped {
        let text = entries
            .iter()
            .map(|row| entry_text(row))
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            continue;
        }

        texts
            .per_patient
            .entry(key.patient.clone())
            .and_modify(|all: &mut String| {
                all.push('\n');
                all.push_str(&text);
            })
            .or_insert_with(|| text.clone());
        texts.per_date.insert(key, text);
    }

    tracing::info!(
        ?mode,
        patients = texts.per_patient.len(),
        dates = texts.per_date.len(),
        "Pathology texts prepared"
    );
    texts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn index() -> Vec<PatientIndexEntry> {
        vec![
            PatientIndexEntry {
                id: "P1".into(),
                oc: "OC-1".into(),
                procedure_date: Some(date(2022, 10, 31)),
            },
            PatientIndexEntry {
                id: "P2".into(),
                oc: "OC-2".into(),
                procedure_date: None,
            },
        ]
    }

    fn row(id: &str, owner: &str, on: NaiveDate, desc: &str, text: &str) -> PathologyRow {
        PathologyRow {
            id: id.into(),
            owner_ref: owner.into(),
            lab_test_date: Some(on),
            result_desc: Some(desc.into()),
            result_text: Some(text.into()),
        }
    }

    fn rows() -> Vec<PathologyRow> {
        vec![
            row("P1", "R1", date(2022, 11, 2), "Biopsy", "Invasive carcinoma"),
            // Same report, dated outside the window: kept with its report.
            row("P1", "R1", date(2022, 11, 20), "Addendum", "Ki-67 30%"),
            row("P1", "R2", date(2019, 3, 1), "Old biopsy", "Benign"),
            row("P2", "R3", date(2022, 10, 31), "Biopsy", "Ignored"),
        ]
    }

    #[test]
    fn window_selects_whole_reports() {
        let rows = rows();
        let selected = select_rows(&rows, &index(), 2, WindowMode::InWindow);
        let refs: Vec<&str> = selected.iter().map(|r| r.owner_ref.as_str()).collect();
        assert_eq!(refs, vec!["R1", "R1"]);
    }

    #[test]
    fn outside_mode_selects_other_reports() {
        let rows = rows();
        let selected = select_rows(&rows, &index(), 2, WindowMode::OutsideWindow);
        let refs: BTreeSet<&str> = selected.iter().map(|r| r.owner_ref.as_str()).collect();
        // R1 also has a line outside the window.
        assert_eq!(refs, BTreeSet::from(["R1", "R2"]));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let procedure = date(2022, 10, 31);
        assert!(in_window(date(2022, 10, 29), procedure, 2));
        assert!(in_window(date(2022, 11, 2), procedure, 2));
        assert!(!in_window(date(2022, 11, 3), procedure, 2));
    }

    #[test]
    fn entry_text_skips_cross_references_and_marks_truncation() {
        let plain = row("P1", "R1", date(2022, 1, 1), "Biopsy_x000D_left", "Carcinoma");
        assert_eq!(
            entry_text(&plain),
            "**Result Description**: Biopsy\nleft\n**Result Text**: Carcinoma\n"
        );

        let see_other = row("P1", "R1", date(2022, 1, 1), "ראו תשובה קודמת", "Carcinoma");
        assert_eq!(entry_text(&see_other), "**Result Text**: Carcinoma\n");

        let too_long = row("P1", "R1", date(2022, 1, 1), "Biopsy", "התשובה ארוכה מידי להצגה");
        assert!(entry_text(&too_long).contains(TEXT_TOO_LONG_MARKER));
        assert!(!entry_text(&too_long).contains("Result Text"));
    }

    #[test]
    fn per_patient_text_joins_dates_in_order() {
        let texts = prepare_pathology_texts(&rows(), &index(), 2, WindowMode::InWindow);
        let all = &texts.per_patient["P1"];
        assert!(all.find("Invasive carcinoma").unwrap() < all.find("Ki-67").unwrap());
        assert_eq!(texts.per_date.len(), 2);
        assert!(!texts.per_patient.contains_key("P2"));
    }

    #[test]
    fn per_date_keys_for_other_cancers() {
        let texts = prepare_pathology_texts(&rows(), &index(), 2, WindowMode::OutsideWindow);
        let dates: Vec<NaiveDate> = texts.per_date.keys().map(|k| k.date).collect();
        assert_eq!(
            dates,
            vec![date(2019, 3, 1), date(2022, 11, 2), date(2022, 11, 20)]
        );
    }
}
