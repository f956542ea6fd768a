use std::collections::{BTreeMap, HashMap};

use chrono::{Months, NaiveDate};

use super::clean::clean_text;
use super::ClinicalNoteRow;
use crate::models::{PatientIndexEntry, PatientKey};

fn month_window(procedure: NaiveDate, months: u32) -> Option<(NaiveDate, NaiveDate)> {
    let span = Months::new(months);
    Some((
        procedure.checked_sub_months(span)?,
        procedure.checked_add_months(span)?,
    ))
}

/// Notes dated within `window_months` of the procedure, excluded categories
/// dropped, cleaned and joined per patient with a blank line.
pub fn prepare_clinical_texts(
    notes: &[ClinicalNoteRow],
    index: &[PatientIndexEntry],
    window_months: u32,
    excluded_categories: &[String],
) -> BTreeMap<PatientKey, String> {
    let windows: HashMap<&str, (NaiveDate, NaiveDate)> = index
        .iter()
        .filter_map(|e| {
            let procedure = e.procedure_date?;
            Some((e.id.as_str(), month_window(procedure, window_months)?))
        })
        .collect();

    let mut grouped: BTreeMap<PatientKey, Vec<String>> = BTreeMap::new();
    let mut excluded = 0usize;

    for note in notes {
        let id = note.id.trim();
        let Some(&(from, to)) = windows.get(id) else {
            continue;
        };
        let Some(date) = note.date else {
            continue;
        };
        if date < from || date > to {
            continue;
        }
        if let Some(category) = note.category.as_deref().map(str::trim) {
            if excluded_categories.iter().any(|c| c.trim() == category) {
                excluded += 1;
                continue;
            }
        }

        let text = clean_text(&note.text);
        if !text.is_empty() {
            grouped.entry(id.to_string()).or_default().push(text);
        }
    }

    tracing::info!(
        patients = grouped.len(),
        excluded_by_category = excluded,
        "Clinical texts prepared"
    );

    grouped
        .into_iter()
        .map(|(id, texts)| (id, texts.join("\n\n")))
        .collect()
}
