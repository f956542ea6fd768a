use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::SourceError;

static NEWLINE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n+").expect("valid regex"));

static DATE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d.]").expect("valid regex"));

/// Spreadsheet line-break placeholders become real newlines; runs collapse to one.
pub fn clean_text(text: &str) -> String {
    let replaced = text.replace("_x000D_", "\n").replace("<NEW_LINE>", "\n");
    NEWLINE_RUNS
        .replace_all(&replaced, "\n")
        .trim()
        .to_string()
}

/// Header cells sometimes carry a stray carriage-return marker.
pub fn clean_key(key: &str) -> String {
    key.replace(":_x000D_", "").replace('\n', "").trim().to_string()
}

/// `"31.10."` -> `"31.10.22"`: a missing year is assumed to be 2022.
pub fn fix_invalid_dates(date: &str) -> String {
    let date = date.trim();
    let parts: Vec<&str> = date.split('.').collect();
    if parts.len() == 3 && parts[2].is_empty() {
        format!("{date}22")
    } else {
        date.to_string()
    }
}

/// Parse a procedure date cell (`dd.mm.yy`, any separator; ISO also accepted).
pub fn parse_procedure_date(raw: &str) -> Result<NaiveDate, SourceError> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }

    let normalized = DATE_SEPARATORS.replace_all(trimmed, ".");
    let repaired = fix_invalid_dates(&normalized);

    NaiveDate::parse_from_str(&repaired, "%d.%m.%y")
        .or_else(|_| NaiveDate::parse_from_str(&repaired, "%d.%m.%Y"))
        .map_err(|_| SourceError::InvalidDate(raw.to_string()))
}
