//! Canonical display text for structured analysis values.
//!
//! Every formatter returns [`NONE_PLACEHOLDER`] rather than an empty
//! string, so report cells are never blank.

use tracing::warn;

use crate::models::{FieldValue, NONE_PLACEHOLDER};

const INDENT: &str = "  ";

/// `"age_of_onset"` -> `"Age Of Onset"`. Letters after a non-letter are
/// upper-cased, the rest lower-cased.
pub fn title_case_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut prev_is_letter = false;
    for c in key.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

/// First letter upper-case, the rest lower-case (`"PATERNAL"` -> `"Paternal"`).
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Empty or whitespace-only text becomes the placeholder.
pub fn or_placeholder(text: impl Into<String>) -> String {
    let text = text.into();
    if text.trim().is_empty() {
        NONE_PLACEHOLDER.to_string()
    } else {
        text
    }
}

/// True for the placeholder itself or blank text.
pub fn is_placeholder(text: &str) -> bool {
    let t = text.trim();
    t.is_empty() || t == NONE_PLACEHOLDER
}

fn indent_lines(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{INDENT}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn scalar_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => NONE_PLACEHOLDER.to_string(),
        FieldValue::Text(s) => s.trim().to_string(),
        other => format_data(other),
    }
}

fn all_scalar(items: &[FieldValue]) -> bool {
    items.iter().all(FieldValue::is_scalar)
}

/// Render any structured value as display text.
///
/// Objects become `Key: value` lines, nested objects are indented under
/// their key, scalar lists are comma-joined and lists of objects are
/// rendered one object per paragraph. Plain text is returned trimmed, so
/// formatting already-formatted text is a no-op.
pub fn format_data(value: &FieldValue) -> String {
    let text = match value {
        FieldValue::Null => String::new(),
        FieldValue::Text(s) => s.trim().to_string(),
        FieldValue::List(items) if all_scalar(items) => items
            .iter()
            .map(scalar_text)
            .collect::<Vec<_>>()
            .join(", "),
        FieldValue::List(items) => items
            .iter()
            .map(format_data)
            .collect::<Vec<_>>()
            .join("\n\n"),
        FieldValue::Object(fields) => fields
            .iter()
            .map(|(key, value)| format_entry(key, value))
            .collect::<Vec<_>>()
            .join("\n"),
    };
    or_placeholder(text.trim())
}

fn format_entry(key: &str, value: &FieldValue) -> String {
    let label = title_case_key(key);
    match value {
        FieldValue::Object(fields) if !fields.is_empty() => {
            format!("{label}:\n{}", indent_lines(&format_data(value)))
        }
        FieldValue::List(items) if !items.is_empty() && !all_scalar(items) => {
            let rendered = items
                .iter()
                .map(|item| indent_lines(&format_data(item)))
                .collect::<Vec<_>>()
                .join("\n\n");
            format!("{label}:\n{rendered}")
        }
        other => format!("{label}: {}", format_data(other)),
    }
}

/// [`format_data`] on an optional field; a missing field is the placeholder.
pub fn format_optional(value: Option<&FieldValue>) -> String {
    value.map_or_else(|| NONE_PLACEHOLDER.to_string(), format_data)
}

fn present(value: Option<&FieldValue>) -> Option<&FieldValue> {
    value.filter(|v| !v.is_absent())
}

// ═══════════════════════════════════════════
// Composite formatters
// ═══════════════════════════════════════════

/// One block per relative, grouped by side.
///
/// A side where no relative carries any data renders as `Side: None`.
/// Otherwise every relative of that side is rendered in full.
pub fn format_family_history(value: Option<&FieldValue>) -> String {
    let Some(history) = present(value) else {
        return NONE_PLACEHOLDER.to_string();
    };
    let FieldValue::Object(sides) = history else {
        return format_data(history);
    };

    let rendered: Vec<String> = sides
        .iter()
        .map(|(side, relatives)| format_family_side(side, relatives))
        .collect();
    or_placeholder(rendered.join("\n\n"))
}

fn format_family_side(side: &str, relatives: &FieldValue) -> String {
    let label = capitalize(side);
    let relatives: Vec<&FieldValue> = match relatives {
        FieldValue::List(items) => items.iter().collect(),
        FieldValue::Object(_) => vec![relatives],
        _ => Vec::new(),
    };

    let has_data = relatives.iter().any(|relative| match relative {
        FieldValue::Object(fields) => fields.iter().any(|(_, v)| !v.is_absent()),
        other => !other.is_absent(),
    });
    if !has_data {
        return format!("{label}: {NONE_PLACEHOLDER}");
    }

    let blocks: Vec<String> = relatives
        .into_iter()
        .map(|relative| match relative {
            FieldValue::Object(_) => format_relative(relative),
            other => indent_lines(&format_data(other)),
        })
        .collect();
    format!("{label}:\n{}", blocks.join("\n\n"))
}

fn format_relative(relative: &FieldValue) -> String {
    let field = |key: &str| match relative.get(key) {
        None => "Unknown".to_string(),
        Some(value) => format_data(value),
    };
    let mutations = match relative.get("mutations") {
        Some(value) if !value.is_absent() => format_data(value),
        _ => "Unknown".to_string(),
    };
    format!(
        "{INDENT}Relative: {}\n{INDENT}Condition: {}\n{INDENT}Age of onset: {}\n{INDENT}Mutations: {}",
        field("relative"),
        field("condition"),
        field("age_of_onset"),
        mutations
    )
}

/// Drug-related and non-drug-related lists, each defaulting to `None`.
///
/// A bare list is treated as drug-related.
pub fn format_allergies(value: Option<&FieldValue>) -> String {
    match present(value) {
        Some(FieldValue::Text(_)) => return format_optional(value),
        Some(list @ FieldValue::List(_)) => {
            warn!("Allergies returned as a bare list, rendering as drug-related");
            let drug = allergy_section("Drug-related Allergies", Some(list));
            let non_drug = allergy_section("Non-drug-related Allergies", None);
            return format!("{drug}\n\n{non_drug}");
        }
        _ => {}
    }
    let drug = allergy_section("Drug-related Allergies", value.and_then(|v| v.get("drug_related")));
    let non_drug = allergy_section(
        "Non-drug-related Allergies",
        value.and_then(|v| v.get("non_drug_related")),
    );
    format!("{drug}\n\n{non_drug}")
}

fn allergy_section(label: &str, items: Option<&FieldValue>) -> String {
    let entries: Vec<String> = match present(items) {
        Some(FieldValue::List(items)) => items
            .iter()
            .filter(|item| !item.is_absent())
            .map(format_data)
            .collect(),
        Some(other) => vec![format_data(other)],
        None => Vec::new(),
    };
    if entries.is_empty() {
        return format!("{label}: {NONE_PLACEHOLDER}");
    }
    let lines: Vec<String> = entries
        .iter()
        .map(|entry| format!("{INDENT}- {entry}"))
        .collect();
    format!("{label}:\n{}", lines.join("\n"))
}

/// `Site`/`Details` paragraph per examined tissue.
pub fn format_tissue_data(value: Option<&FieldValue>) -> String {
    let Some(tissues) = present(value) else {
        return NONE_PLACEHOLDER.to_string();
    };
    let items: Vec<&FieldValue> = match tissues {
        FieldValue::List(items) => items.iter().collect(),
        other => vec![other],
    };

    let blocks: Vec<String> = items
        .into_iter()
        .filter(|item| !item.is_absent())
        .map(|item| match item {
            FieldValue::Object(_) => {
                let site = item
                    .get("site")
                    .map_or_else(|| "Unknown".to_string(), format_data);
                let details = match item.get("details") {
                    None => "No details available".to_string(),
                    Some(FieldValue::List(parts)) => parts
                        .iter()
                        .map(scalar_text)
                        .collect::<Vec<_>>()
                        .join(", "),
                    Some(other) => format_data(other),
                };
                format!("Site: {site}\nDetails: {}", or_placeholder(details))
            }
            other => format_data(other),
        })
        .collect();
    or_placeholder(blocks.join("\n\n"))
}

/// Procedures with surrounding dots stripped, joined as sentences.
pub fn format_procedures(value: Option<&FieldValue>) -> String {
    let parts: Vec<String> = match present(value) {
        Some(FieldValue::List(items)) => items.iter().map(scalar_text).collect(),
        Some(other) => vec![format_data(other)],
        None => Vec::new(),
    };
    let joined = parts
        .iter()
        .map(|p| p.trim().trim_matches('.').trim())
        .filter(|p| !is_placeholder(p))
        .collect::<Vec<_>>()
        .join(". ");
    or_placeholder(joined)
}

/// Stained markers, comma-joined.
pub fn format_stained_for(value: Option<&FieldValue>) -> String {
    match present(value) {
        Some(FieldValue::List(items)) => or_placeholder(
            items
                .iter()
                .filter(|item| !item.is_absent())
                .map(scalar_text)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Some(other) => format_data(other),
        None => NONE_PLACEHOLDER.to_string(),
    }
}
