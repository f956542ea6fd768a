//! Merge policy for fields extracted from both pathology reports and
//! clinical texts.

use super::format::{format_data, format_optional, is_placeholder, or_placeholder};
use crate::models::{FieldValue, NONE_PLACEHOLDER};

pub const PATHOLOGY_LABEL: &str = "Pathology report:";
pub const CLINICAL_LABEL: &str = "Medical texts:";

/// How the two sources of one field are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    /// Pathology wins; clinical is the fallback.
    SourcePriority,
    /// Both sources kept, each under its own label.
    DualLabeled,
    /// Pathology and clinical stage text joined; needs clinical data.
    StageGrade,
}

/// Produce the single report value for a field seen by both sources.
pub fn reconcile(
    class: FieldClass,
    pathology: Option<&FieldValue>,
    clinical: Option<&FieldValue>,
) -> String {
    match class {
        FieldClass::SourcePriority => source_priority(pathology, clinical),
        FieldClass::DualLabeled => dual_labeled(pathology, clinical),
        FieldClass::StageGrade => stage_grade(pathology, clinical),
    }
}

fn source_priority(pathology: Option<&FieldValue>, clinical: Option<&FieldValue>) -> String {
    let p = format_optional(pathology);
    if !is_placeholder(&p) {
        return p;
    }
    let c = format_optional(clinical);
    if !is_placeholder(&c) {
        return c;
    }
    NONE_PLACEHOLDER.to_string()
}

fn dual_labeled(pathology: Option<&FieldValue>, clinical: Option<&FieldValue>) -> String {
    let p = format_optional(pathology);
    let c = format_optional(clinical);
    match (is_placeholder(&p), is_placeholder(&c)) {
        (true, _) => or_placeholder(c),
        (false, false) => format!("{PATHOLOGY_LABEL} {p}\n\n{CLINICAL_LABEL} {c}"),
        (false, true) => p,
    }
}

fn stage_grade(pathology: Option<&FieldValue>, clinical: Option<&FieldValue>) -> String {
    let clinical = match clinical {
        Some(value) if !value.is_absent() => value,
        _ => return NONE_PLACEHOLDER.to_string(),
    };
    let p = match pathology {
        Some(value) if !value.is_absent() => format_data(value),
        _ => String::new(),
    };
    let c = format_data(clinical);
    or_placeholder(format!("{p} {c}").trim())
}
