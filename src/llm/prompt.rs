/// Line inserted into pathology text when the hospital export truncated a result.
/// The pathology prompt reacts to it by emitting a `comments` field.
pub const TEXT_TOO_LONG_MARKER: &str =
    "***TEXT TOO LONG TO EXTRACT! MAKE SURE TO INCLUDE REMARK AT THE END OF THE ANALYSIS REPORT***";

/// Comment the model is asked to put in the JSON block when the marker is present.
pub const TEXT_TOO_LONG_COMMENT: &str =
    "pathology text too long to extract. Please extract manually";

/// Separator placed between chunk responses handed to the combine call.
pub const BATCH_SEPARATOR: &str = "\n\n--- Next Batch ---\n\n";

pub const PATHOLOGY_SYSTEM_PROMPT: &str = r#"
You are analyzing a pathology report written in Hebrew. Extract the following
information and report it in English:
1. pTNM results (also written pTMN).
2. The markers the tissues were stained for (e.g. Ki-67, ER, PR, HER-2).
3. Immunostaining results.
4. Immunostaining for MMR.
5. Which tissues were examined and stained, with details per site.
6. PDL1 status and the percentage of cancer cells stained for PDL1.
7. Tumor mutational burden (TMB).
8. CEA (carcinoembryonic antigen).
9. Tumor stage or grade (e.g. 4B).
10. General cancer type. Use one of: Breast Cancer, Pancreatic Cancer,
    Colorectal Cancer, Lung Cancer, Ovarian Cancer, Endometrial Cancer.
    If none fits, answer as precisely as possible.
11. The diagnosis or type of cancer (e.g. invasive lobular carcinoma).
12. The procedures performed.
13. Metastases.
14. Any other genetic data or metadata (put it under "genetic_metadata").

If the text contains the line
***TEXT TOO LONG TO EXTRACT! MAKE SURE TO INCLUDE REMARK AT THE END OF THE ANALYSIS REPORT***
repeat that line verbatim at the end of the summary and add a "comments" field
to the JSON with the value "pathology text too long to extract. Please extract manually".
Otherwise omit the "comments" field.

OUTPUT FORMAT:
First a section labeled "Human-readable Summary" listing the items above in
order as "N. **Label**: value". Write "Not provided in the report" for missing items.
Then a complete, valid JSON block wrapped in ```json``` fences, using exactly
these snake_case keys (null or [] when missing):

```json
{
  "ptnm_results": null,
  "tissues_stained_for": [],
  "immunostaining_results": null,
  "immunostaining_for_mmr": null,
  "tumor_burden_tmb": null,
  "pdl1": null,
  "percentage_of_cancer_cells_stained_for_pdl1": null,
  "cea": null,
  "tissues_examined_and_stained": [
    {"site": "<site>", "details": ["<detail>"]}
  ],
  "tumor_stage_or_grade": null,
  "general_cancer_type": null,
  "diagnosis_or_type_of_cancer": null,
  "type_of_procedure_performed": [],
  "metastases": null,
  "genetic_metadata": {}
}
```
"#;

pub const CLINICAL_SYSTEM_PROMPT: &str = r#"
You are extracting information from a patient's medical records written in
Hebrew. Report the following in English:
1. Ethnicity. For Jewish patients specify Ashkenazi, Sephardi, Mizrahi, etc.,
   or the country the patient or their family emigrated from.
2. Family history of diseases, grouped by side (paternal / maternal), with the
   relative, the condition, the age of onset if given, and any mutations.
3. Allergies, split into drug-related and non-drug-related lists.
4. Tumor stage or grade, including histological grade and descriptive features.
5. pTNM results (e.g. pT3N1M0) as a separate entry from stage or grade.
6. General cancer type. Use one of: Breast Cancer, Pancreatic Cancer,
   Colorectal Cancer, Lung Cancer, Ovarian Cancer, Endometrial Cancer.
   If none fits, answer as precisely as possible.
7. Genetic data (expressed genes, mutations: Ki-67, ER, PR, HER-2, BRCA, ...).
8. Metastases, if mentioned.

OUTPUT FORMAT:
First a section labeled "Human-readable Summary" listing the items above in
order as "N. **Label**: value". Write "Not provided in the report" for missing items.
Then a complete, valid JSON block wrapped in ```json``` fences, using exactly
these snake_case keys. Include genetic_metadata entries only when found:

```json
{
  "ethnicity": null,
  "family_history": {
    "paternal": [
      {"relative": null, "condition": null, "age_of_onset": null, "mutations": []}
    ],
    "maternal": [
      {"relative": null, "condition": null, "age_of_onset": null, "mutations": []}
    ]
  },
  "allergies": {
    "drug_related": [],
    "non_drug_related": []
  },
  "tumor_stage_or_grade": null,
  "ptnm_results": null,
  "general_cancer_type": null,
  "genetic_metadata": {},
  "metastases": null
}
```
"#;

pub const COMBINE_SYSTEM_PROMPT: &str = r#"
You are a medical data summarization assistant. You receive several analysis
reports produced in batches for ONE patient, separated by "--- Next Batch ---".
Combine them into a single coherent analysis.

RULES (NO EXCEPTIONS):
1. Keep the JSON structure exactly: same key names, same key order, same
   nesting, same value types. Keep keys whose value is null.
2. Merge only the values inside each key. Summarize duplicated information;
   never drop a key and never add one.
3. Keep the layout of the human-readable summary, merging its content.

OUTPUT FORMAT:
The merged "Human-readable Summary", then the merged JSON wrapped in ```json``` fences.
"#;

pub const TRANSLATION_SYSTEM_PROMPT: &str =
    "You are a translator. Translate the following text from Hebrew to English. \
     Output the translation only.";

/// Build the user message for a combine call.
pub fn build_combine_prompt(responses: &[&str]) -> String {
    responses.join(BATCH_SEPARATOR)
}
