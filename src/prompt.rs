//! Prompt Composer - serializes a merge group into the instruction payload

use crate::error::Result;
use crate::record::{Record, GROUP_KEY_FIELD};
use indexmap::IndexMap;

const MERGE_RULES: &[&str] = &[
    "Combine all available information.",
    "For conflicting fields, choose the most complete or most professional-looking value (e.g., a full job title is better than an acronym).",
    "If one record has a value and another is empty, use the value that is present.",
    "Ensure all phone numbers are in a standard international format (E.164 with +country code when possible).",
    "Prefer consistent casing (e.g., emails lowercase, names in title case if appropriate).",
    "Keep field names as-is from the input (do not invent new fields unless necessary to clarify a value).",
];

/// Rows aligned to the group's field union; fields a row lacks become `null`.
fn aligned_rows(records: &[Record]) -> Vec<IndexMap<&str, Option<&str>>> {
    let mut fields: Vec<&str> = Vec::new();
    for record in records {
        for field in record.field_names() {
            if field != GROUP_KEY_FIELD && !fields.contains(&field) {
                fields.push(field);
            }
        }
    }

    records
        .iter()
        .map(|r| fields.iter().map(|f| (*f, r.get(f))).collect())
        .collect()
}

/// Build the merge prompt for one duplicate group.
///
/// Deterministic: the same group always yields the same payload.
pub fn compose_merge_prompt(records: &[Record]) -> Result<String> {
    let rows_json = serde_json::to_string_pretty(&aligned_rows(records))?;
    let rules: String = MERGE_RULES.iter().map(|r| format!("- {}\n", r)).collect();

    Ok(format!(
        r#"You are an expert data deduplication assistant. I have the following contact records that might be for the same person. Your task is to merge them into a single, definitive JSON record.

Rules:
{}
Here are the records to merge:
{}

Please provide ONLY the merged JSON object as your response, with no other text or explanation."#,
        rules, rows_json
    ))
}
