//! Name Normalizer - canonical comparison key used for duplicate grouping

use crate::record::{Record, FULL_NAME, GROUP_KEY_FIELD};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s]").expect("static regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("static regex");
}

/// Lowercase, turn punctuation into spaces, collapse whitespace, trim.
/// Missing input yields `""`.
pub fn normalize_name(name: Option<&str>) -> String {
    let Some(name) = name else {
        return String::new();
    };
    let lowered = name.trim().to_lowercase();
    let spaced = NON_WORD.replace_all(&lowered, " ");
    WHITESPACE.replace_all(&spaced, " ").trim().to_string()
}

/// Store the normalized `FullName` under the grouping helper field.
pub fn attach_group_key(record: &mut Record) {
    let key = normalize_name(record.get(FULL_NAME));
    record.set(GROUP_KEY_FIELD, Some(key));
}

/// Read the grouping key back; records without one never group.
pub fn group_key(record: &Record) -> &str {
    record.get(GROUP_KEY_FIELD).unwrap_or("")
}
