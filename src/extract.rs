//! Response Extractor - recovers one JSON value from free-text model output
//!
//! Models wrap their answer in code fences or surround it with commentary, so
//! three strategies are tried in order and the first success wins:
//!
//! 1. the whole (trimmed) text parses as JSON
//! 2. a fenced block, optionally tagged `json`, wraps a `{...}` object
//! 3. a brace-depth scan over the text; every balanced top-level `{...}` span
//!    is a candidate, and a candidate that fails to parse is dropped while the
//!    scan moves on to the next one
//!
//! Failing all three is an expected outcome and yields `None`.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref FENCED_OBJECT: Regex =
        Regex::new(r"(?is)```(?:json)?\s*(\{.*?\})\s*```").expect("static regex");
}

/// Which strategy produced the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    Direct,
    FencedBlock,
    BraceScan,
}

pub fn extract_json(text: &str) -> Option<Value> {
    extract_json_with_strategy(text).map(|(value, _)| value)
}

pub fn extract_json_with_strategy(text: &str) -> Option<(Value, ExtractionStrategy)> {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return Some((value, ExtractionStrategy::Direct));
    }

    if let Some(inner) = FENCED_OBJECT.captures(text).and_then(|c| c.get(1)) {
        if let Ok(value) = serde_json::from_str::<Value>(inner.as_str()) {
            return Some((value, ExtractionStrategy::FencedBlock));
        }
    }

    scan_balanced_objects(text).map(|value| (value, ExtractionStrategy::BraceScan))
}

/// Depth-tracking scan: remember where depth went 0 -> 1, try to parse when it
/// comes back to 0, and on failure forget that start and keep scanning.
fn scan_balanced_objects(text: &str) -> Option<Value> {
    let mut depth: usize = 0;
    let mut start: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        match ch {
            '{' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(begin) = start.take() {
                        if let Ok(value) = serde_json::from_str::<Value>(&text[begin..=idx]) {
                            return Some(value);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    None
}
