//! Record model - one contact row as an ordered field -> value mapping
//!
//! Field sets differ per source; the working table's schema is the union of
//! every field seen. Absent and empty values are the same thing here: both are
//! stored as `None`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canonical name of the contact's display name. Always present after harmonization.
pub const FULL_NAME: &str = "FullName";

/// Helper field carrying the normalized grouping key. Never written to the output.
pub const GROUP_KEY_FIELD: &str = "normalized_name";

/// Canonical vocabulary other than `FullName`, in harmonization order.
pub const CANONICAL_FIELDS: &[&str] = &[
    "job_title",
    "department",
    "company",
    "address",
    "email",
    "website",
    "mobile_number",
    "phone_number",
    "country",
    "city",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, Option<String>>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from `(field, value)` pairs; empty values become absent.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = Self::new();
        for (k, v) in pairs {
            record.set(k, v.map(Into::into));
        }
        record
    }

    /// Convert a JSON object returned by the merge service into a record.
    ///
    /// `null` is absent, strings are kept verbatim, and any other value keeps
    /// its compact JSON text so nothing the service returned is lost.
    pub fn from_json_object(object: &Map<String, Value>) -> Self {
        let mut record = Self::new();
        for (key, value) in object {
            let value = match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            };
            record.set(key.clone(), value);
        }
        record
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.as_deref())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Insert or overwrite a field. Empty strings are normalized to `None`,
    /// except for `FullName`, which keeps an explicit empty value.
    pub fn set(&mut self, field: impl Into<String>, value: Option<String>) {
        let field = field.into();
        let value = match value {
            Some(v) if v.is_empty() && field != FULL_NAME => None,
            other => other,
        };
        self.fields.insert(field, value);
    }

    pub fn remove(&mut self, field: &str) -> Option<Option<String>> {
        self.fields.shift_remove(field)
    }

    /// The record's `FullName`, or `""` when missing.
    pub fn full_name(&self) -> &str {
        self.get(FULL_NAME).unwrap_or("")
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Rename fields in place, keeping field order. Renames onto a name that is
    /// already taken keep the value that was there first.
    pub(crate) fn rename_fields(&mut self, renames: &IndexMap<String, String>) {
        let mut renamed: IndexMap<String, Option<String>> = IndexMap::with_capacity(self.fields.len());
        for (field, value) in self.fields.drain(..) {
            let target = renames.get(&field).cloned().unwrap_or(field);
            renamed.entry(target).or_insert(value);
        }
        self.fields = renamed;
    }
}

/// Final ordered record set with its column schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTable {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl OutputTable {
    /// Union of all fields in first-seen order, grouping key dropped,
    /// `FullName` promoted to the first column when present.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut columns: IndexMap<String, ()> = IndexMap::new();
        let rows: Vec<Record> = records
            .into_iter()
            .map(|mut r| {
                r.remove(GROUP_KEY_FIELD);
                for field in r.field_names() {
                    if !columns.contains_key(field) {
                        columns.insert(field.to_string(), ());
                    }
                }
                r
            })
            .collect();

        let mut columns: Vec<String> = columns.into_keys().collect();
        if let Some(pos) = columns.iter().position(|c| c == FULL_NAME) {
            let full_name = columns.remove(pos);
            columns.insert(0, full_name);
        }

        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
