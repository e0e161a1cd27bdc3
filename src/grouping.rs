//! Group Builder - partitions the working table into duplicate candidate groups
//!
//! Keys keep first-seen order and rows keep ingestion order inside a group.
//! Rows with an empty key never group, not even with each other.

use crate::normalize::group_key;
use crate::record::Record;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// Empty key or a single row: emitted unchanged.
    Passthrough,
    /// Two or more rows sharing a non-empty key: sent to the merge service.
    Merge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub key: String,
    pub records: Vec<Record>,
}

impl DuplicateGroup {
    pub fn kind(&self) -> GroupKind {
        if self.key.is_empty() || self.records.len() < 2 {
            GroupKind::Passthrough
        } else {
            GroupKind::Merge
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Name used in log lines: the first row's `FullName`, else the key.
    pub fn display_name(&self) -> &str {
        self.records
            .first()
            .map(|r| r.full_name())
            .filter(|n| !n.is_empty())
            .unwrap_or(self.key.as_str())
    }
}

/// Partition records by their attached grouping key.
pub fn build_groups(records: Vec<Record>) -> Vec<DuplicateGroup> {
    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut index: IndexMap<String, usize> = IndexMap::new();

    for record in records {
        let key = group_key(&record).to_string();
        if key.is_empty() {
            groups.push(DuplicateGroup { key, records: vec![record] });
            continue;
        }
        match index.get(&key) {
            Some(&pos) => groups[pos].records.push(record),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(DuplicateGroup { key, records: vec![record] });
            }
        }
    }

    groups
}
