//! Ingestion - loads every CSV source in a directory into harmonized records
//!
//! Loading is a best-effort fold: each file either contributes its rows or a
//! `SourceFailure`, and one bad file never stops the others.

use crate::error::{MergeError, Result};
use crate::harmonize::SchemaHarmonizer;
use crate::record::Record;
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Cell texts treated as missing values.
const NA_VALUES: &[&str] = &["", "NA", "NaN"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedSource {
    pub path: PathBuf,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    pub records: Vec<Record>,
    pub sources: Vec<LoadedSource>,
    pub failures: Vec<SourceFailure>,
}

impl LoadOutcome {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Create the input directory when it does not exist yet.
pub fn ensure_input_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        info!("Creating input directory {:?}", dir);
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// `*.csv` files directly inside `dir`, sorted by name.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Load and harmonize every CSV file in `dir`.
pub fn load_directory(dir: &Path, harmonizer: &SchemaHarmonizer) -> Result<LoadOutcome> {
    let paths = list_csv_files(dir)?;
    if paths.is_empty() {
        warn!("No CSV files found in {:?}. Producing empty output.", dir);
        return Ok(LoadOutcome::default());
    }

    let outcome = paths.into_iter().fold(LoadOutcome::default(), |mut acc, path| {
        match load_csv_file(&path, harmonizer) {
            Ok(records) => {
                info!("Loaded: {:?} with {} rows", path, records.len());
                acc.sources.push(LoadedSource { path, rows: records.len() });
                acc.records.extend(records);
            }
            Err(e) => {
                error!("Failed to read {:?}: {}", path, e);
                acc.failures.push(SourceFailure { path, reason: e.to_string() });
            }
        }
        acc
    });

    Ok(outcome)
}

/// Parse one CSV file into harmonized records.
pub fn load_csv_file(path: &Path, harmonizer: &SchemaHarmonizer) -> Result<Vec<Record>> {
    let text = fs::read_to_string(path).map_err(|e| MergeError::SourceRead {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_csv(&text, harmonizer).map_err(|e| MergeError::SourceRead {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Parse CSV text; the header row defines the fields for every record.
pub fn parse_csv(text: &str, harmonizer: &SchemaHarmonizer) -> Result<Vec<Record>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.trim_start_matches('\u{feff}').as_bytes());

    let headers = dedupe_headers(rdr.headers()?.iter().map(|h| h.trim().to_string()).collect());
    let plan = harmonizer.rename_plan(headers.iter().map(String::as_str));

    let mut out = Vec::new();
    for result in rdr.records() {
        let row = result?;
        let mut record = Record::new();
        for (idx, header) in headers.iter().enumerate() {
            record.set(header.clone(), clean_cell(row.get(idx).unwrap_or("")));
        }
        harmonizer.apply(&mut record, &plan);
        out.push(record);
    }

    Ok(out)
}

/// Repeated header names get `.1`, `.2`, ... suffixes so no column is lost.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(headers.len());
    for header in headers {
        let mut count = seen.get(&header).copied().unwrap_or(0);
        let mut name = header.clone();
        while seen.contains_key(&name) {
            count += 1;
            name = format!("{}.{}", header, count);
        }
        seen.insert(header, count);
        seen.entry(name.clone()).or_insert(0);
        out.push(name);
    }
    out
}

/// Missing-value markers become `None`; anything else is kept verbatim.
fn clean_cell(raw: &str) -> Option<String> {
    if NA_VALUES.contains(&raw.trim()) {
        None
    } else {
        Some(raw.to_string())
    }
}
