//! Output writer - turns the merged table into a DataFrame and writes CSV

use crate::error::{MergeError, Result};
use crate::record::OutputTable;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// One nullable string column per output field, in table column order.
pub fn to_dataframe(table: &OutputTable) -> Result<DataFrame> {
    let columns: Vec<Series> = table
        .columns
        .iter()
        .map(|name| {
            let values: Vec<Option<&str>> = table.rows.iter().map(|r| r.get(name)).collect();
            Series::new(name.as_str(), values)
        })
        .collect();

    DataFrame::new(columns).map_err(|e| MergeError::Polars(format!("Failed to build output frame: {}", e)))
}

/// Write the table with a header row. An empty table produces an empty file.
pub fn write_csv(table: &OutputTable, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    if table.columns.is_empty() {
        info!("Wrote empty output to {:?}", path);
        return Ok(0);
    }

    let mut df = to_dataframe(table)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(&mut df)
        .map_err(|e| MergeError::Polars(format!("Failed to write {:?}: {}", path, e)))?;

    info!("Wrote {} rows to {:?}", df.height(), path);
    Ok(df.height())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn table() -> OutputTable {
        OutputTable::from_records(vec![
            Record::from_pairs([("email", Some("jane@x.com")), ("FullName", Some("Jane, Doe"))]),
            Record::from_pairs([("FullName", Some("Bob")), ("company", Some("Acme"))]),
        ])
    }

    #[test]
    fn test_to_dataframe_shape() {
        let df = to_dataframe(&table()).unwrap();
        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.get_column_names(), vec!["FullName", "email", "company"]);
        assert_eq!(df.column("email").unwrap().null_count(), 1);
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("merged.csv");
        let rows = write_csv(&table(), &path).unwrap();
        assert_eq!(rows, 2);

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("FullName,email,company"));
        assert_eq!(lines.next(), Some("\"Jane, Doe\",jane@x.com,"));
        assert_eq!(lines.next(), Some("Bob,,Acme"));
    }

    #[test]
    fn test_write_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.csv");
        assert_eq!(write_csv(&OutputTable::default(), &path).unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
