//! CSV writers for the pipeline's persisted artifacts.
//!
//! Two writers cover every stage boundary:
//! - the aligned (merged/matched) table with its synthetic id column
//! - raw string tables, used for the final corrected output
//!
//! Missing cells are written as empty fields, so numeric absence survives a
//! round trip through the apply stage.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use crate::processors::assembly::AlignedTable;

use super::loaders::RawTable;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

/// Format an optional numeric cell; missing values become empty fields.
fn format_cell(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.6}", v),
        None => String::new(),
    }
}

/// Write an aligned table to CSV.
///
/// The header is `id` followed by the table's column names; `id` is a
/// 1-based sequential integer.
///
/// # Errors
///
/// Returns an error if parent directories cannot be created or the file
/// cannot be written.
pub fn write_aligned_csv(path: &Path, table: &AlignedTable) -> Result<()> {
    let mut writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();

    let mut header = Vec::with_capacity(table.columns.len() + 1);
    header.push("id".to_string());
    header.extend(table.columns.iter().map(|c| c.name.clone()));
    writer
        .write_record(&header)
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for row in 0..table.num_rows {
        let mut record = Vec::with_capacity(header.len());
        record.push((row + 1).to_string());
        for col in &table.columns {
            record.push(format_cell(col.values[row]));
        }
        writer
            .write_record(&record)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write a raw string table to CSV, headers first, cells verbatim.
///
/// # Errors
///
/// Returns an error if parent directories cannot be created or the file
/// cannot be written.
pub fn write_raw_csv(path: &Path, table: &RawTable) -> Result<()> {
    let mut writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();

    writer
        .write_record(&table.headers)
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for row in &table.records {
        writer
            .write_record(row)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::assembly::AlignedColumn;
    use std::fs;
    use tempfile::tempdir;

    fn test_table() -> AlignedTable {
        AlignedTable {
            num_rows: 2,
            columns: vec![
                AlignedColumn {
                    name: "distance_corrected".to_string(),
                    values: vec![Some(95.0), Some(197.0)],
                },
                AlignedColumn {
                    name: "height__avg".to_string(),
                    values: vec![Some(11.0), None],
                },
            ],
        }
    }

    #[test]
    fn test_write_aligned_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("merged.csv");

        write_aligned_csv(&path, &test_table()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "id,distance_corrected,height__avg");
        assert_eq!(lines[1], "1,95.000000,11.000000");
        // Missing cell stays empty.
        assert_eq!(lines[2], "2,197.000000,");
    }

    #[test]
    fn test_write_aligned_csv_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aligned").join("nested").join("merged.csv");

        write_aligned_csv(&path, &test_table()).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_write_raw_csv_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("final.csv");

        let table = RawTable {
            headers: vec!["id".to_string(), "type".to_string()],
            records: vec![
                vec!["1".to_string(), "weld".to_string()],
                vec!["2".to_string(), "weld".to_string()],
            ],
            source_path: None,
        };

        write_raw_csv(&path, &table).unwrap();

        let read_back = crate::core::loaders::load_table_csv(&path).unwrap();
        assert_eq!(read_back.headers, table.headers);
        assert_eq!(read_back.records, table.records);
    }
}
