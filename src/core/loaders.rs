//! CSV loaders for per-survey weld tables and intermediate artifacts.
//!
//! Survey files arrive with vendor-specific headers and free-form numeric
//! formatting, so loading stops at the string level: a [`RawTable`] keeps
//! headers and cell text exactly as read. Numeric interpretation happens
//! later, during [`SurveyTable`](crate::core::table::SurveyTable)
//! construction.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use regex::Regex;
use thiserror::Error;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// A flat table read verbatim from CSV: headers plus string records.
#[derive(Debug, Clone)]
pub struct RawTable {
    /// Column headers in file order.
    pub headers: Vec<String>,
    /// Data rows; short rows are padded with empty cells to header width.
    pub records: Vec<Vec<String>>,
    /// Source file path.
    pub source_path: Option<PathBuf>,
}

impl RawTable {
    /// Returns the number of data rows.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.records.len()
    }

    /// Index of a header by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// All cell values of one column by exact header name.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.records.iter().map(|r| r[idx].as_str()).collect())
    }
}

/// Load a CSV file into a [`RawTable`].
///
/// The reader is flexible: rows shorter than the header are padded with
/// empty cells, rows longer than the header keep only the leading cells.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid CSV, or
/// contains no data rows.
pub fn load_table_csv<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let width = headers.len();

    let mut records = Vec::with_capacity(1024);
    for result in reader.records() {
        let record = result?;
        let mut row: Vec<String> = record.iter().take(width).map(|c| c.to_string()).collect();
        row.resize(width, String::new());
        records.push(row);
    }

    if records.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(RawTable {
        headers,
        records,
        source_path: Some(path.to_path_buf()),
    })
}

/// Survey identifier derived from a file path: the file stem.
///
/// `extracted/r_2015_weld.csv` becomes `r_2015_weld`, which is also the
/// namespace prefix for that survey's columns in merged output.
pub fn survey_id_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "survey".to_string())
}

/// Extract a plausible survey year (1900-2100) from a survey identifier.
///
/// Used to order the fitted pair chronologically regardless of the order
/// the files were passed in.
pub fn survey_year(survey_id: &str) -> Option<i32> {
    let pattern = Regex::new(r"(19|20)\d{2}").expect("valid year pattern");
    let year = pattern
        .find_iter(survey_id)
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .find(|&y| (1900..=2100).contains(&y));
    year
}

/// Parse a cell as `f64`, mapping empty/unparsable/non-finite to `None`.
///
/// This is the single numeric-coercion point for the whole crate:
/// bad cells become missing values and are never an error.
pub fn parse_cell(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_table_csv() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "event,log dist. [ft],t [in]").unwrap();
        writeln!(file, "Weld,100.5,0.25").unwrap();
        writeln!(file, "Weld,203.1,").unwrap();
        file.flush().unwrap();

        let table = load_table_csv(file.path())?;
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.headers, vec!["event", "log dist. [ft]", "t [in]"]);
        assert_eq!(table.column("log dist. [ft]").unwrap(), vec!["100.5", "203.1"]);
        assert_eq!(table.records[1][2], "");

        Ok(())
    }

    #[test]
    fn test_load_table_csv_pads_short_rows() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a,b,c").unwrap();
        writeln!(file, "1,2").unwrap();
        file.flush().unwrap();

        let table = load_table_csv(file.path())?;
        assert_eq!(table.records[0], vec!["1", "2", ""]);

        Ok(())
    }

    #[test]
    fn test_load_table_csv_empty() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a,b").unwrap();
        file.flush().unwrap();

        let result = load_table_csv(file.path());
        assert!(matches!(result, Err(LoaderError::EmptyFile(_))));
    }

    #[test]
    fn test_survey_id_from_path() {
        assert_eq!(
            survey_id_from_path(Path::new("extracted/r_2015_weld_aligned.csv")),
            "r_2015_weld_aligned"
        );
    }

    #[test]
    fn test_survey_year() {
        assert_eq!(survey_year("r_2007_weld_aligned"), Some(2007));
        assert_eq!(survey_year("r_2022"), Some(2022));
        // First plausible year wins when several appear.
        assert_eq!(survey_year("r_2007_rerun_2015"), Some(2007));
        assert_eq!(survey_year("survey_a"), None);
        // 8196 is not a plausible year
        assert_eq!(survey_year("scan_8196"), None);
    }

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell("100.5"), Some(100.5));
        assert_eq!(parse_cell("  -3.2 "), Some(-3.2));
        assert_eq!(parse_cell(""), None);
        assert_eq!(parse_cell("n/a"), None);
        assert_eq!(parse_cell("NaN"), None);
        assert_eq!(parse_cell("inf"), None);
    }
}
