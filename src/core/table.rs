//! In-memory survey tables with a validated distance axis.
//!
//! A [`SurveyTable`] is the cleaned form of one survey's weld table: a fully
//! numeric, finite, ascending distance column plus the remaining columns
//! coerced to optional numbers and namespaced by survey identifier. Tables
//! are built once per input file and never mutated afterwards.

use thiserror::Error;

use super::columns::{self, ColumnKey};
use super::loaders::{parse_cell, RawTable};

/// Errors that can occur while building a survey table.
#[derive(Error, Debug)]
pub enum TableError {
    /// The distance column could not be resolved: a schema error, fatal
    /// for the survey. Never substituted.
    #[error("no distance column found in '{path}' (headers: {headers})")]
    DistanceColumnNotFound { path: String, headers: String },

    /// Every row lost its distance to numeric coercion.
    #[error("no rows with a parsable distance in '{path}'")]
    NoUsableRows { path: String },
}

/// Result type for table operations.
pub type Result<T> = std::result::Result<T, TableError>;

/// One namespaced numeric column of a survey.
#[derive(Debug, Clone)]
pub struct AttributeColumn {
    /// Survey-namespaced name, e.g. `r_2015_weld__Wt [in]`.
    pub name: String,
    /// Header as it appeared in the source file.
    pub source_header: String,
    /// Cell values; unparsable cells are `None`.
    pub values: Vec<Option<f64>>,
}

/// Cleaned, immutable table for one survey.
#[derive(Debug, Clone)]
pub struct SurveyTable {
    /// Survey identifier (file stem), also the column namespace prefix.
    pub id: String,
    /// Distance values: finite, sorted ascending.
    pub distance: Vec<f64>,
    /// All non-distance columns, row-aligned with `distance`.
    pub attributes: Vec<AttributeColumn>,
    /// Rows discarded during construction for lacking a usable distance.
    pub rows_dropped: usize,
}

impl SurveyTable {
    /// Build a survey table from a raw CSV table.
    ///
    /// Resolves the distance column, coerces it to `f64` (unparsable cells
    /// become missing), drops rows without a distance, sorts the survivors
    /// ascending, and namespaces every other column as `<id>__<header>`.
    ///
    /// # Errors
    ///
    /// Fails if no header matches an accepted distance spelling, or if no
    /// row survives coercion.
    pub fn from_raw(raw: &RawTable, id: &str) -> Result<Self> {
        let path = raw
            .source_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| id.to_string());

        let distance_header = columns::resolve(&raw.headers, ColumnKey::Distance)
            .ok_or_else(|| TableError::DistanceColumnNotFound {
                path: path.clone(),
                headers: raw.headers.join(", "),
            })?
            .to_string();
        let distance_idx = raw
            .column_index(&distance_header)
            .expect("resolved header exists");

        // Keep only rows with a parsable, finite distance, then order them
        // by distance so the matcher can binary-search.
        let mut keep: Vec<(usize, f64)> = raw
            .records
            .iter()
            .enumerate()
            .filter_map(|(i, row)| parse_cell(&row[distance_idx]).map(|d| (i, d)))
            .collect();
        keep.sort_by(|a, b| a.1.partial_cmp(&b.1).expect("finite distances"));

        if keep.is_empty() {
            return Err(TableError::NoUsableRows { path });
        }
        let rows_dropped = raw.num_rows() - keep.len();

        let distance: Vec<f64> = keep.iter().map(|&(_, d)| d).collect();

        let attributes: Vec<AttributeColumn> = raw
            .headers
            .iter()
            .enumerate()
            .filter(|&(idx, _)| idx != distance_idx)
            .map(|(idx, header)| AttributeColumn {
                name: format!("{}__{}", id, header),
                source_header: header.clone(),
                values: keep
                    .iter()
                    .map(|&(row, _)| parse_cell(&raw.records[row][idx]))
                    .collect(),
            })
            .collect();

        Ok(Self {
            id: id.to_string(),
            distance,
            attributes,
            rows_dropped,
        })
    }

    /// Returns the number of usable rows.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.distance.len()
    }

    /// Find the column for a canonical attribute key, if this survey has one.
    ///
    /// Resolution runs over the source headers, so surveys with different
    /// attribute vocabularies each answer independently.
    pub fn attribute(&self, key: ColumnKey) -> Option<&AttributeColumn> {
        let headers: Vec<&str> = self
            .attributes
            .iter()
            .map(|c| c.source_header.as_str())
            .collect();
        let resolved = columns::resolve(&headers, key)?;
        self.attributes.iter().find(|c| c.source_header == resolved)
    }
}
