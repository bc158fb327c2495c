//! Nearest-distance weld matching across surveys.
//!
//! A one-sided nearest-neighbor join: every primary row looks for the
//! closest secondary row by absolute distance difference and keeps it only
//! within the tolerance. Secondary rows are reusable (no 1:1 assignment),
//! and secondary rows nobody claims simply never appear. Further surveys
//! attach the same way, keyed on the already-joined primary distance.

use thiserror::Error;

use crate::core::table::SurveyTable;

/// Matching tolerance in distance units. Matches farther apart than this
/// are never physical: welds sit tens of units apart and odometer drift
/// stays well below this bound over one joint.
pub const MATCH_TOLERANCE: f64 = 20.0;

/// Errors that can occur during matching.
#[derive(Error, Debug)]
pub enum MatchError {
    /// No primary row found a partner within tolerance: insufficient data,
    /// fatal for the stage.
    #[error("no weld pairs matched between '{primary}' and '{secondary}' within {tolerance} units")]
    NoMatches {
        primary: String,
        secondary: String,
        tolerance: f64,
    },
}

/// Result type for matching operations.
pub type Result<T> = std::result::Result<T, MatchError>;

/// One surviving joined row: indices into the participating survey tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedRow {
    /// Row in the primary survey.
    pub primary: usize,
    /// Nearest-in-tolerance row in the secondary survey.
    pub secondary: usize,
    /// Row in the tertiary survey, when one was attached and matched.
    /// `None` means the row keeps its pair data but lacks tertiary fields.
    pub tertiary: Option<usize>,
}

/// Join result over two (optionally three) survey tables.
#[derive(Debug, Clone)]
pub struct MatchedTable {
    pub rows: Vec<MatchedRow>,
    /// Primary rows dropped for lacking a partner within tolerance.
    pub unmatched_primary: usize,
}

impl MatchedTable {
    /// Number of surviving matched rows.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// The matched (primary, secondary) distance pairs, in row order.
    pub fn distance_pairs(
        &self,
        primary: &SurveyTable,
        secondary: &SurveyTable,
    ) -> Vec<(f64, f64)> {
        self.rows
            .iter()
            .map(|r| (primary.distance[r.primary], secondary.distance[r.secondary]))
            .collect()
    }
}

/// Index of the nearest value in a sorted slice, or `None` when empty.
fn nearest_index(sorted: &[f64], x: f64) -> Option<usize> {
    if sorted.is_empty() {
        return None;
    }
    let idx = sorted.partition_point(|&v| v < x);
    let below = idx.checked_sub(1);
    let above = (idx < sorted.len()).then_some(idx);

    match (below, above) {
        (Some(b), Some(a)) => {
            // Ties to the earlier row.
            if (x - sorted[b]).abs() <= (sorted[a] - x).abs() {
                Some(b)
            } else {
                Some(a)
            }
        }
        (Some(b), None) => Some(b),
        (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

/// Join two surveys by nearest distance within `tolerance`.
///
/// Primary rows without an eligible secondary partner are dropped (inner
/// join); a secondary row may be claimed by several primary rows.
///
/// # Errors
///
/// Fails when fewer than one pair survives.
pub fn match_pair(
    primary: &SurveyTable,
    secondary: &SurveyTable,
    tolerance: f64,
) -> Result<MatchedTable> {
    let mut rows = Vec::with_capacity(primary.num_rows());
    let mut unmatched_primary = 0;

    for (p_idx, &d) in primary.distance.iter().enumerate() {
        match nearest_index(&secondary.distance, d) {
            Some(s_idx) if (secondary.distance[s_idx] - d).abs() <= tolerance => {
                rows.push(MatchedRow {
                    primary: p_idx,
                    secondary: s_idx,
                    tertiary: None,
                });
            }
            _ => unmatched_primary += 1,
        }
    }

    if rows.is_empty() {
        return Err(MatchError::NoMatches {
            primary: primary.id.clone(),
            secondary: secondary.id.clone(),
            tolerance,
        });
    }

    Ok(MatchedTable {
        rows,
        unmatched_primary,
    })
}

/// Attach a third survey to an existing join, keyed on the primary distance.
///
/// Rows whose nearest tertiary distance exceeds the tolerance keep their
/// pair data with the tertiary index absent. Returns the number of rows
/// that gained a tertiary match.
pub fn attach_survey(
    matched: &mut MatchedTable,
    primary: &SurveyTable,
    tertiary: &SurveyTable,
    tolerance: f64,
) -> usize {
    let mut attached = 0;
    for row in &mut matched.rows {
        let d = primary.distance[row.primary];
        row.tertiary = match nearest_index(&tertiary.distance, d) {
            Some(t_idx) if (tertiary.distance[t_idx] - d).abs() <= tolerance => {
                attached += 1;
                Some(t_idx)
            }
            _ => None,
        };
    }
    attached
}
