//! File-to-file pipeline stages.
//!
//! The pipeline is a strict sequence of pure transformations over flat CSV
//! artifacts: per-survey weld tables go in, an aligned/merged table comes
//! out of the align stage, and the apply stage turns that into the final
//! corrected record set. Each stage reads complete tables, computes, and
//! writes a complete output; a missing input artifact fails the stage fast.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{info, warn};

use crate::config::PipelineConfig;
use crate::core::loaders::{self, RawTable};
use crate::core::table::SurveyTable;
use crate::core::writers;

use super::assembly::{self, survey_suffix};
use super::correction;
use super::drift::{DriftModel, DriftSummary};
use super::matching;

/// Per-survey load statistics for stage reporting.
#[derive(Debug, Clone)]
pub struct SurveyStats {
    pub id: String,
    pub rows_in: usize,
    pub rows_kept: usize,
}

/// Outcome of the align stage.
#[derive(Debug, Clone)]
pub struct AlignReport {
    pub surveys: Vec<SurveyStats>,
    pub matched_rows: usize,
    pub unmatched_primary: usize,
    /// Rows that also matched the tertiary survey, when one was given.
    pub tertiary_attached: Option<usize>,
    pub drift: DriftSummary,
    pub output: PathBuf,
}

/// Outcome of the apply stage.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub rows: usize,
    pub pairs_used: usize,
    pub drift: DriftSummary,
    pub compound: bool,
    pub output: PathBuf,
}

/// Load one survey file into a cleaned [`SurveyTable`].
fn load_survey(path: &Path) -> Result<(SurveyTable, usize)> {
    let raw = loaders::load_table_csv(path)
        .with_context(|| format!("failed to load survey file: {}", path.display()))?;
    let id = loaders::survey_id_from_path(path);
    let rows_in = raw.num_rows();

    let table = SurveyTable::from_raw(&raw, &id)
        .with_context(|| format!("failed to prepare survey '{}'", id))?;
    info!(
        "{}: {} rows read, {} with usable distance ({} dropped)",
        id,
        rows_in,
        table.num_rows(),
        table.rows_dropped
    );

    Ok((table, rows_in))
}

/// Order the fitted pair chronologically when both identifiers carry a
/// year; otherwise keep the input order.
fn order_fitted_pair(mut tables: Vec<SurveyTable>) -> Vec<SurveyTable> {
    if tables.len() >= 2 {
        let ya = loaders::survey_year(&tables[0].id);
        let yb = loaders::survey_year(&tables[1].id);
        if let (Some(ya), Some(yb)) = (ya, yb) {
            if yb < ya {
                tables.swap(0, 1);
            }
        }
    }
    tables
}

/// Align stage: match welds across 2-3 survey files, fit the drift model,
/// correct the primary distances and write the merged table.
///
/// # Errors
///
/// Fails on unreadable inputs, an unresolvable distance column, zero
/// matched pairs, or write failures. A single matched pair only degrades
/// to a constant drift model, reported as a warning.
pub fn align_files(inputs: &[PathBuf], output: &Path, config: &PipelineConfig) -> Result<AlignReport> {
    if inputs.len() < 2 {
        bail!("align stage needs at least 2 survey files, got {}", inputs.len());
    }
    if inputs.len() > 3 {
        bail!(
            "align stage supports at most 3 survey files (2 fitted + 1 attached), got {}",
            inputs.len()
        );
    }

    let mut tables = Vec::with_capacity(inputs.len());
    let mut surveys = Vec::with_capacity(inputs.len());
    for path in inputs {
        let (table, rows_in) = load_survey(path)?;
        surveys.push(SurveyStats {
            id: table.id.clone(),
            rows_in,
            rows_kept: table.num_rows(),
        });
        tables.push(table);
    }

    let tables = order_fitted_pair(tables);
    let tolerance = config.matching.tolerance;

    let (primary, rest) = tables.split_first().expect("at least two tables");
    let (secondary, extra) = rest.split_first().expect("at least two tables");

    let mut matched = matching::match_pair(primary, secondary, tolerance)?;
    info!(
        "matched {} weld pairs between '{}' and '{}' ({} primary rows unmatched)",
        matched.num_rows(),
        primary.id,
        secondary.id,
        matched.unmatched_primary
    );

    let tertiary = extra.first();
    let tertiary_attached = tertiary.map(|t| {
        let attached = matching::attach_survey(&mut matched, primary, t, tolerance);
        info!(
            "attached '{}' to {} of {} rows",
            t.id,
            attached,
            matched.num_rows()
        );
        attached
    });

    let model = DriftModel::from_pairs(&matched.distance_pairs(primary, secondary))?;
    if model.is_degenerate() {
        warn!(
            "drift model built from a single matched pair; correction is a constant {} units",
            model.anchors()[0].delta
        );
    }
    let drift = model.summary();
    info!(
        "drift over [{:.2}, {:.2}]: min {:.4}, max {:.4}, mean {:.4}, std {:.4}",
        drift.x_min, drift.x_max, drift.delta_min, drift.delta_max, drift.delta_mean, drift.delta_std
    );

    let aligned = assembly::assemble(&matched, primary, secondary, tertiary, &model);
    writers::write_aligned_csv(output, &aligned)
        .with_context(|| format!("failed to write aligned table: {}", output.display()))?;

    Ok(AlignReport {
        surveys,
        matched_rows: matched.num_rows(),
        unmatched_primary: matched.unmatched_primary,
        tertiary_attached,
        drift,
        output: output.to_path_buf(),
    })
}

/// Raw distance columns preserved by the align stage, as
/// (primary header, secondary header), ordered chronologically when the
/// namespace prefixes carry years.
fn fitted_distance_headers(table: &RawTable) -> Result<(String, String)> {
    let mut raw_cols: Vec<&String> = table
        .headers
        .iter()
        .filter(|h| h.ends_with("__distance"))
        .collect();

    if raw_cols.len() < 2 {
        bail!(
            "merged table lacks the raw distance columns of the fitted pair; \
             re-run the align stage (found: {:?})",
            raw_cols
        );
    }

    raw_cols.sort_by_key(|h| loaders::survey_year(h));
    Ok((raw_cols[0].clone(), raw_cols[1].clone()))
}

/// Parse one column of a raw table as optional numbers.
fn numeric_column(table: &RawTable, header: &str) -> Option<Vec<Option<f64>>> {
    table
        .column(header)
        .map(|cells| cells.iter().map(|c| loaders::parse_cell(c)).collect())
}

/// Rebuild the drift model from the raw distance columns of a merged table.
///
/// Returns the model, the pair of headers used, and the number of complete
/// pairs that informed the fit.
pub fn drift_from_merged(table: &RawTable) -> Result<(DriftModel, String, String, usize)> {
    let (primary_col, secondary_col) = fitted_distance_headers(table)?;

    let xs = numeric_column(table, &primary_col).expect("header exists");
    let ys = numeric_column(table, &secondary_col).expect("header exists");

    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(&ys)
        .filter_map(|(x, y)| x.zip(*y))
        .collect();

    let model = DriftModel::from_pairs(&pairs)
        .with_context(|| format!("no usable pairs in '{}'/'{}'", primary_col, secondary_col))?;

    Ok((model, primary_col, secondary_col, pairs.len()))
}

/// The raw (uncorrected) tertiary distance header of a merged table, if any.
fn tertiary_distance_header(table: &RawTable) -> Option<String> {
    table
        .headers
        .iter()
        .find(|h| {
            h.starts_with("distance_")
                && *h != "distance_corrected"
                && *h != "distance__delta"
                && !h.ends_with("_corrected")
        })
        .cloned()
}

/// Replace a column's cells, or append the column when absent.
fn set_column(table: &mut RawTable, name: &str, values: Vec<String>) {
    match table.column_index(name) {
        Some(idx) => {
            for (row, value) in table.records.iter_mut().zip(values) {
                row[idx] = value;
            }
        }
        None => {
            table.headers.push(name.to_string());
            for (row, value) in table.records.iter_mut().zip(values) {
                row.push(value);
            }
        }
    }
}

/// Drop columns by name; absent names are ignored.
fn drop_columns(table: &mut RawTable, names: &[String]) {
    let drop_idx: Vec<usize> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| names.contains(h))
        .map(|(i, _)| i)
        .collect();

    for &idx in drop_idx.iter().rev() {
        table.headers.remove(idx);
        for row in &mut table.records {
            row.remove(idx);
        }
    }
}

fn format_cells(values: &[Option<f64>]) -> Vec<String> {
    values
        .iter()
        .map(|v| match v {
            Some(v) => format!("{:.6}", v),
            None => String::new(),
        })
        .collect()
}

/// Apply stage: rebuild the drift model from the raw distances preserved in
/// the merged table and re-express the corrected columns, then prune
/// working columns and tag the records.
///
/// With `correction.compound` enabled (the default) the transform is applied
/// on top of the align-stage correction, compounding the two; disabled, the
/// align-stage value is kept and only the tertiary distance is corrected.
///
/// # Errors
///
/// Fails fast when the input artifact is missing, lacks the raw distance
/// columns, or yields no usable pairs.
pub fn apply_files(input: &Path, output: &Path, config: &PipelineConfig) -> Result<ApplyReport> {
    if !input.exists() {
        bail!(
            "apply stage input artifact missing: {} (run the align stage first)",
            input.display()
        );
    }

    let mut table = loaders::load_table_csv(input)
        .with_context(|| format!("failed to load merged table: {}", input.display()))?;

    let (model, primary_col, secondary_col, pairs_used) = drift_from_merged(&table)?;
    let drift = model.summary();
    info!(
        "rebuilt drift model from {} pairs of '{}'/'{}'",
        pairs_used, primary_col, secondary_col
    );

    let compound = config.correction.compound;
    if compound {
        match numeric_column(&table, "distance_corrected") {
            Some(values) => {
                let corrected = correction::correct_optional(&model, &values);
                set_column(&mut table, "distance_corrected", format_cells(&corrected));
                info!("re-applied drift correction to distance_corrected (compounded)");
            }
            None => warn!("merged table has no distance_corrected column; nothing to compound"),
        }
    }

    let tertiary_col = tertiary_distance_header(&table);
    if let Some(ref name) = tertiary_col {
        let values = numeric_column(&table, name).expect("header exists");
        let corrected = correction::correct_optional(&model, &values);
        set_column(&mut table, &format!("{}_corrected", name), format_cells(&corrected));
        info!("applied drift correction to {}", name);
    }

    let num_rows = table.num_rows();
    set_column(&mut table, "run_id", vec!["0".to_string(); num_rows]);

    let primary_id = primary_col.trim_end_matches("__distance");
    let secondary_id = secondary_col.trim_end_matches("__distance");
    let tertiary_suffix = tertiary_col
        .as_deref()
        .map(|c| survey_suffix(c.trim_start_matches("distance_")));
    drop_columns(
        &mut table,
        &assembly::final_drop_list(primary_id, secondary_id, tertiary_suffix.as_deref()),
    );

    set_column(&mut table, "type", vec!["weld".to_string(); num_rows]);

    writers::write_raw_csv(output, &table)
        .with_context(|| format!("failed to write corrected table: {}", output.display()))?;

    Ok(ApplyReport {
        rows: table.num_rows(),
        pairs_used,
        drift,
        compound,
        output: output.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_survey(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    fn survey_2007(dir: &Path) -> PathBuf {
        write_survey(
            dir,
            "r_2007_weld.csv",
            &[
                "id,event,log dist. [ft],Height,t [in],J. len [ft]",
                "1,Weld,100.0,10.0,0.25,40.0",
                "2,Weld,200.0,20.0,0.26,40.5",
                "3,Weld,300.0,30.0,0.27,39.5",
                "4,Weld,500.0,50.0,0.28,41.0",
            ],
        )
    }

    fn survey_2015(dir: &Path) -> PathBuf {
        write_survey(
            dir,
            "r_2015_weld.csv",
            &[
                "id,Event Description,Log Dist. [ft],Elevation,Wt [in],Joint Length",
                "1,Weld,105.0,12.0,0.35,40.2",
                "2,Weld,203.0,22.0,0.36,40.7",
                "3,Weld,298.0,32.0,0.37,39.7",
            ],
        )
    }

    fn survey_2022(dir: &Path) -> PathBuf {
        write_survey(
            dir,
            "r_2022_weld.csv",
            &[
                "id,Event Description,ILI Wheel Count [ft.],Elevation,WT [in],J. length",
                "1,Weld,102.0,11.0,0.45,40.1",
                "2,Weld,299.0,31.0,0.47,39.6",
            ],
        )
    }

    #[test]
    fn test_align_two_surveys() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("aligned/merged_by_distance.csv");
        let inputs = vec![survey_2007(dir.path()), survey_2015(dir.path())];

        let report = align_files(&inputs, &output, &PipelineConfig::default()).unwrap();

        // The weld at 500 has no partner within tolerance.
        assert_eq!(report.matched_rows, 3);
        assert_eq!(report.unmatched_primary, 1);
        assert_eq!(report.drift.anchors, 3);
        assert_eq!(report.drift.delta_min, -2.0);
        assert_eq!(report.drift.delta_max, 5.0);

        let merged = loaders::load_table_csv(&output).unwrap();
        assert_eq!(merged.num_rows(), 3);
        assert!(merged.column_index("distance_corrected").is_some());
        assert!(merged.column_index("height__avg").is_some());
        assert!(merged.column_index("thickness__delta").is_some());
    }

    #[test]
    fn test_align_orders_pair_by_year() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("merged.csv");
        // Later survey passed first; the fitted pair is still 2007 -> 2015.
        let inputs = vec![survey_2015(dir.path()), survey_2007(dir.path())];

        align_files(&inputs, &output, &PipelineConfig::default()).unwrap();

        let merged = loaders::load_table_csv(&output).unwrap();
        let idx_2007 = merged.column_index("r_2007_weld__distance").unwrap();
        let idx_2015 = merged.column_index("r_2015_weld__distance").unwrap();
        assert!(idx_2007 < idx_2015);
    }

    #[test]
    fn test_align_three_surveys() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("merged.csv");
        let inputs = vec![
            survey_2007(dir.path()),
            survey_2015(dir.path()),
            survey_2022(dir.path()),
        ];

        let report = align_files(&inputs, &output, &PipelineConfig::default()).unwrap();
        assert_eq!(report.tertiary_attached, Some(2));

        let merged = loaders::load_table_csv(&output).unwrap();
        assert!(merged.column_index("distance_2022").is_some());
        assert!(merged.column_index("distance_2022_corrected").is_some());
        // Row at primary 200 found no 2022 weld within tolerance.
        let col = merged.column("distance_2022").unwrap();
        assert_eq!(col[1], "");
    }

    #[test]
    fn test_align_rejects_single_input() {
        let dir = tempdir().unwrap();
        let inputs = vec![survey_2007(dir.path())];
        let output = dir.path().join("merged.csv");

        assert!(align_files(&inputs, &output, &PipelineConfig::default()).is_err());
    }

    #[test]
    fn test_align_schema_error_names_file() {
        let dir = tempdir().unwrap();
        let bad = write_survey(dir.path(), "r_2015_weld.csv", &["a,b", "1,2"]);
        let inputs = vec![survey_2007(dir.path()), bad];
        let output = dir.path().join("merged.csv");

        let err = align_files(&inputs, &output, &PipelineConfig::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("r_2015_weld"));
    }

    #[test]
    fn test_apply_compound_correction() {
        let dir = tempdir().unwrap();
        let merged = dir.path().join("merged.csv");
        let corrected = dir.path().join("final.csv");
        let inputs = vec![survey_2007(dir.path()), survey_2015(dir.path())];

        align_files(&inputs, &merged, &PipelineConfig::default()).unwrap();
        let report = apply_files(&merged, &corrected, &PipelineConfig::default()).unwrap();
        assert!(report.compound);
        assert_eq!(report.pairs_used, 3);

        let table = loaders::load_table_csv(&corrected).unwrap();
        // Working columns pruned, tags added.
        assert!(table.column_index("r_2007_weld__distance").is_none());
        assert!(table.column_index("distance__delta").is_none());
        assert!(table.column_index("thickness__avg").is_none());
        assert!(table.column_index("height__avg").is_some());
        assert_eq!(table.column("type").unwrap(), vec!["weld"; 3]);
        assert_eq!(table.column("run_id").unwrap(), vec!["0"; 3]);

        // First row: align corrected 100 -> 95; the model rebuilt from the
        // raw pairs has delta(95) = 5.1 by first-segment extrapolation,
        // so compounding lands on 89.9.
        let cell = table.column("distance_corrected").unwrap()[0].to_string();
        let value: f64 = cell.parse().unwrap();
        assert!((value - 89.9).abs() < 1e-6);
    }

    #[test]
    fn test_apply_single_correction() {
        let dir = tempdir().unwrap();
        let merged = dir.path().join("merged.csv");
        let corrected = dir.path().join("final.csv");
        let inputs = vec![survey_2007(dir.path()), survey_2015(dir.path())];

        align_files(&inputs, &merged, &PipelineConfig::default()).unwrap();

        let config = PipelineConfig {
            correction: crate::config::CorrectionConfig { compound: false },
            ..Default::default()
        };
        apply_files(&merged, &corrected, &config).unwrap();

        let table = loaders::load_table_csv(&corrected).unwrap();
        let cell = table.column("distance_corrected").unwrap()[0].to_string();
        let value: f64 = cell.parse().unwrap();
        // Align-stage value kept as-is.
        assert!((value - 95.0).abs() < 1e-6);
    }

    #[test]
    fn test_apply_corrects_tertiary_and_prunes_it() {
        let dir = tempdir().unwrap();
        let merged = dir.path().join("merged.csv");
        let corrected = dir.path().join("final.csv");
        let inputs = vec![
            survey_2007(dir.path()),
            survey_2015(dir.path()),
            survey_2022(dir.path()),
        ];

        align_files(&inputs, &merged, &PipelineConfig::default()).unwrap();
        apply_files(&merged, &corrected, &PipelineConfig::default()).unwrap();

        let table = loaders::load_table_csv(&corrected).unwrap();
        assert!(table.column_index("distance_2022").is_none());
        assert!(table.column_index("thickness_2022").is_none());
        assert!(table.column_index("distance_2022_corrected").is_some());
        assert!(table.column_index("height_2022").is_some());

        // The unattached row keeps an empty tertiary cell through both
        // stages.
        let col = table.column("distance_2022_corrected").unwrap();
        assert_eq!(col[1], "");
        assert!(!col[0].is_empty());
    }

    #[test]
    fn test_apply_missing_input_fails_fast() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.csv");
        let out = dir.path().join("out.csv");

        let err = apply_files(&missing, &out, &PipelineConfig::default()).unwrap_err();
        assert!(err.to_string().contains("align stage"));
    }

    #[test]
    fn test_drop_columns_idempotent() {
        let mut table = RawTable {
            headers: vec!["a".to_string(), "b".to_string()],
            records: vec![vec!["1".to_string(), "2".to_string()]],
            source_path: None,
        };

        drop_columns(&mut table, &["b".to_string(), "not_there".to_string()]);
        assert_eq!(table.headers, vec!["a"]);
        assert_eq!(table.records[0], vec!["1"]);

        // Dropping again is a no-op.
        drop_columns(&mut table, &["b".to_string()]);
        assert_eq!(table.headers, vec!["a"]);
    }
}
