//! Visualization tools for drift models.
//!
//! This module renders the fitted piecewise-linear drift function as a PNG
//! using the plotters library: one marker per matching-point anchor, joined
//! by the interpolation segments the correction actually evaluates.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::processors::drift::DriftModel;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Empty drift model")]
    EmptyModel,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1920;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 1080;

/// Anchor marker color (red).
const ANCHOR_COLOR: (u8, u8, u8) = (228, 26, 28);

/// Drift line color (blue).
const LINE_COLOR: (u8, u8, u8) = (55, 126, 184);

/// Fraction of the anchor range to extend the line on each side, showing
/// the extrapolation behavior beyond the outermost anchors.
const EXTRAPOLATION_MARGIN: f64 = 0.05;

/// Plot the drift function of a fitted model and save as PNG.
///
/// Draws the anchor points as markers and the piecewise-linear function as
/// a line, extended slightly past the outermost anchors.
pub fn plot_drift_function(output_path: &Path, model: &DriftModel) -> Result<()> {
    let anchors = model.anchors();
    if anchors.is_empty() {
        return Err(VisualizationError::EmptyModel);
    }

    let markers: Vec<(f64, f64)> = anchors.iter().map(|a| (a.x, a.delta)).collect();

    let x_lo = anchors[0].x;
    let x_hi = anchors[anchors.len() - 1].x;
    let margin = ((x_hi - x_lo) * EXTRAPOLATION_MARGIN).max(1.0);

    // Segment endpoints plus the extrapolated tails; the function is linear
    // between anchors so no denser sampling is needed.
    let mut line: Vec<(f64, f64)> = Vec::with_capacity(anchors.len() + 2);
    line.push((x_lo - margin, model.evaluate(x_lo - margin)));
    line.extend(markers.iter().copied());
    line.push((x_hi + margin, model.evaluate(x_hi + margin)));

    let (x_min, x_max, y_min, y_max) = compute_bounds(&line);
    let x_padding = (x_max - x_min) * 0.05;
    let y_padding = (y_max - y_min) * 0.05;

    let root =
        BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT)).into_drawing_area();

    root.fill(&WHITE)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(
            (x_min - x_padding)..(x_max + x_padding),
            (y_min - y_padding)..(y_max + y_padding),
        )
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let line_color = RGBColor(LINE_COLOR.0, LINE_COLOR.1, LINE_COLOR.2);
    chart
        .draw_series(LineSeries::new(line.iter().copied(), &line_color))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let anchor_color = RGBColor(ANCHOR_COLOR.0, ANCHOR_COLOR.1, ANCHOR_COLOR.2);
    chart
        .draw_series(
            markers
                .iter()
                .map(|(x, y)| Circle::new((*x, *y), 4, anchor_color.filled())),
        )
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    root.present()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// Compute the bounds (min/max) for x and y coordinates.
fn compute_bounds(points: &[(f64, f64)]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for (x, y) in points {
        if *x < x_min { x_min = *x; }
        if *x > x_max { x_max = *x; }
        if *y < y_min { y_min = *y; }
        if *y > y_max { y_max = *y; }
    }

    if (x_max - x_min).abs() < f64::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }

    (x_min, x_max, y_min, y_max)
}
