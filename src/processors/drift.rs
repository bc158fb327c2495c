//! Piecewise-linear odometer drift model.
//!
//! Two surveys of the same pipeline disagree on absolute distance because
//! their odometers drift independently. At each matched weld the signed
//! discrepancy delta = x_secondary - x_primary is observed directly; between
//! welds it is linearly interpolated, and beyond the first/last weld it is
//! linearly extrapolated using the nearest segment's slope.

use thiserror::Error;

/// Errors that can occur while building or using a drift model.
#[derive(Error, Debug)]
pub enum DriftError {
    /// No matched pair survived; a model cannot be built.
    #[error("cannot build drift model: no matched distance pairs")]
    EmptyModel,
}

/// Result type for drift model operations.
pub type Result<T> = std::result::Result<T, DriftError>;

/// One observed (x, delta) sample from a matched weld pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftAnchor {
    /// Primary-survey distance of the matched weld.
    pub x: f64,
    /// Signed discrepancy: secondary distance minus primary distance.
    pub delta: f64,
}

/// Summary statistics over a model's anchors, for stage reporting.
#[derive(Debug, Clone, Copy)]
pub struct DriftSummary {
    pub anchors: usize,
    pub x_min: f64,
    pub x_max: f64,
    pub delta_min: f64,
    pub delta_max: f64,
    pub delta_mean: f64,
    pub delta_std: f64,
}

/// Piecewise-linear drift function built from matched weld pairs.
///
/// The anchor sequence, sorted ascending by x, is the model's sole state.
/// Duplicate x values are kept in first-occurrence order (stable sort), and
/// the interpolation resolves them by bracketing order.
#[derive(Debug, Clone)]
pub struct DriftModel {
    anchors: Vec<DriftAnchor>,
}

impl DriftModel {
    /// Build a model from matched primary/secondary distance pairs.
    ///
    /// Each pair contributes one anchor at `(x_primary, x_secondary -
    /// x_primary)`. Non-finite pairs are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::EmptyModel`] when no finite pair remains.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self> {
        let mut anchors: Vec<DriftAnchor> = pairs
            .iter()
            .filter(|(a, b)| a.is_finite() && b.is_finite())
            .map(|&(a, b)| DriftAnchor { x: a, delta: b - a })
            .collect();

        if anchors.is_empty() {
            return Err(DriftError::EmptyModel);
        }

        // Stable sort keeps first-occurrence order for duplicate x.
        anchors.sort_by(|a, b| a.x.partial_cmp(&b.x).expect("finite anchors"));

        Ok(Self { anchors })
    }

    /// The ordered anchor sequence.
    pub fn anchors(&self) -> &[DriftAnchor] {
        &self.anchors
    }

    /// True when only one anchor exists and the model degenerates to a
    /// constant correction. A warning-level condition, not an error.
    pub fn is_degenerate(&self) -> bool {
        self.anchors.len() == 1
    }

    /// Evaluate the drift delta(x) at an arbitrary distance.
    ///
    /// - inside the anchor range: linear interpolation between the two
    ///   bracketing anchors, exact at anchor points;
    /// - below the first anchor: linear continuation through anchors 0 and 1;
    /// - above the last anchor: linear continuation through the last two;
    /// - single anchor: that anchor's delta everywhere.
    pub fn evaluate(&self, x: f64) -> f64 {
        let anchors = &self.anchors;
        let n = anchors.len();

        if n == 1 {
            return anchors[0].delta;
        }

        if x < anchors[0].x {
            return extrapolate(x, anchors[0], anchors[1]);
        }
        if x > anchors[n - 1].x {
            return extrapolate(x, anchors[n - 2], anchors[n - 1]);
        }

        // First anchor with anchor.x >= x. Exact hits return that anchor's
        // delta, which for duplicate x values is the first occurrence.
        let idx = anchors.partition_point(|a| a.x < x);
        if idx < n && anchors[idx].x == x {
            return anchors[idx].delta;
        }

        // Strict interior: anchors[idx - 1].x < x < anchors[idx].x.
        interpolate(x, anchors[idx - 1], anchors[idx])
    }

    /// Evaluate the drift over a slice of optional distances, propagating
    /// missing inputs as missing outputs.
    pub fn evaluate_all(&self, xs: &[Option<f64>]) -> Vec<Option<f64>> {
        xs.iter()
            .map(|x| x.filter(|v| v.is_finite()).map(|v| self.evaluate(v)))
            .collect()
    }

    /// Summary statistics for reporting.
    pub fn summary(&self) -> DriftSummary {
        let n = self.anchors.len();
        let deltas: Vec<f64> = self.anchors.iter().map(|a| a.delta).collect();
        let mean = deltas.iter().sum::<f64>() / n as f64;
        let var = deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n as f64;

        DriftSummary {
            anchors: n,
            x_min: self.anchors[0].x,
            x_max: self.anchors[n - 1].x,
            delta_min: deltas.iter().cloned().fold(f64::INFINITY, f64::min),
            delta_max: deltas.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            delta_mean: mean,
            delta_std: var.sqrt(),
        }
    }
}

fn interpolate(x: f64, lo: DriftAnchor, hi: DriftAnchor) -> f64 {
    if hi.x == lo.x {
        return lo.delta;
    }
    lo.delta + (hi.delta - lo.delta) * (x - lo.x) / (hi.x - lo.x)
}

/// Exact linear continuation through two anchors; coincident anchors fall
/// back to a constant, guarding the division.
fn extrapolate(x: f64, a0: DriftAnchor, a1: DriftAnchor) -> f64 {
    if a1.x == a0.x {
        return a0.delta;
    }
    a0.delta + (a1.delta - a0.delta) * (x - a0.x) / (a1.x - a0.x)
}
