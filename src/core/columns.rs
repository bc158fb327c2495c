//! Canonical column resolution for heterogeneous survey headers.
//!
//! Each survey vendor names its columns differently ("Log Dist. [ft]",
//! "ILI Wheel Count [ft.]", ...). This module maps free-text headers to a
//! small set of canonical semantic keys by normalized lookup. The accepted
//! spellings are kept as data tables so a new survey format only needs a
//! new entry, not new code.

/// Semantic column keys the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    /// Odometer / log distance along the pipeline.
    Distance,
    /// Elevation profile.
    Height,
    /// Wall thickness.
    Thickness,
    /// Pipe joint length.
    JointLength,
}

impl ColumnKey {
    /// Canonical short name used for derived output columns
    /// (e.g. `thickness__avg`).
    pub fn name(&self) -> &'static str {
        match self {
            ColumnKey::Distance => "distance",
            ColumnKey::Height => "height",
            ColumnKey::Thickness => "thickness",
            ColumnKey::JointLength => "jlength",
        }
    }

    /// Attribute keys tracked for avg/delta derivation (distance excluded,
    /// it is handled by the drift correction instead).
    pub fn tracked_attributes() -> &'static [ColumnKey] {
        &[ColumnKey::Height, ColumnKey::Thickness, ColumnKey::JointLength]
    }
}

/// Accepted header spellings per key, matched after normalization.
const DISTANCE_SPELLINGS: &[&str] = &[
    "log dist. [ft]",
    "log distance",
    "distance",
    "ILI Wheel Count [ft.]",
];

const HEIGHT_SPELLINGS: &[&str] = &["height", "elevation"];

const THICKNESS_SPELLINGS: &[&str] = &["t [in]", "wt [in]", "thickness"];

const JLENGTH_SPELLINGS: &[&str] = &["J. len [ft]", "J.len [ft]", "joint length", "J. length"];

/// Lowercase a header and strip everything that is not alphanumeric.
///
/// "Log Dist. [ft]" and "log dist. [ft]" normalize identically, so matching
/// is case- and punctuation-insensitive without any fuzzy logic.
pub fn normalize_header(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

fn spellings_for(key: ColumnKey) -> &'static [&'static str] {
    match key {
        ColumnKey::Distance => DISTANCE_SPELLINGS,
        ColumnKey::Height => HEIGHT_SPELLINGS,
        ColumnKey::Thickness => THICKNESS_SPELLINGS,
        ColumnKey::JointLength => JLENGTH_SPELLINGS,
    }
}

/// Find the first header matching any accepted spelling for `key`.
///
/// Returns `None` when no candidate matches. Absence is a normal outcome:
/// different surveys carry different attribute vocabularies, and only the
/// caller knows whether a missing column is fatal (distance) or skippable
/// (attributes).
pub fn resolve<'a, S: AsRef<str>>(headers: &'a [S], key: ColumnKey) -> Option<&'a str> {
    let accepted: Vec<String> = spellings_for(key)
        .iter()
        .map(|s| normalize_header(s))
        .collect();

    headers
        .iter()
        .map(|h| h.as_ref())
        .find(|h| accepted.iter().any(|a| *a == normalize_header(h)))
}
