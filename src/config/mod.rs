//! Configuration types for the alignment pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for cross-survey weld matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Maximum distance difference for a valid weld match.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_tolerance() -> f64 {
    crate::processors::matching::MATCH_TOLERANCE
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
        }
    }
}

/// Configuration for the drift correction stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// When true, the apply stage re-applies the drift transform to the
    /// already-corrected distance column, compounding two corrections.
    /// This mirrors the historical two-stage behavior; set false to keep
    /// the align-stage correction as the final one.
    #[serde(default = "default_compound")]
    pub compound: bool,
}

fn default_compound() -> bool {
    true
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            compound: default_compound(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub correction: CorrectionConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
