//! In-line inspection survey alignment and drift correction pipeline.
//!
//! This crate provides tools for:
//! - Loading per-survey weld tables from CSV with tolerant header resolution
//! - Matching welds across surveys by nearest log distance within a tolerance
//! - Fitting a piecewise-linear drift model from matched distance pairs
//! - Correcting survey distances against the drift model (parallelized)
//! - Rendering the fitted drift function as a PNG
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use ili_align::{processors::pipeline::align_files, PipelineConfig};
//!
//! let surveys = vec![PathBuf::from("r_2007_weld.csv"), PathBuf::from("r_2015_weld.csv")];
//! let report = align_files(&surveys, "merged_by_distance.csv".as_ref(), &PipelineConfig::default()).unwrap();
//! println!("matched {} welds", report.matched_rows);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{CorrectionConfig, MatchingConfig, PipelineConfig};
pub use core::table::SurveyTable;
pub use processors::drift::DriftModel;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
