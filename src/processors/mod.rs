//! Alignment and correction processing modules.

pub mod assembly;
pub mod correction;
pub mod drift;
pub mod matching;
pub mod pipeline;

// Re-export key types for convenience
pub use assembly::{assemble, final_drop_list, AlignedTable};
pub use correction::{correct, correct_all, correct_optional};
pub use drift::{DriftAnchor, DriftError, DriftModel, DriftSummary};
pub use matching::{attach_survey, match_pair, MatchError, MatchedTable, MATCH_TOLERANCE};
pub use pipeline::{align_files, apply_files, AlignReport, ApplyReport};
