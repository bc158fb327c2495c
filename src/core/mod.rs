//! Core data types and I/O operations.

pub mod columns;
pub mod loaders;
pub mod table;
pub mod writers;

pub use columns::ColumnKey;
pub use loaders::{load_table_csv, parse_cell, RawTable};
pub use table::SurveyTable;
pub use writers::{write_aligned_csv, write_raw_csv, WriteError};
