//! # I/O Module
//!
//! File boundaries of the engine: the labeled sample table and the
//! dissimilarity matrix on the way in, the per-bin JSON report on the way
//! out. The core itself never touches disk; everything here is thin.

pub mod matrix;
pub mod report;
pub mod table;

pub use matrix::read_dissimilarity_matrix;
pub use report::{BinFailure, BinReport, RunReport};
pub use table::read_sample_table;
