//! # Data Module
//!
//! In-memory representations of the engine's inputs: the labeled sample
//! table, the time-bin partition of the age axis, and the externally
//! supplied dissimilarity matrix. Everything here is immutable once built;
//! derived structures in `model` and `pipelines` are pure functions of it.

pub mod matrix;
pub mod sample;
pub mod time_bin;

// Re-export commonly used types
pub use matrix::DissimilarityMatrix;
pub use sample::{Sample, SampleRecord, SampleTable};
pub use time_bin::{partition, BinningMode, TimeBin};
