//! # Pipeline Module
//!
//! High-level orchestration: runs the full engine per time bin and keeps
//! bin failures isolated from each other.

pub mod barrier;

pub use barrier::{normalize, BarrierParams, BarrierPipeline, BinAnalysis};
