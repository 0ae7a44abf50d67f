//! # Stargen Library Root
//!
//! Spatio-temporal reconstruction of genetic barriers: samples are binned
//! in time and assigned to hexagonal grid cells; per time bin the engine
//! derives neighbor adjacency, aggregates pairwise genetic dissimilarity,
//! scales it against geographic expectation, classifies barrier edges and
//! isolated populations, links isolated cells to their nearest plausible
//! population, and imputes barrier intensity into unsampled cells.
//!
//! ## Module Structure
//! ```text
//! stargen
//! ├── config     # CLI argument parsing and validation
//! ├── data       # Sample table, time bins, dissimilarity matrix
//! ├── geo        # Hex-grid helpers (centroids, rings, paths)
//! ├── io         # TSV inputs, JSON report output
//! ├── model      # Adjacency, aggregation, scaling, classification,
//! │              # linking, imputation
//! └── pipelines  # Per-bin orchestration
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod geo;
pub mod io;
pub mod model;
pub mod pipelines;

pub use error::{Result, StargenError};
