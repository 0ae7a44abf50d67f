//! # Model Module
//!
//! The spatial-statistics components, in dependency order:
//!
//! - `adjacency`: which occupied cells count as neighbors (ring expansion
//!   or Delaunay triangulation)
//! - `aggregate`: memoized mean dissimilarity per unordered cell pair
//! - `scaling`: geographic-distance expectation model and log2 scaling
//! - `classify`: barrier edges, path-painted barrier cells, isolation
//! - `linker`: migration links for isolated cells
//! - `impute`: barrier-field extension into unsampled cells
//!
//! Every component is a pure function of its bin-local inputs; nothing in
//! here holds state across time bins.

pub mod adjacency;
pub mod aggregate;
pub mod classify;
pub mod impute;
pub mod linker;
pub mod scaling;

// Re-export commonly used types
pub use adjacency::{AdjacencyMethod, AdjacencyStrategy, DelaunayAdjacency, NeighborMap, RingAdjacency};
pub use aggregate::{pair_key, PairCache};
pub use classify::{classify, Classification, ClassifierParams};
pub use impute::{ImputationMethod, ImputationStrategy, KrigingImputation, NeighborAverageImputation, VariogramModel};
pub use linker::{link, LinkerOutcome};
pub use scaling::{ScaledDistanceModel, ScalingMethod};
