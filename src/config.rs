//! # Configuration Logic
//!
//! CLI argument parsing and validation. Strategy choices are exposed as
//! `ValueEnum`s and converted into the model-layer enums; defaults mirror
//! the original tool (14 bins, resolution 3, ring adjacency with k = 1,
//! isolation threshold 1.0, path bound 10, imputation rounds = 2x
//! resolution).

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use h3o::Resolution;

use crate::error::{Result, StargenError};
use crate::model::adjacency::{AdjacencyMethod, MAX_EXPAND_RING};
use crate::model::impute::{ImputationMethod, VariogramModel};
use crate::model::scaling::ScalingMethod;
use crate::pipelines::barrier::BarrierParams;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum AdjacencyChoice {
    Ring,
    Delaunay,
}

impl From<AdjacencyChoice> for AdjacencyMethod {
    fn from(value: AdjacencyChoice) -> Self {
        match value {
            AdjacencyChoice::Ring => AdjacencyMethod::Ring,
            AdjacencyChoice::Delaunay => AdjacencyMethod::Delaunay,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ScalingChoice {
    Loess,
    Logistic,
}

impl From<ScalingChoice> for ScalingMethod {
    fn from(value: ScalingChoice) -> Self {
        match value {
            ScalingChoice::Loess => ScalingMethod::Loess,
            ScalingChoice::Logistic => ScalingMethod::Logistic,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ImputationChoice {
    #[value(name = "neighbor-average")]
    NeighborAverage,
    Kriging,
}

impl From<ImputationChoice> for ImputationMethod {
    fn from(value: ImputationChoice) -> Self {
        match value {
            ImputationChoice::NeighborAverage => ImputationMethod::NeighborAverage,
            ImputationChoice::Kriging => ImputationMethod::Kriging,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum VariogramChoice {
    Linear,
    Spherical,
}

impl From<VariogramChoice> for VariogramModel {
    fn from(value: VariogramChoice) -> Self {
        match value {
            VariogramChoice::Linear => VariogramModel::Linear,
            VariogramChoice::Spherical => VariogramModel::Spherical,
        }
    }
}

/// Stargen command-line configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "stargen", version, about)]
pub struct Config {
    /// Labeled sample table (TSV with ID, Latitude, Longitude, Age columns)
    #[arg(long)]
    pub samples: PathBuf,

    /// Sample-to-sample dissimilarity matrix (TSV, square, symmetric)
    #[arg(long)]
    pub matrix: PathBuf,

    /// Output path for the JSON report
    #[arg(long, default_value = "stargen_report.json")]
    pub out: PathBuf,

    /// Number of time bins
    #[arg(long, default_value_t = 14)]
    pub time_bins: usize,

    /// Give every bin the same year span instead of the same sample count
    #[arg(long)]
    pub same_age_range: bool,

    /// Grid resolution (0-4)
    #[arg(long, default_value_t = 3)]
    pub resolution: u8,

    /// Neighbor search radius in grid rings
    #[arg(long, default_value_t = 1)]
    pub k_neighbors: u32,

    /// Keep expanding rings until at least one neighbor is found
    #[arg(long)]
    pub allow_k_distance: bool,

    /// Minimal scaled distance for a cell to count as isolated
    #[arg(long, default_value_t = 1.0)]
    pub isolation_threshold: f64,

    /// Longest grid path (in steps) a far-apart pair may paint across
    #[arg(long, default_value_t = 10)]
    pub max_path_length: usize,

    /// Imputation rounds (default: 2x resolution)
    #[arg(long)]
    pub impute_rounds: Option<usize>,

    /// Neighbor resolution strategy
    #[arg(long, value_enum, default_value_t = AdjacencyChoice::Ring)]
    pub adjacency: AdjacencyChoice,

    /// Geographic scaling strategy
    #[arg(long, value_enum, default_value_t = ScalingChoice::Loess)]
    pub scaling: ScalingChoice,

    /// Imputation strategy
    #[arg(long, value_enum, default_value_t = ImputationChoice::NeighborAverage)]
    pub imputation: ImputationChoice,

    /// Variogram shape for kriging imputation
    #[arg(long, value_enum, default_value_t = VariogramChoice::Linear)]
    pub variogram: VariogramChoice,

    /// Attenuate pair distances for neighbors found beyond ring 1
    #[arg(long)]
    pub attenuate_by_ring: bool,

    /// Disable the painted-cell fallback for cells with no neighbor distances
    #[arg(long)]
    pub no_isolation_fallback: bool,

    /// Exclude unevaluable cells (no neighbors, no painted signal) from the
    /// isolated set
    #[arg(long)]
    pub strict_isolation: bool,

    /// Number of worker threads (default: all cores)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,
}

impl Config {
    /// Parse CLI arguments and validate them in one step.
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.time_bins == 0 {
            return Err(StargenError::config("time-bins must be at least 1"));
        }
        if self.resolution > 4 {
            return Err(StargenError::config(format!(
                "resolution {} is out of the supported range 0-4",
                self.resolution
            )));
        }
        if self.k_neighbors == 0 || self.k_neighbors >= MAX_EXPAND_RING {
            return Err(StargenError::config(format!(
                "k-neighbors must be between 1 and {}",
                MAX_EXPAND_RING - 1
            )));
        }
        if self.max_path_length == 0 {
            return Err(StargenError::config("max-path-length must be at least 1"));
        }
        if !self.isolation_threshold.is_finite() {
            return Err(StargenError::config("isolation-threshold must be finite"));
        }
        Ok(())
    }

    pub fn grid_resolution(&self) -> Result<Resolution> {
        Resolution::try_from(self.resolution)
            .map_err(|e| StargenError::config(format!("invalid resolution: {e}")))
    }

    /// Imputation rounds, defaulting to twice the grid resolution.
    pub fn impute_rounds(&self) -> usize {
        self.impute_rounds
            .unwrap_or(2 * usize::from(self.resolution))
    }

    pub fn binning_mode(&self) -> crate::data::time_bin::BinningMode {
        if self.same_age_range {
            crate::data::time_bin::BinningMode::EqualSpan
        } else {
            crate::data::time_bin::BinningMode::EqualCount
        }
    }

    /// Collapse the CLI surface into the engine's parameter block.
    pub fn to_params(&self) -> BarrierParams {
        BarrierParams {
            adjacency: self.adjacency.into(),
            k_neighbors: self.k_neighbors,
            allow_k_distance: self.allow_k_distance,
            attenuate_by_ring: self.attenuate_by_ring,
            scaling: self.scaling.into(),
            isolation_threshold: self.isolation_threshold,
            max_path_length: self.max_path_length,
            isolation_fallback: !self.no_isolation_fallback,
            strict_isolation: self.strict_isolation,
            imputation: self.imputation.into(),
            variogram: self.variogram.into(),
            impute_rounds: self.impute_rounds(),
        }
    }
}
