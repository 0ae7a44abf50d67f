//! # Sample Table
//!
//! In-memory representation of the labeled ancient-sample table. Each sample
//! carries its coordinates, calibrated age and the grid cell it falls in.
//! Samples are immutable once labeled; all downstream structures reference
//! them by index.

use h3o::{CellIndex, Resolution};
use tracing::warn;

use crate::error::Result;
use crate::geo;

/// A raw input row before cell assignment (io layer product).
#[derive(Clone, Debug)]
pub struct SampleRecord {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    /// Age in calibrated years BP (before 1950 CE).
    pub age: f64,
}

/// A labeled sample: input row plus its assigned grid cell.
#[derive(Clone, Debug)]
pub struct Sample {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    /// Age in calibrated years BP (before 1950 CE).
    pub age: f64,
    pub cell: CellIndex,
}

/// The full labeled sample table.
#[derive(Clone, Debug, Default)]
pub struct SampleTable {
    samples: Vec<Sample>,
}

impl SampleTable {
    /// Assign a grid cell to every record at the given resolution.
    ///
    /// Records with coordinates the grid rejects are dropped with a warning;
    /// upstream filtering should already have removed malformed rows.
    pub fn from_records(records: Vec<SampleRecord>, resolution: Resolution) -> Result<Self> {
        let mut samples = Vec::with_capacity(records.len());
        let mut dropped = 0usize;

        for rec in records {
            match geo::cell_for(rec.lat, rec.lon, resolution) {
                Ok(cell) => samples.push(Sample {
                    id: rec.id,
                    lat: rec.lat,
                    lon: rec.lon,
                    age: rec.age,
                    cell,
                }),
                Err(_) => dropped += 1,
            }
        }

        if dropped > 0 {
            warn!(dropped, "samples dropped during cell assignment");
        }

        Ok(Self { samples })
    }

    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, idx: usize) -> &Sample {
        &self.samples[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}
