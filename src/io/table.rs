//! # Sample Table Reader
//!
//! Reads the labeled ancient-sample table: tab-separated text with a header
//! line naming at least `ID`, `Latitude`, `Longitude` and `Age`. Rows with
//! missing (`..`) coordinates or non-numeric fields are skipped and counted,
//! matching the upstream curation convention; they are not errors.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{info, warn};

use crate::data::sample::SampleRecord;
use crate::error::{Result, StargenError};

/// Placeholder the source tables use for unknown coordinates.
const MISSING_FIELD: &str = "..";

const REQUIRED_COLUMNS: [&str; 4] = ["ID", "Latitude", "Longitude", "Age"];

/// Read all usable sample records from a TSV table.
pub fn read_sample_table(path: &Path) -> Result<Vec<SampleRecord>> {
    if !path.exists() {
        return Err(StargenError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines();

    let header = lines
        .next()
        .ok_or_else(|| StargenError::parse(1, "empty sample table"))??;
    let columns: Vec<&str> = header.split('\t').map(str::trim).collect();

    let mut col_idx = [0usize; 4];
    for (slot, name) in col_idx.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = columns
            .iter()
            .position(|&c| c == name)
            .ok_or_else(|| StargenError::parse(1, format!("missing column '{name}'")))?;
    }
    let [id_col, lat_col, lon_col, age_col] = col_idx;

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (line_no, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        let max_col = id_col.max(lat_col).max(lon_col).max(age_col);
        if fields.len() <= max_col {
            return Err(StargenError::parse(
                line_no + 2,
                format!("expected at least {} columns, got {}", max_col + 1, fields.len()),
            ));
        }

        let (id, lat, lon, age) = (
            fields[id_col],
            fields[lat_col],
            fields[lon_col],
            fields[age_col],
        );
        if lat == MISSING_FIELD || lon == MISSING_FIELD {
            skipped += 1;
            continue;
        }
        let (Ok(lat), Ok(lon), Ok(age)) =
            (lat.parse::<f64>(), lon.parse::<f64>(), age.parse::<f64>())
        else {
            skipped += 1;
            continue;
        };

        records.push(SampleRecord {
            id: id.to_string(),
            lat,
            lon,
            age,
        });
    }

    if skipped > 0 {
        warn!(skipped, "rows skipped for missing or malformed fields");
    }
    info!(n_samples = records.len(), "sample table loaded");

    Ok(records)
}
