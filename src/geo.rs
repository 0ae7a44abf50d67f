//! # Grid Geometry Helpers
//!
//! Thin wrappers over the H3 grid: centroids, great-circle distances,
//! concentric rings and discrete cell paths. The path builder carries the
//! midpoint-bisection fallback used when the grid library cannot construct
//! a line directly (very distant or antimeridian-crossing pairs).

use h3o::{CellIndex, LatLng, Resolution};

use crate::error::{Result, StargenError};

/// Hard cap on the midpoint-bisection recursion depth.
pub const MAX_BISECT_DEPTH: usize = 10;

/// Centroid of a cell.
pub fn centroid(cell: CellIndex) -> LatLng {
    LatLng::from(cell)
}

/// Great-circle distance between two cell centroids in kilometers.
pub fn centroid_distance_km(a: CellIndex, b: CellIndex) -> f64 {
    centroid(a).distance_km(centroid(b))
}

/// All cells at exactly grid distance `k` from `cell`.
pub fn ring(cell: CellIndex, k: u32) -> Vec<CellIndex> {
    cell.grid_disk_distances::<Vec<_>>(k)
        .into_iter()
        .filter_map(|(c, dist)| (dist == k).then_some(c))
        .collect()
}

/// Grid distance between two cells, if the local coordinate systems overlap.
pub fn grid_distance(a: CellIndex, b: CellIndex) -> Option<u32> {
    a.grid_distance(b).ok().and_then(|d| u32::try_from(d).ok())
}

/// Direct grid line between two cells, endpoints included.
///
/// Returns `None` when the grid library cannot construct the line
/// (pentagon distortion, distant cells in different base-cell frames).
pub fn grid_line(a: CellIndex, b: CellIndex) -> Option<Vec<CellIndex>> {
    let cells = a.grid_path_cells(b).ok()?;
    cells.collect::<std::result::Result<Vec<_>, _>>().ok()
}

/// Cell containing the geographic midpoint of two cell centroids.
///
/// The midpoint is computed on the unit sphere (chord average, renormalized)
/// so antimeridian-crossing pairs resolve correctly.
pub fn midpoint_cell(a: CellIndex, b: CellIndex) -> Result<CellIndex> {
    let resolution = a.resolution();
    let (xa, ya, za) = to_unit_vector(centroid(a));
    let (xb, yb, zb) = to_unit_vector(centroid(b));

    let (mx, my, mz) = ((xa + xb) / 2.0, (ya + yb) / 2.0, (za + zb) / 2.0);
    let norm = (mx * mx + my * my + mz * mz).sqrt();
    if norm < 1e-12 {
        // Antipodal centroids have no defined midpoint.
        return Err(StargenError::path_search(a, b, "antipodal midpoint"));
    }

    let lat = (mz / norm).asin().to_degrees();
    let lng = my.atan2(mx).to_degrees();
    let ll = LatLng::new(lat, lng)
        .map_err(|e| StargenError::path_search(a, b, format!("invalid midpoint: {e}")))?;
    Ok(ll.to_cell(resolution))
}

/// Discrete cell path between `a` and `b`, endpoints included.
///
/// Tries the direct grid line first; on failure, bisects at the geographic
/// midpoint's cell and recurses on both halves. Exhausting `depth` is a
/// typed error, which callers treat as "no barrier attribution for this
/// pair", not a crash.
pub fn path_between(a: CellIndex, b: CellIndex, depth: usize) -> Result<Vec<CellIndex>> {
    if let Some(path) = grid_line(a, b) {
        return Ok(path);
    }
    if depth == 0 {
        return Err(StargenError::path_search(a, b, "bisection depth exhausted"));
    }

    let mid = midpoint_cell(a, b)?;
    if mid == a || mid == b {
        return Err(StargenError::path_search(a, b, "midpoint collapsed onto endpoint"));
    }

    let mut path = path_between(a, mid, depth - 1)?;
    let tail = path_between(mid, b, depth - 1)?;
    path.pop(); // midpoint is the head of the tail half
    path.extend(tail);
    Ok(path)
}

/// Resolve a latitude/longitude pair to its containing cell.
pub fn cell_for(lat: f64, lng: f64, resolution: Resolution) -> Result<CellIndex> {
    let ll = LatLng::new(lat, lng)
        .map_err(|e| StargenError::invalid_data(format!("invalid coordinate ({lat}, {lng}): {e}")))?;
    Ok(ll.to_cell(resolution))
}

fn to_unit_vector(ll: LatLng) -> (f64, f64, f64) {
    let lat = ll.lat().to_radians();
    let lng = ll.lng().to_radians();
    (lat.cos() * lng.cos(), lat.cos() * lng.sin(), lat.sin())
}
