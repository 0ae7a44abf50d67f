//! # Grid Adjacency Resolver
//!
//! Determines which pairs of occupied cells count as neighbors. Two
//! interchangeable strategies behind one trait:
//!
//! - **Ring**: concentric ring expansion on the hex grid. The default for
//!   per-bin analyses; respects grid locality.
//! - **Delaunay**: planar triangulation of cell centroids. Used when the
//!   aim is a globally connected graph regardless of grid alignment.
//!
//! Both are deterministic for a given occupied-cell set. A single-cell
//! input yields an empty neighbor map.

use h3o::CellIndex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::geo;

/// Hard cap on ring expansion when searching for any neighbor at all.
pub const MAX_EXPAND_RING: u32 = 20;

/// Neighbor sets per occupied cell.
pub type NeighborMap = FxHashMap<CellIndex, FxHashSet<CellIndex>>;

/// Strategy choice, selected by configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdjacencyMethod {
    Ring,
    Delaunay,
}

/// Resolves neighbor relations over a set of occupied cells.
pub trait AdjacencyStrategy {
    fn neighbors(&self, cells: &FxHashSet<CellIndex>) -> NeighborMap;
}

/// Build the configured strategy.
pub fn strategy_for(
    method: AdjacencyMethod,
    k_neighbors: u32,
    expand_search: bool,
) -> Box<dyn AdjacencyStrategy + Send + Sync> {
    match method {
        AdjacencyMethod::Ring => Box::new(RingAdjacency {
            k_neighbors,
            expand_search,
        }),
        AdjacencyMethod::Delaunay => Box::new(DelaunayAdjacency),
    }
}

/// Concentric ring expansion out to `k_neighbors` grid steps.
///
/// A candidate at ring k > 1 is rejected when an already accepted neighbor
/// is grid-adjacent to it, or lies on the grid line between it and the
/// origin cell: both mean the candidate is reachable through a closer
/// neighbor and would double-count the same boundary.
pub struct RingAdjacency {
    pub k_neighbors: u32,
    /// Keep expanding rings (up to [`MAX_EXPAND_RING`]) until at least one
    /// neighbor appears.
    pub expand_search: bool,
}

impl AdjacencyStrategy for RingAdjacency {
    fn neighbors(&self, cells: &FxHashSet<CellIndex>) -> NeighborMap {
        let mut map = NeighborMap::default();

        for &cell in cells {
            let mut accepted: FxHashSet<CellIndex> = FxHashSet::default();

            for k in 1..=self.k_neighbors {
                if k == 1 {
                    accepted.extend(
                        geo::ring(cell, 1)
                            .into_iter()
                            .filter(|c| cells.contains(c)),
                    );
                    continue;
                }
                for candidate in geo::ring(cell, k) {
                    if !cells.contains(&candidate) {
                        continue;
                    }
                    if reachable_through(&accepted, candidate, cell) {
                        continue;
                    }
                    accepted.insert(candidate);
                }
            }

            if self.expand_search && accepted.is_empty() {
                let mut k = self.k_neighbors + 1;
                while accepted.is_empty() && k < MAX_EXPAND_RING {
                    accepted.extend(
                        geo::ring(cell, k)
                            .into_iter()
                            .filter(|c| cells.contains(c)),
                    );
                    k += 1;
                }
            }

            map.insert(cell, accepted);
        }

        map
    }
}

/// True when `candidate` is already covered by an accepted neighbor: one of
/// them lies on the grid line back to `origin`, or is grid-adjacent to the
/// candidate.
fn reachable_through(
    accepted: &FxHashSet<CellIndex>,
    candidate: CellIndex,
    origin: CellIndex,
) -> bool {
    if let Some(line) = geo::grid_line(candidate, origin) {
        if line.iter().any(|c| accepted.contains(c)) {
            return true;
        }
    }
    geo::ring(candidate, 1)
        .into_iter()
        .any(|c| accepted.contains(&c))
}

/// Delaunay triangulation of occupied-cell centroids, projected to planar
/// (longitude, latitude). Every triangle edge is a neighbor relation; cells
/// on no triangle keep an empty set. Bowyer-Watson incremental insertion
/// over a super-triangle.
pub struct DelaunayAdjacency;

impl AdjacencyStrategy for DelaunayAdjacency {
    fn neighbors(&self, cells: &FxHashSet<CellIndex>) -> NeighborMap {
        // Sorted insertion order keeps the triangulation deterministic.
        let mut ordered: Vec<CellIndex> = cells.iter().copied().collect();
        ordered.sort_unstable();

        let points: Vec<(f64, f64)> = ordered
            .iter()
            .map(|&c| {
                let ll = geo::centroid(c);
                (ll.lng(), ll.lat())
            })
            .collect();

        let mut map: NeighborMap = ordered.iter().map(|&c| (c, FxHashSet::default())).collect();

        for (ia, ib) in triangulate(&points) {
            let (a, b) = (ordered[ia], ordered[ib]);
            map.entry(a).or_default().insert(b);
            map.entry(b).or_default().insert(a);
        }

        map
    }
}

/// Bowyer-Watson triangulation; returns unique edges as point-index pairs.
fn triangulate(points: &[(f64, f64)]) -> Vec<(usize, usize)> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }

    // Super-triangle comfortably enclosing the bounding box.
    let (mut min_x, mut min_y, mut max_x, mut max_y) =
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let span = (max_x - min_x).max(max_y - min_y).max(1.0);
    let (cx, cy) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);

    let mut verts: Vec<(f64, f64)> = points.to_vec();
    verts.push((cx - 20.0 * span, cy - span));
    verts.push((cx + 20.0 * span, cy - span));
    verts.push((cx, cy + 20.0 * span));
    let (s0, s1, s2) = (n, n + 1, n + 2);

    let mut triangles: Vec<[usize; 3]> = vec![[s0, s1, s2]];

    for p in 0..n {
        // Triangles whose circumcircle contains the new point.
        let mut bad: Vec<usize> = Vec::new();
        for (t, tri) in triangles.iter().enumerate() {
            if circumcircle_contains(verts[tri[0]], verts[tri[1]], verts[tri[2]], verts[p]) {
                bad.push(t);
            }
        }

        // Boundary of the cavity: edges not shared by two bad triangles.
        let mut boundary: Vec<(usize, usize)> = Vec::new();
        for &t in &bad {
            let tri = triangles[t];
            for e in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                let key = ordered_edge(e.0, e.1);
                let shared = bad.iter().any(|&u| {
                    u != t && {
                        let o = triangles[u];
                        [(o[0], o[1]), (o[1], o[2]), (o[2], o[0])]
                            .iter()
                            .any(|&(a, b)| ordered_edge(a, b) == key)
                    }
                });
                if !shared {
                    boundary.push(e);
                }
            }
        }

        for &t in bad.iter().rev() {
            triangles.swap_remove(t);
        }
        for (a, b) in boundary {
            triangles.push([a, b, p]);
        }
    }

    let mut edges: FxHashSet<(usize, usize)> = FxHashSet::default();
    for tri in &triangles {
        if tri.iter().any(|&v| v >= n) {
            continue; // touches the super-triangle
        }
        edges.insert(ordered_edge(tri[0], tri[1]));
        edges.insert(ordered_edge(tri[1], tri[2]));
        edges.insert(ordered_edge(tri[2], tri[0]));
    }

    let mut out: Vec<(usize, usize)> = edges.into_iter().collect();
    out.sort_unstable();
    out
}

fn ordered_edge(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Circumcircle membership test via the explicit circumcenter. Degenerate
/// (collinear) triangles contain nothing.
fn circumcircle_contains(a: (f64, f64), b: (f64, f64), c: (f64, f64), p: (f64, f64)) -> bool {
    let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
    if d.abs() < 1e-12 {
        return false;
    }
    let a2 = a.0 * a.0 + a.1 * a.1;
    let b2 = b.0 * b.0 + b.1 * b.1;
    let c2 = c.0 * c.0 + c.1 * c.1;
    let ux = (a2 * (b.1 - c.1) + b2 * (c.1 - a.1) + c2 * (a.1 - b.1)) / d;
    let uy = (a2 * (c.0 - b.0) + b2 * (a.0 - c.0) + c2 * (b.0 - a.0)) / d;
    let r2 = (a.0 - ux).powi(2) + (a.1 - uy).powi(2);
    (p.0 - ux).powi(2) + (p.1 - uy).powi(2) < r2 - 1e-12
}
