//! End-to-end scenarios over the full engine: synthetic sample layouts run
//! through binning, adjacency, aggregation, scaling, classification,
//! linking and imputation, plus a disk round-trip through the TSV readers
//! and the JSON report.

use h3o::{CellIndex, LatLng, Resolution};
use ndarray::Array2;

use stargen::data::matrix::DissimilarityMatrix;
use stargen::data::sample::{Sample, SampleTable};
use stargen::data::time_bin::{partition, BinningMode, TimeBin};
use stargen::geo;
use stargen::model::adjacency::AdjacencyMethod;
use stargen::model::aggregate::{pair_key, PairCache};
use stargen::pipelines::{BarrierParams, BarrierPipeline};

fn cell(lat: f64, lng: f64) -> CellIndex {
    LatLng::new(lat, lng).unwrap().to_cell(Resolution::Three)
}

fn sample_at(id: &str, c: CellIndex, age: f64) -> Sample {
    let ll = geo::centroid(c);
    Sample {
        id: id.to_string(),
        lat: ll.lat(),
        lon: ll.lng(),
        age,
        cell: c,
    }
}

/// Symmetric matrix from a distance closure over sample IDs.
fn matrix_from(ids: &[&str], dist: impl Fn(&str, &str) -> f64) -> DissimilarityMatrix {
    let n = ids.len();
    let mut values = Array2::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let d = dist(ids[i], ids[j]);
            values[[i, j]] = d;
            values[[j, i]] = d;
        }
    }
    DissimilarityMatrix::new(ids.iter().map(|s| s.to_string()).collect(), values).unwrap()
}

fn single_bin(n: usize) -> TimeBin {
    TimeBin {
        label: "test bin".to_string(),
        min_age: 0.0,
        max_age: 1000.0,
        indices: (0..n).collect(),
    }
}

/// Three mutually adjacent cluster cells plus one remote cell five grid
/// steps out. Cluster dissimilarities are moderate; the remote sample is
/// genetically close to everything.
struct World {
    table: SampleTable,
    matrix: DissimilarityMatrix,
    cluster: [CellIndex; 3],
    remote: CellIndex,
}

fn build_world() -> World {
    let b = cell(48.85, 2.35);
    let ring1 = geo::ring(b, 1);
    let c = ring1[0];
    // A third cell adjacent to both B and C.
    let d = ring1
        .iter()
        .copied()
        .find(|&x| x != c && geo::ring(c, 1).contains(&x))
        .expect("two ring-1 cells of B share an edge");
    let remote = geo::ring(b, 5)
        .into_iter()
        .find(|&x| {
            geo::grid_distance(c, x).is_some_and(|d| d >= 4)
                && geo::grid_distance(d, x).is_some_and(|d| d >= 4)
        })
        .expect("a ring-5 cell clear of the cluster");

    let table = SampleTable::from_samples(vec![
        sample_at("a0", remote, 900.0),
        sample_at("b0", b, 100.0),
        sample_at("b1", b, 200.0),
        sample_at("c0", c, 300.0),
        sample_at("d0", d, 400.0),
    ]);
    let matrix = matrix_from(&["a0", "b0", "b1", "c0", "d0"], |x, y| {
        let pair = (x.min(y), x.max(y));
        match pair {
            ("b0", "b1") => 0.05,
            ("b0", "c0") | ("b1", "c0") => 0.4,
            ("b0", "d0") | ("b1", "d0") => 0.6,
            ("c0", "d0") => 0.5,
            // The remote sample is genetically close to everyone.
            _ => 0.1,
        }
    });

    World {
        table,
        matrix,
        cluster: [b, c, d],
        remote,
    }
}

#[test]
fn adjacent_pair_average_is_the_matrix_distance() {
    let a = cell(48.85, 2.35);
    let b = geo::ring(a, 1)[0];
    let table = SampleTable::from_samples(vec![sample_at("s0", a, 100.0), sample_at("s1", b, 200.0)]);
    let matrix = matrix_from(&["s0", "s1"], |_, _| 0.5);
    let bin = single_bin(2);

    let mut cache = PairCache::new(&table, &bin, &matrix).unwrap();
    assert_eq!(cache.average(a, b).unwrap(), 0.5);
    assert_eq!(cache.average(b, a).unwrap(), 0.5);
}

#[test]
fn cluster_bin_produces_edges_and_no_isolation() {
    let world = build_world();
    // Cluster only: indices 1..=4
    let bin = TimeBin {
        label: "cluster".to_string(),
        min_age: 100.0,
        max_age: 400.0,
        indices: vec![1, 2, 3, 4],
    };
    let pipeline = BarrierPipeline::new(&world.table, &world.matrix, BarrierParams::default());
    let analysis = pipeline.run_bin(&bin).unwrap();

    let [b, c, d] = world.cluster;
    for (x, y) in [(b, c), (b, d), (c, d)] {
        assert!(
            analysis.classification.barrier_edges.contains_key(&pair_key(x, y)),
            "expected a direct edge between {x} and {y}"
        );
    }
    assert_eq!(analysis.n_cells, 3);
    assert_eq!(analysis.internal.len(), 3);
    // Moderate dissimilarities scale to roughly zero against their own
    // expectation; nothing clears the isolation threshold.
    assert!(analysis.links.still_isolated.is_empty());
}

#[test]
fn remote_cell_is_isolated_without_expansion_and_rescued_by_linker() {
    let world = build_world();
    let bin = single_bin(5);
    let pipeline = BarrierPipeline::new(&world.table, &world.matrix, BarrierParams::default());
    let analysis = pipeline.run_bin(&bin).unwrap();

    // No neighbors within ring 1: vacuously isolated by the classifier.
    assert!(analysis.classification.isolated.contains(&world.remote));
    // The linker finds a genetically close population elsewhere in the bin.
    assert!(analysis
        .links
        .links
        .keys()
        .any(|&(iso, _)| iso == world.remote));
    assert!(!analysis.links.still_isolated.contains(&world.remote));
}

#[test]
fn ring_expansion_connects_remote_cell() {
    let world = build_world();
    let bin = single_bin(5);
    let params = BarrierParams {
        allow_k_distance: true,
        ..BarrierParams::default()
    };
    let pipeline = BarrierPipeline::new(&world.table, &world.matrix, params);
    let analysis = pipeline.run_bin(&bin).unwrap();

    // With expansion the remote cell gains a neighbor distance, and the
    // low dissimilarity keeps it out of the isolated set entirely.
    assert!(analysis
        .pair_distances
        .keys()
        .any(|&(a, b)| a == world.remote || b == world.remote));
    assert!(!analysis.classification.isolated.contains(&world.remote));
}

#[test]
fn long_paths_are_pruned_by_the_length_bound() {
    let world = build_world();
    let bin = single_bin(5);

    let paint = BarrierParams {
        allow_k_distance: true,
        ..BarrierParams::default()
    };
    let pipeline = BarrierPipeline::new(&world.table, &world.matrix, paint);
    let painted = pipeline.run_bin(&bin).unwrap();
    // The remote pair is five grid steps out: within the default bound of
    // 10 it paints intermediate cells.
    assert!(!painted.classification.barrier_cells.is_empty());

    let pruned = BarrierParams {
        allow_k_distance: true,
        max_path_length: 3,
        ..BarrierParams::default()
    };
    let pipeline = BarrierPipeline::new(&world.table, &world.matrix, pruned);
    let analysis = pipeline.run_bin(&bin).unwrap();
    assert!(analysis.classification.barrier_cells.is_empty());
    for &(a, b) in analysis.classification.filtered_pairs.keys() {
        assert!(
            a.is_neighbor_with(b).unwrap_or(false),
            "only direct edges survive a tight path bound"
        );
    }
}

#[test]
fn imputed_cells_never_overlap_observed_cells() {
    let world = build_world();
    let bin = single_bin(5);
    let params = BarrierParams {
        allow_k_distance: true,
        impute_rounds: 4,
        ..BarrierParams::default()
    };
    let pipeline = BarrierPipeline::new(&world.table, &world.matrix, params);
    let analysis = pipeline.run_bin(&bin).unwrap();

    for cell in analysis.imputed.keys() {
        assert!(
            !analysis.classification.barrier_cells.contains_key(cell),
            "imputed cell {cell} overwrites an observed intensity"
        );
    }
}

#[test]
fn normalized_pairs_span_zero_to_one() {
    let world = build_world();
    let bin = TimeBin {
        label: "cluster".to_string(),
        min_age: 100.0,
        max_age: 400.0,
        indices: vec![1, 2, 3, 4],
    };
    let pipeline = BarrierPipeline::new(&world.table, &world.matrix, BarrierParams::default());
    let analysis = pipeline.run_bin(&bin).unwrap();

    let values: Vec<f64> = analysis.normalized_pairs.values().copied().collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if values.len() > 1 && max > min {
        assert_eq!(min, 0.0);
        assert_eq!(max, 1.0);
    }
    for v in values {
        assert!((0.0..=1.0).contains(&v));
    }
}

#[test]
fn delaunay_adjacency_connects_scattered_cells() {
    let world = build_world();
    let bin = single_bin(5);
    let params = BarrierParams {
        adjacency: AdjacencyMethod::Delaunay,
        ..BarrierParams::default()
    };
    let pipeline = BarrierPipeline::new(&world.table, &world.matrix, params);
    let analysis = pipeline.run_bin(&bin).unwrap();

    // Triangulation spans the gap no ring-1 search would cross.
    assert!(analysis
        .pair_distances
        .keys()
        .any(|&(a, b)| a == world.remote || b == world.remote));
}

#[test]
fn full_run_over_partitioned_bins() {
    let world = build_world();
    // Two copies of the layout at different epochs.
    let mut samples: Vec<Sample> = world.table.iter().cloned().collect();
    let late: Vec<Sample> = samples
        .iter()
        .map(|s| Sample {
            id: format!("{}_late", s.id),
            age: s.age + 5000.0,
            ..s.clone()
        })
        .collect();
    samples.extend(late);
    let table = SampleTable::from_samples(samples);

    let ids: Vec<String> = table.iter().map(|s| s.id.clone()).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let matrix = matrix_from(&id_refs, |x, y| {
        let base = |id: &str| id.trim_end_matches("_late").to_string();
        if base(x) == base(y) {
            0.05
        } else {
            0.45
        }
    });

    let bins = partition(&table, 2, BinningMode::EqualCount).unwrap();
    assert_eq!(bins.len(), 2);

    let pipeline = BarrierPipeline::new(&table, &matrix, BarrierParams::default());
    let results = pipeline.run(&bins);
    assert_eq!(results.len(), 2);
    for (label, result) in results {
        let analysis = result.unwrap_or_else(|e| panic!("bin {label} failed: {e}"));
        assert_eq!(analysis.n_samples, 5);
        assert_eq!(analysis.n_cells, 4);
    }
}

#[test]
fn tsv_inputs_round_trip_to_json_report() {
    use std::io::Write;

    let world = build_world();
    let dir = tempfile::tempdir().unwrap();

    // Sample table
    let table_path = dir.path().join("samples.tsv");
    {
        let mut f = std::fs::File::create(&table_path).unwrap();
        writeln!(f, "Index\tID\tCountry\tLatitude\tLongitude\tAge").unwrap();
        for (i, s) in world.table.iter().enumerate() {
            writeln!(f, "{i}\t{}\tNone\t{}\t{}\t{}", s.id, s.lat, s.lon, s.age).unwrap();
        }
        // A row with missing coordinates is skipped, not fatal.
        writeln!(f, "99\tskipme\tNone\t..\t..\t1234").unwrap();
    }
    let records = stargen::io::read_sample_table(&table_path).unwrap();
    assert_eq!(records.len(), 5);
    let table = SampleTable::from_records(records, Resolution::Three).unwrap();

    // Matrix
    let matrix_path = dir.path().join("matrix.tsv");
    {
        let ids: Vec<String> = table.iter().map(|s| s.id.clone()).collect();
        let mut f = std::fs::File::create(&matrix_path).unwrap();
        writeln!(f, "\t{}", ids.join("\t")).unwrap();
        for a in &ids {
            let row: Vec<String> = ids
                .iter()
                .map(|b| {
                    if a == b {
                        "0.0".to_string()
                    } else {
                        let i = world.matrix.index_of(a).unwrap();
                        let j = world.matrix.index_of(b).unwrap();
                        format!("{}", world.matrix.value(i, j))
                    }
                })
                .collect();
            writeln!(f, "{a}\t{}", row.join("\t")).unwrap();
        }
    }
    let matrix = stargen::io::read_dissimilarity_matrix(&matrix_path).unwrap();

    // Run and serialize
    let bins = vec![single_bin(table.len())];
    let pipeline = BarrierPipeline::new(&table, &matrix, BarrierParams::default());
    let mut report = stargen::io::RunReport::default();
    for (label, result) in pipeline.run(&bins) {
        match result {
            Ok(analysis) => report
                .bins
                .push(stargen::io::BinReport::from_analysis(&analysis)),
            Err(e) => panic!("bin {label} failed: {e}"),
        }
    }
    let report_path = dir.path().join("report.json");
    stargen::io::report::write_report(&report_path, &report).unwrap();

    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    let bin = &parsed["bins"][0];
    assert_eq!(bin["n_samples"], 5);
    // Observed and imputed maps never share a key.
    let observed = bin["barrier_cells"].as_object().unwrap();
    let imputed = bin["imputed_cells"].as_object().unwrap();
    for key in imputed.keys() {
        assert!(!observed.contains_key(key));
    }
}
