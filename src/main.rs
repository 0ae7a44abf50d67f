//! # Stargen: Spatio-Temporal Reconstruction of Genetic Barriers
//!
//! Bins genetically-typed samples in time, assigns them to hexagonal grid
//! cells, and estimates where gene flow appears historically restricted.
//!
//! ## Usage
//! ```bash
//! stargen --samples labeled_samples.tsv --matrix eucl_dist.tsv \
//!     --time-bins 14 --resolution 3 --out report.json
//! ```

use std::time::Instant;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use stargen::config::Config;
use stargen::data::sample::SampleTable;
use stargen::data::time_bin;
use stargen::io::report::{BinFailure, BinReport, RunReport};
use stargen::io::{self, report};
use stargen::pipelines::BarrierPipeline;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let start = Instant::now();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse_and_validate()?;

    // Configure thread pool
    if config.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build_global()
            .ok();
    }

    eprintln!("Stargen v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Samples: {:?}", config.samples);
    eprintln!("Matrix: {:?}", config.matrix);
    eprintln!(
        "Bins: {} ({})",
        config.time_bins,
        if config.same_age_range {
            "equal year span"
        } else {
            "equal sample count"
        }
    );
    eprintln!("Resolution: {}", config.resolution);

    let records = io::read_sample_table(&config.samples)?;
    let table = SampleTable::from_records(records, config.grid_resolution()?)?;
    let matrix = io::read_dissimilarity_matrix(&config.matrix)?;
    let bins = time_bin::partition(&table, config.time_bins, config.binning_mode())?;
    eprintln!("Loaded {} samples into {} bins", table.len(), bins.len());

    let pipeline = BarrierPipeline::new(&table, &matrix, config.to_params());
    let results = pipeline.run(&bins);

    let mut run_report = RunReport::default();
    for (label, result) in results {
        match result {
            Ok(analysis) => run_report.bins.push(BinReport::from_analysis(&analysis)),
            Err(err) => {
                eprintln!("Bin {label}: {err}");
                run_report.failures.push(BinFailure {
                    label,
                    error: err.to_string(),
                });
            }
        }
    }

    report::write_report(&config.out, &run_report)
        .with_context(|| format!("writing report to {:?}", config.out))?;

    let elapsed = start.elapsed();
    eprintln!(
        "Completed {} bins ({} failed) in {:.2}s",
        run_report.bins.len(),
        run_report.failures.len(),
        elapsed.as_secs_f64()
    );

    Ok(())
}
