//! # Dissimilarity Matrix Reader
//!
//! Reads the precomputed sample-to-sample dissimilarity matrix from a
//! tab-separated square table: first header row lists the sample IDs, each
//! body row leads with its own ID. Shape, row-order and symmetry are
//! validated on load; the matrix is immutable afterwards.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ndarray::Array2;
use tracing::info;

use crate::data::matrix::DissimilarityMatrix;
use crate::error::{Result, StargenError};

/// Read a square, symmetric dissimilarity matrix from a TSV file.
pub fn read_dissimilarity_matrix(path: &Path) -> Result<DissimilarityMatrix> {
    if !path.exists() {
        return Err(StargenError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines();

    let header = lines
        .next()
        .ok_or_else(|| StargenError::parse(1, "empty matrix file"))??;
    let mut ids: Vec<&str> = header.split('\t').map(str::trim).collect();
    // The corner cell above the row labels may be empty or a label.
    if ids.first().is_some_and(|&c| c.is_empty() || c == "ID") {
        ids.remove(0);
    }
    let ids: Vec<String> = ids.into_iter().map(str::to_string).collect();
    let n = ids.len();
    if n == 0 {
        return Err(StargenError::parse(1, "matrix header has no sample IDs"));
    }

    let mut values = Vec::with_capacity(n * n);
    let mut rows_read = 0usize;

    for (row, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = row + 2;
        if rows_read == n {
            return Err(StargenError::parse(line_no, "more rows than header IDs"));
        }

        let mut fields = line.split('\t').map(str::trim);
        let row_id = fields
            .next()
            .ok_or_else(|| StargenError::parse(line_no, "missing row label"))?;
        if row_id != ids[rows_read] {
            return Err(StargenError::invalid_data(format!(
                "row {} is labeled '{}' but the header says '{}'",
                rows_read + 1,
                row_id,
                ids[rows_read]
            )));
        }

        let mut count = 0usize;
        for field in fields {
            let value: f64 = field.parse().map_err(|_| {
                StargenError::parse(line_no, format!("invalid value '{field}'"))
            })?;
            values.push(value);
            count += 1;
        }
        if count != n {
            return Err(StargenError::parse(
                line_no,
                format!("expected {n} values, got {count}"),
            ));
        }
        rows_read += 1;
    }

    if rows_read != n {
        return Err(StargenError::invalid_data(format!(
            "matrix has {rows_read} rows for {n} header IDs"
        )));
    }

    let array = Array2::from_shape_vec((n, n), values)
        .map_err(|e| StargenError::invalid_data(format!("matrix shape: {e}")))?;
    let matrix = DissimilarityMatrix::new(ids, array)?;
    info!(n_samples = matrix.len(), "dissimilarity matrix loaded");
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_matrix(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_reads_square_matrix() {
        let file = write_matrix(
            "\ta\tb\n\
             a\t0.0\t0.5\n\
             b\t0.5\t0.0\n",
        );
        let matrix = read_dissimilarity_matrix(file.path()).unwrap();
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix.index_of("b"), Some(1));
        assert!((matrix.value(0, 1) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_asymmetric_matrix() {
        let file = write_matrix(
            "\ta\tb\n\
             a\t0.0\t0.5\n\
             b\t0.4\t0.0\n",
        );
        assert!(matches!(
            read_dissimilarity_matrix(file.path()),
            Err(StargenError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_rejects_row_label_mismatch() {
        let file = write_matrix(
            "\ta\tb\n\
             a\t0.0\t0.5\n\
             c\t0.5\t0.0\n",
        );
        assert!(read_dissimilarity_matrix(file.path()).is_err());
    }

    #[test]
    fn test_rejects_short_row() {
        let file = write_matrix(
            "\ta\tb\n\
             a\t0.0\n\
             b\t0.5\t0.0\n",
        );
        assert!(matches!(
            read_dissimilarity_matrix(file.path()),
            Err(StargenError::Parse { .. })
        ));
    }
}
