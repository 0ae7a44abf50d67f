//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for Stargen operations
#[derive(Error, Debug)]
pub enum StargenError {
    /// I/O errors (file missing, permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse errors in input tables
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Invalid data errors (matrix shape mismatch, unknown sample IDs)
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Aggregation requested for a cell with no samples
    #[error("Cell {cell} has no samples")]
    EmptyCell { cell: String },

    /// Scaling model fit failure (non-convergence, degenerate input)
    #[error("Scaling model error: {message}")]
    ModelFit { message: String },

    /// Grid path construction failed between two cells
    #[error("Path search failed between {from} and {to}: {message}")]
    PathSearch {
        from: String,
        to: String,
        message: String,
    },

    /// Configuration errors (invalid CLI arguments)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File not found errors
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },
}

/// Type alias for Results using StargenError
pub type Result<T> = std::result::Result<T, StargenError>;

impl StargenError {
    /// Create a parse error with a line number and message
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create an empty cell error
    pub fn empty_cell(cell: impl ToString) -> Self {
        Self::EmptyCell {
            cell: cell.to_string(),
        }
    }

    /// Create a scaling model error
    pub fn model_fit(message: impl Into<String>) -> Self {
        Self::ModelFit {
            message: message.into(),
        }
    }

    /// Create a path search error
    pub fn path_search(from: impl ToString, to: impl ToString, message: impl Into<String>) -> Self {
        Self::PathSearch {
            from: from.to_string(),
            to: to.to_string(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
