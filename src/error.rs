use std::path::PathBuf;

use thiserror::Error;

/// Failures of the annotation document store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("annotation document not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("annotation document {} is malformed: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize annotation document: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to replace {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A stored contour that cannot be turned back into polygon points.
#[derive(Error, Debug)]
pub enum ContourError {
    #[error("malformed contour encoding: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("contour has no points")]
    Empty,
    #[error("contour coordinate {0} is not a finite pixel position")]
    OutOfRange(f64),
}

/// Failures while reading the ground-truth table.
#[derive(Error, Debug)]
pub enum GroundTruthError {
    #[error("ground-truth table not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read ground-truth table {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ground-truth table is missing column {0}")]
    MissingColumn(&'static str),
    #[error("ground-truth table is empty")]
    Empty,
}
