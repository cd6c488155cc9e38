//! Error types for map styling.

use std::io;
use std::path::PathBuf;

use report_common::BboxError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SymbologyError>;

#[derive(Error, Debug)]
pub enum SymbologyError {
    #[error("Unknown map type: {0}. Expected categorized, graduated, qml or test")]
    UnknownMapType(String),

    #[error("Unknown label placement: {0}")]
    UnknownPlacement(String),

    #[error("{map_type} maps need {what}")]
    MissingParameter {
        map_type: &'static str,
        what: &'static str,
    },

    #[error("A graduated style needs at least one class")]
    ZeroClasses,

    #[error("No usable values for attribute '{field}'")]
    NoValues { field: String },

    #[error("Invalid render options: {0}")]
    InvalidOptions(String),

    #[error("Invalid map extent: {0}")]
    Extent(#[from] BboxError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode map job: {0}")]
    Encode(#[from] serde_json::Error),
}
