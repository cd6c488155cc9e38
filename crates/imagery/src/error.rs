//! Error types for the imagery pipeline.
//!
//! Each stage has its own error type carrying the URL or path involved;
//! [`ImageryError`] wraps them without losing the original cause.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use report_common::BboxError;
use thiserror::Error;

/// Result type for imagery operations.
pub type Result<T> = std::result::Result<T, ImageryError>;

/// Pipeline stages that can block, time out, or be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Georeference,
    Reproject,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "imagery fetch",
            Stage::Georeference => "georeferencing",
            Stage::Reproject => "reprojection",
        };
        f.write_str(name)
    }
}

/// Top-level error for the imagery pipeline.
#[derive(Error, Debug)]
pub enum ImageryError {
    #[error("Invalid bounding box: {0}")]
    Validation(#[from] BboxError),

    #[error("Invalid imagery configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Georeference(#[from] GeoreferenceError),

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },

    #[error("{stage} was cancelled")]
    Cancelled { stage: Stage },
}

impl ImageryError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ImageryError::Timeout { .. })
    }
}

/// Failures talking to the imagery service or writing what it returned.
///
/// URLs are stored with the API key redacted.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid imagery URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} returned an empty body")]
    EmptyBody { url: String },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    /// HTTP status returned by the service, if the failure got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Request { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Failures reading the bounds metadata document.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read metadata {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed metadata {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Metadata {path} ends before its root element is closed")]
    Truncated { path: PathBuf },

    #[error("Metadata {path} is missing <{tag}>")]
    MissingTag { path: PathBuf, tag: &'static str },

    #[error("Metadata {path} has non-numeric <{tag}>: {value:?}")]
    InvalidValue {
        path: PathBuf,
        tag: &'static str,
        value: String,
    },

    #[error("Metadata {path} describes an invalid extent: {source}")]
    InvalidBounds {
        path: PathBuf,
        #[source]
        source: BboxError,
    },
}

/// Failures running the external raster tool.
#[derive(Error, Debug)]
pub enum GeoreferenceError {
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{tool} exited with status {status:?}: {stderr}")]
    ExitStatus {
        tool: PathBuf,
        status: Option<i32>,
        stderr: String,
    },

    #[error("{tool} reported success but {output} was not written: {stderr}")]
    MissingOutput {
        tool: PathBuf,
        output: PathBuf,
        stderr: String,
    },

    #[error("Failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
