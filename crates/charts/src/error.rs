//! Chart errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChartError>;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Invalid chart data: {0}")]
    InvalidData(String),

    #[error("Failed to parse chart SVG: {0}")]
    Svg(#[from] usvg::Error),

    #[error("Cannot rasterize a {width}x{height} image")]
    Raster { width: u32, height: u32 },

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error("Unsupported chart format for {0}. Use .svg or .png")]
    UnsupportedFormat(PathBuf),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
