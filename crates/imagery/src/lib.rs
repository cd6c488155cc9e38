//! Aerial imagery acquisition and georeferencing.
//!
//! The pipeline requests a static aerial image plus its bounds metadata for a
//! field extent, reads the extent the service actually rendered, and stamps
//! the image with that extent using an external raster tool:
//!
//! ```text
//! raw bbox -> buffer -> fetch (image + xml) -> parse xml -> georeference -> GeoTIFF
//! ```
//!
//! Artifacts are cached on disk under a key derived from the requested
//! extent; see [`fetcher`] for the cache contract.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod georef;
pub mod metadata;
pub mod pipeline;

pub use config::{ApiKey, BufferPolicy, CachePolicy, ImageFormat, ImageryConfig, MapSize};
pub use error::{FetchError, GeoreferenceError, ImageryError, ParseError, Result, Stage};
pub use fetcher::{CachePaths, FetchRequest, FetchResult, ImageryFetcher};
pub use georef::{GeoreferencedRaster, Georeferencer};
pub use pipeline::ImageryPipeline;
