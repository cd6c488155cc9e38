//! Imagery pipeline configuration.
//!
//! One immutable [`ImageryConfig`] is built at startup (YAML file, then
//! environment overrides) and handed to every component constructor.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use report_common::{BoundingBox, CrsCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ImageryError, Result};

/// Static map endpoint of the aerial imagery service.
pub const DEFAULT_BASE_URL: &str = "http://dev.virtualearth.net/REST/v1/Imagery/Map/Aerial";

/// Buffer applied to each edge before requesting imagery (degrees).
pub const DEFAULT_BUFFER_DEGREES: f64 = 0.01;

/// Imagery service credential. Never printed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Requested image size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSize {
    pub width: u32,
    pub height: u32,
}

impl MapSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Clamp each dimension into `[min, max]`.
    pub fn clamp(self, min: MapSize, max: MapSize) -> MapSize {
        MapSize {
            width: self.width.clamp(min.width, max.width),
            height: self.height.clamp(min.height, max.height),
        }
    }
}

impl fmt::Display for MapSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.width, self.height)
    }
}

/// Image encodings the service can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Gif,
}

impl ImageFormat {
    /// Value of the `format` query parameter, also used as file extension.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
        }
    }
}

/// Whether cached artifacts for a key are reused.
///
/// Cache entries never expire; they are keyed by the requested extent and
/// are only removed by [`crate::ImageryFetcher::evict`] or by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Skip the network when both image and metadata are already on disk.
    #[default]
    Reuse,
    /// Always download, overwriting any cached pair.
    Refresh,
}

/// How far the requested extent is grown past the field extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum BufferPolicy {
    /// Fixed distance in CRS units (degrees for EPSG:4326).
    Absolute { amount: f64 },
    /// Fraction of the larger box dimension.
    Relative { fraction: f64 },
}

impl Default for BufferPolicy {
    fn default() -> Self {
        BufferPolicy::Absolute {
            amount: DEFAULT_BUFFER_DEGREES,
        }
    }
}

impl BufferPolicy {
    /// Buffer distance for a given extent.
    pub fn amount_for(&self, bbox: &BoundingBox) -> f64 {
        match *self {
            BufferPolicy::Absolute { amount } => amount,
            BufferPolicy::Relative { fraction } => fraction * bbox.width().max(bbox.height()),
        }
    }
}

/// Configuration for fetching and georeferencing imagery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageryConfig {
    /// Imagery service credential
    pub api_key: ApiKey,
    /// Static map endpoint
    pub base_url: String,
    /// Default requested image size
    pub map_size: MapSize,
    /// Largest size the service documents (900x834)
    pub max_map_size: MapSize,
    /// Smallest size the service accepts (80x80)
    pub min_map_size: MapSize,
    /// Requested image encoding
    pub format: ImageFormat,
    /// Directory holding cached image, metadata and raster files
    pub cache_dir: PathBuf,
    pub cache_policy: CachePolicy,
    pub buffer: BufferPolicy,
    /// Tool that stamps bounds onto the image
    pub translate_tool: PathBuf,
    /// Tool that reprojects the georeferenced raster
    pub warp_tool: PathBuf,
    /// Reproject the raster into this CRS after georeferencing
    pub warp_crs: Option<CrsCode>,
    pub fetch_timeout_secs: u64,
    pub georeference_timeout_secs: u64,
}

impl Default for ImageryConfig {
    fn default() -> Self {
        Self {
            api_key: ApiKey::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            map_size: MapSize::new(830, 830),
            max_map_size: MapSize::new(900, 834),
            min_map_size: MapSize::new(80, 80),
            format: ImageFormat::Png,
            cache_dir: PathBuf::from("."),
            cache_policy: CachePolicy::Reuse,
            buffer: BufferPolicy::default(),
            translate_tool: PathBuf::from("gdal_translate"),
            warp_tool: PathBuf::from("gdalwarp"),
            warp_crs: None,
            fetch_timeout_secs: 60,
            georeference_timeout_secs: 120,
        }
    }
}

impl ImageryConfig {
    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of this configuration.
    ///
    /// Recognised variables: `BING_MAPS_KEY`, `IMAGERY_BASE_URL`,
    /// `IMAGERY_CACHE_DIR`, `IMAGERY_WARP_CRS`, `GDAL_TRANSLATE`, `GDALWARP`.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(key) = env::var("BING_MAPS_KEY") {
            self.api_key = ApiKey::new(key);
        }
        if let Ok(url) = env::var("IMAGERY_BASE_URL") {
            self.base_url = url;
        }
        if let Ok(dir) = env::var("IMAGERY_CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Ok(crs) = env::var("IMAGERY_WARP_CRS") {
            let code = CrsCode::from_code(&crs)
                .map_err(|e| ImageryError::InvalidConfig(e.to_string()))?;
            self.warp_crs = Some(code);
        }
        if let Ok(tool) = env::var("GDAL_TRANSLATE") {
            self.translate_tool = PathBuf::from(tool);
        }
        if let Ok(tool) = env::var("GDALWARP") {
            self.warp_tool = PathBuf::from(tool);
        }

        debug!(
            base_url = %self.base_url,
            cache_dir = %self.cache_dir.display(),
            has_api_key = !self.api_key.is_empty(),
            "Applied imagery environment overrides"
        );
        Ok(self)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(ImageryError::InvalidConfig(
                "api_key is empty (set BING_MAPS_KEY)".to_string(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(ImageryError::InvalidConfig("base_url is empty".to_string()));
        }
        if self.fetch_timeout_secs == 0 || self.georeference_timeout_secs == 0 {
            return Err(ImageryError::InvalidConfig(
                "timeouts must be at least one second".to_string(),
            ));
        }
        if self.min_map_size.width > self.max_map_size.width
            || self.min_map_size.height > self.max_map_size.height
        {
            return Err(ImageryError::InvalidConfig(format!(
                "min_map_size {} exceeds max_map_size {}",
                self.min_map_size, self.max_map_size
            )));
        }
        match self.buffer {
            BufferPolicy::Absolute { amount } if !amount.is_finite() || amount < 0.0 => {
                return Err(ImageryError::InvalidConfig(format!(
                    "buffer amount must be a non-negative number, got {amount}"
                )));
            }
            BufferPolicy::Relative { fraction } if !fraction.is_finite() || fraction < 0.0 => {
                return Err(ImageryError::InvalidConfig(format!(
                    "buffer fraction must be a non-negative number, got {fraction}"
                )));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn georeference_timeout(&self) -> Duration {
        Duration::from_secs(self.georeference_timeout_secs)
    }
}
