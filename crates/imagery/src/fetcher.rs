//! Static aerial image and bounds metadata retrieval.
//!
//! Each request produces two artifacts in the cache directory, named after
//! the requested extent's cache key:
//! - `<key>.<format>`: the image
//! - `<key>.xml`: bounds metadata for the image actually rendered
//!
//! Cache contract:
//! - Keys are derived only from the requested extent, so the same extent
//!   always maps to the same files.
//! - Entries never expire. [`CachePolicy::Reuse`] returns an existing pair
//!   without touching the network; [`CachePolicy::Refresh`] overwrites it.
//! - Downloads land in `<file>.partial` and are renamed into place, so a
//!   failed transfer never leaves a truncated file under the final name.
//! - There is no in-process locking. Two concurrent fetches of the same key
//!   must be serialized by the caller.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use report_common::BoundingBox;
use reqwest::{Client, Url};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::config::{CachePolicy, ImageFormat, ImageryConfig, MapSize};
use crate::error::{FetchError, ImageryError, Result, Stage};

/// One imagery request: an already-buffered extent, size and encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub bbox: BoundingBox,
    pub size: MapSize,
    pub format: ImageFormat,
}

impl FetchRequest {
    pub fn new(bbox: BoundingBox, size: MapSize, format: ImageFormat) -> Self {
        Self { bbox, size, format }
    }
}

/// Where a request's artifacts were written.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub image_path: PathBuf,
    pub metadata_path: PathBuf,
    pub cache_key: String,
    /// True when both files came from the cache.
    pub from_cache: bool,
}

/// File locations for one cache key.
#[derive(Debug, Clone, PartialEq)]
pub struct CachePaths {
    pub image: PathBuf,
    pub metadata: PathBuf,
    pub raster: PathBuf,
}

/// Downloads imagery and metadata into the on-disk cache.
pub struct ImageryFetcher {
    client: Client,
    config: Arc<ImageryConfig>,
}

impl ImageryFetcher {
    /// Create a fetcher sharing the given configuration.
    pub fn new(config: Arc<ImageryConfig>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.fetch_timeout())
            .connect_timeout(config.fetch_timeout().min(std::time::Duration::from_secs(30)))
            .build()
            .map_err(|e| ImageryError::InvalidConfig(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Cache file locations for `key` and `format`.
    pub fn cache_paths(&self, key: &str, format: ImageFormat) -> CachePaths {
        let dir = &self.config.cache_dir;
        CachePaths {
            image: dir.join(format!("{key}.{}", format.as_str())),
            metadata: dir.join(format!("{key}.xml")),
            raster: dir.join(format!("{key}.tiff")),
        }
    }

    /// Image URL and metadata URL for a request.
    ///
    /// `mapArea` is ordered south, west, north, east. The size is clamped to
    /// the configured provider limits; a clamp is logged, never silent.
    pub fn request_urls(&self, request: &FetchRequest) -> Result<(Url, Url)> {
        let size = self.effective_size(request.size);
        let bbox = &request.bbox;

        let mut image = Url::parse(&self.config.base_url).map_err(|e| FetchError::InvalidUrl {
            url: self.config.base_url.clone(),
            reason: e.to_string(),
        })?;
        image
            .query_pairs_mut()
            .append_pair(
                "mapArea",
                &format!(
                    "{},{},{},{}",
                    bbox.south(),
                    bbox.west(),
                    bbox.north(),
                    bbox.east()
                ),
            )
            .append_pair("mapSize", &size.to_string())
            .append_pair("format", request.format.as_str())
            .append_pair("key", self.config.api_key.expose());

        let mut metadata = image.clone();
        metadata
            .query_pairs_mut()
            .append_pair("mapMetadata", "1")
            .append_pair("o", "xml");

        Ok((image, metadata))
    }

    /// Fetch the image and metadata for `request` into the cache.
    #[instrument(skip(self, request), fields(bbox = %request.bbox))]
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult> {
        let cache_key = request.bbox.cache_key();
        let paths = self.cache_paths(&cache_key, request.format);

        if self.config.cache_policy == CachePolicy::Reuse
            && is_populated(&paths.image).await
            && is_populated(&paths.metadata).await
        {
            info!(cache_key = %cache_key, "Using cached imagery");
            return Ok(FetchResult {
                image_path: paths.image,
                metadata_path: paths.metadata,
                cache_key,
                from_cache: true,
            });
        }

        fs::create_dir_all(&self.config.cache_dir)
            .await
            .map_err(|source| FetchError::Write {
                path: self.config.cache_dir.clone(),
                source,
            })?;

        let (image_url, metadata_url) = self.request_urls(request)?;
        info!(cache_key = %cache_key, url = %redact(&image_url), "Requesting imagery");

        let image_bytes = self.download(&image_url, &paths.image).await?;
        let metadata_bytes = self.download(&metadata_url, &paths.metadata).await?;

        info!(
            cache_key = %cache_key,
            image_bytes = image_bytes,
            metadata_bytes = metadata_bytes,
            "Imagery downloaded"
        );

        Ok(FetchResult {
            image_path: paths.image,
            metadata_path: paths.metadata,
            cache_key,
            from_cache: false,
        })
    }

    /// Remove every cached artifact for `key`. Missing files are not an error.
    pub async fn evict(&self, key: &str, format: ImageFormat) -> Result<()> {
        let paths = self.cache_paths(key, format);
        for path in [paths.image, paths.metadata, paths.raster] {
            match fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "Evicted cache file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(FetchError::Write { path, source }.into()),
            }
        }
        Ok(())
    }

    fn effective_size(&self, requested: MapSize) -> MapSize {
        let size = requested.clamp(self.config.min_map_size, self.config.max_map_size);
        if size != requested {
            warn!(
                requested = %requested,
                clamped = %size,
                "Requested map size outside provider limits, clamping"
            );
        }
        size
    }

    /// GET `url` and write the body to `dest` via a `.partial` file.
    async fn download(&self, url: &Url, dest: &Path) -> Result<u64> {
        let timeout = self.config.fetch_timeout();
        let shown = redact(url);

        let body = tokio::time::timeout(timeout, async {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|source| request_error(&shown, source, timeout))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ImageryError::from(FetchError::Status {
                    url: shown.clone(),
                    status: status.as_u16(),
                }));
            }

            let body = response
                .bytes()
                .await
                .map_err(|source| request_error(&shown, source, timeout))?;
            Ok::<_, ImageryError>(body)
        })
        .await
        .map_err(|_| ImageryError::Timeout {
            stage: Stage::Fetch,
            after: timeout,
        })??;

        if body.is_empty() {
            return Err(FetchError::EmptyBody { url: shown }.into());
        }

        let partial = partial_path(dest);
        fs::write(&partial, &body)
            .await
            .map_err(|source| FetchError::Write {
                path: partial.clone(),
                source,
            })?;
        fs::rename(&partial, dest)
            .await
            .map_err(|source| FetchError::Write {
                path: dest.to_path_buf(),
                source,
            })?;

        debug!(path = %dest.display(), bytes = body.len(), "Wrote imagery artifact");
        Ok(body.len() as u64)
    }
}

fn request_error(url: &str, source: reqwest::Error, timeout: std::time::Duration) -> ImageryError {
    if source.is_timeout() {
        ImageryError::Timeout {
            stage: Stage::Fetch,
            after: timeout,
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            source,
        }
        .into()
    }
}

async fn is_populated(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name: OsString = dest.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// URL as a loggable string with the `key` parameter masked.
pub fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "key" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown.to_string()
}
