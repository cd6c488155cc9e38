//! End-to-end imagery acquisition for one field extent.

use std::future::Future;
use std::sync::Arc;

use report_common::BoundingBox;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::ImageryConfig;
use crate::error::{ImageryError, Result, Stage};
use crate::fetcher::{FetchRequest, ImageryFetcher};
use crate::georef::{GeoreferencedRaster, Georeferencer};
use crate::metadata;

/// Buffer, fetch, parse, georeference and optionally reproject.
///
/// Steps run strictly in sequence and the first failure aborts the run.
/// Downloaded files are left in place on failure so a re-run for the same
/// extent reuses them.
///
/// Not safe to run concurrently for the same extent: two runs would write
/// the same cache files. Serialize same-extent runs outside the pipeline.
pub struct ImageryPipeline {
    config: Arc<ImageryConfig>,
    fetcher: ImageryFetcher,
    georeferencer: Georeferencer,
}

impl ImageryPipeline {
    /// Validate `config` and build the pipeline's components from it.
    pub fn new(config: ImageryConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        Ok(Self {
            fetcher: ImageryFetcher::new(Arc::clone(&config))?,
            georeferencer: Georeferencer::new(Arc::clone(&config)),
            config,
        })
    }

    pub fn config(&self) -> &ImageryConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &ImageryFetcher {
        &self.fetcher
    }

    /// Run the pipeline for a raw field extent.
    pub async fn run(&self, raw: &BoundingBox) -> Result<GeoreferencedRaster> {
        self.run_with_cancel(raw, &CancellationToken::new()).await
    }

    /// Run the pipeline, stopping at the next blocking step once `cancel`
    /// fires. A running external tool is killed.
    #[instrument(skip(self, cancel), fields(raw = %raw))]
    pub async fn run_with_cancel(
        &self,
        raw: &BoundingBox,
        cancel: &CancellationToken,
    ) -> Result<GeoreferencedRaster> {
        let geographic = projection::to_geographic(raw)?;
        let amount = self.config.buffer.amount_for(&geographic);
        let requested = geographic.buffered(amount)?;

        info!(requested = %requested, buffer = amount, "Requesting imagery for field");

        let request = FetchRequest::new(requested, self.config.map_size, self.config.format);
        let fetched = guarded(Stage::Fetch, cancel, self.fetcher.fetch(&request)).await?;

        let corrected = metadata::parse_file(&fetched.metadata_path).await?;
        if !corrected.contains(&geographic) {
            warn!(
                corrected = %corrected,
                raw = %geographic,
                "Rendered extent does not cover the whole field"
            );
        }

        let output = self
            .fetcher
            .cache_paths(&fetched.cache_key, request.format)
            .raster;
        let raster = guarded(
            Stage::Georeference,
            cancel,
            self.georeferencer
                .georeference(&fetched.image_path, &output, &corrected),
        )
        .await?;

        let raster = match self.config.warp_crs {
            Some(crs) if crs != raster.crs => {
                guarded(
                    Stage::Reproject,
                    cancel,
                    self.georeferencer.reproject(raster, crs),
                )
                .await?
            }
            _ => raster,
        };

        info!(
            output = %raster.render_path().display(),
            from_cache = fetched.from_cache,
            "Imagery pipeline complete"
        );
        Ok(raster)
    }
}

async fn guarded<T>(
    stage: Stage,
    cancel: &CancellationToken,
    step: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ImageryError::Cancelled { stage }),
        result = step => result,
    }
}
