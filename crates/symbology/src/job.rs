//! Map render jobs and the renderer interface.
//!
//! Drawing vector layers over a basemap is left to an external GIS engine.
//! A [`MapJob`] bundles everything that engine needs; [`MapRenderer`] is the
//! single seam through which jobs are handed over.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use report_common::BoundingBox;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::{Result, SymbologyError};
use crate::options::RenderOptions;
use crate::style::StylePlan;

/// Everything needed to draw one map image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapJob {
    /// Vector layer to style
    pub input: PathBuf,
    /// Image to produce
    pub output: PathBuf,
    /// Georeferenced basemap drawn under the vector layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basemap: Option<PathBuf>,
    /// Map extent after scaling, when known up front
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<BoundingBox>,
    pub style: StylePlan,
    pub options: RenderOptions,
}

impl MapJob {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        style: StylePlan,
        options: RenderOptions,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            basemap: None,
            extent: None,
            style,
            options,
        }
    }

    pub fn with_basemap(mut self, basemap: impl Into<PathBuf>) -> Self {
        self.basemap = Some(basemap.into());
        self
    }

    /// Set the extent from a layer extent, grown by the job's scale factor.
    pub fn with_layer_extent(mut self, layer_extent: &BoundingBox) -> Result<Self> {
        self.extent = Some(self.options.map_extent(layer_extent)?);
        Ok(self)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Something that turns a [`MapJob`] into a file.
#[async_trait]
pub trait MapRenderer: Send + Sync {
    /// Render `job`, returning the path of what was written.
    async fn render(&self, job: &MapJob) -> Result<PathBuf>;
}

/// Writes each job as JSON next to its output for an external renderer.
///
/// The job file for `map.png` is `map.job.json`.
#[derive(Debug, Clone, Default)]
pub struct JobFileRenderer;

impl JobFileRenderer {
    pub fn job_path(output: &Path) -> PathBuf {
        output.with_extension("job.json")
    }
}

#[async_trait]
impl MapRenderer for JobFileRenderer {
    #[instrument(skip(self, job), fields(output = %job.output.display(), map_type = %job.style.map_type()))]
    async fn render(&self, job: &MapJob) -> Result<PathBuf> {
        job.options.validate()?;

        let path = Self::job_path(&job.output);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SymbologyError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let json = job.to_json()?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| SymbologyError::Io {
                path: path.clone(),
                source,
            })?;

        info!(job = %path.display(), "Wrote map job");
        Ok(path)
    }
}
