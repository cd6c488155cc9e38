//! Stamps downloaded imagery with its extent using external raster tools.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use report_common::{BoundingBox, CrsCode};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::config::ImageryConfig;
use crate::error::{GeoreferenceError, ImageryError, Result, Stage};

/// A raster file carrying spatial reference information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoreferencedRaster {
    /// Image the raster was produced from
    pub source_path: PathBuf,
    /// Extent stamped onto the raster
    pub bbox: BoundingBox,
    pub crs: CrsCode,
    /// Georeferenced GeoTIFF
    pub output_path: PathBuf,
    /// Reprojected copy, when a warp CRS is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprojected: Option<PathBuf>,
}

impl GeoreferencedRaster {
    /// The file a renderer should load: the reprojected copy if present.
    pub fn render_path(&self) -> &Path {
        self.reprojected.as_deref().unwrap_or(&self.output_path)
    }
}

/// Runs `gdal_translate`-compatible and `gdalwarp`-compatible tools.
pub struct Georeferencer {
    config: Arc<ImageryConfig>,
}

impl Georeferencer {
    pub fn new(config: Arc<ImageryConfig>) -> Self {
        Self { config }
    }

    /// Arguments assigning `bbox` to `image` and writing a GeoTIFF to `output`.
    ///
    /// Corners go upper-left then lower-right: west, north, east, south.
    pub fn translate_args(image: &Path, output: &Path, bbox: &BoundingBox) -> Vec<OsString> {
        let [ulx, uly, lrx, lry] = bbox.upper_left_lower_right();
        let mut args: Vec<OsString> = vec![
            "-of".into(),
            "GTiff".into(),
            "-a_srs".into(),
            bbox.crs().to_string().into(),
            "-a_ullr".into(),
        ];
        args.extend([ulx, uly, lrx, lry].iter().map(|v| OsString::from(v.to_string())));
        args.push(image.as_os_str().to_owned());
        args.push(output.as_os_str().to_owned());
        args
    }

    /// Arguments reprojecting `input` into `crs`.
    pub fn warp_args(input: &Path, output: &Path, crs: CrsCode) -> Vec<OsString> {
        vec![
            "-overwrite".into(),
            "-t_srs".into(),
            crs.to_string().into(),
            "-r".into(),
            "cubicspline".into(),
            input.as_os_str().to_owned(),
            output.as_os_str().to_owned(),
        ]
    }

    /// Georeference `image` into `output` using `bbox`.
    #[instrument(skip(self), fields(image = %image.display(), bbox = %bbox))]
    pub async fn georeference(
        &self,
        image: &Path,
        output: &Path,
        bbox: &BoundingBox,
    ) -> Result<GeoreferencedRaster> {
        let args = Self::translate_args(image, output, bbox);
        self.run_tool(
            &self.config.translate_tool,
            &args,
            output,
            Stage::Georeference,
        )
        .await?;

        info!(output = %output.display(), "Georeferenced imagery");
        Ok(GeoreferencedRaster {
            source_path: image.to_path_buf(),
            bbox: *bbox,
            crs: bbox.crs(),
            output_path: output.to_path_buf(),
            reprojected: None,
        })
    }

    /// Reproject a georeferenced raster into `crs`.
    ///
    /// The copy is written next to the input as `<stem>_<epsg>.tiff`.
    #[instrument(skip(self, raster), fields(input = %raster.output_path.display(), crs = %crs))]
    pub async fn reproject(
        &self,
        mut raster: GeoreferencedRaster,
        crs: CrsCode,
    ) -> Result<GeoreferencedRaster> {
        let output = reprojected_path(&raster.output_path, crs);
        let args = Self::warp_args(&raster.output_path, &output, crs);
        self.run_tool(&self.config.warp_tool, &args, &output, Stage::Reproject)
            .await?;

        info!(output = %output.display(), "Reprojected imagery");
        raster.reprojected = Some(output);
        Ok(raster)
    }

    async fn run_tool(
        &self,
        tool: &Path,
        args: &[OsString],
        output: &Path,
        stage: Stage,
    ) -> Result<()> {
        // A stale file from an earlier run would mask a tool that writes nothing
        match tokio::fs::remove_file(output).await {
            Ok(()) => debug!(path = %output.display(), "Removed stale output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(GeoreferenceError::Io {
                    path: output.to_path_buf(),
                    source,
                }
                .into())
            }
        }

        debug!(tool = %tool.display(), args = ?args, "Running raster tool");

        let child = Command::new(tool)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| GeoreferenceError::Spawn {
                tool: tool.to_path_buf(),
                source,
            })?;

        let timeout: Duration = self.config.georeference_timeout();
        let result = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ImageryError::Timeout {
                stage,
                after: timeout,
            })?
            .map_err(|source| GeoreferenceError::Spawn {
                tool: tool.to_path_buf(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&result.stdout);
        let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
        if !stdout.trim().is_empty() {
            debug!(tool = %tool.display(), stdout = %stdout.trim(), "Raster tool output");
        }

        if !result.status.success() {
            warn!(tool = %tool.display(), status = ?result.status.code(), stderr = %stderr, "Raster tool failed");
            return Err(GeoreferenceError::ExitStatus {
                tool: tool.to_path_buf(),
                status: result.status.code(),
                stderr,
            }
            .into());
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(GeoreferenceError::MissingOutput {
                tool: tool.to_path_buf(),
                output: output.to_path_buf(),
                stderr,
            }
            .into());
        }

        Ok(())
    }
}

fn reprojected_path(input: &Path, crs: CrsCode) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}_{}.tiff", crs.epsg()))
}
