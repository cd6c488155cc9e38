//! Subcommand implementations.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use charts::{save_chart, PieChart, ProfitHistogram};
use imagery::{CachePolicy, GeoreferencedRaster, ImageryError, ImageryPipeline};
use report_common::{BoundingBox, Color, CrsCode};
use serde_json::Value;
use symbology::{JobFileRenderer, MapJob, MapRenderer, MapStyle, MapType, RenderOptions, StylePlan};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ReportConfig;

/// Fetch and georeference imagery for an extent.
pub async fn imagery(
    config: &ReportConfig,
    bbox: &BoundingBox,
    refresh: bool,
    cancel: &CancellationToken,
) -> Result<GeoreferencedRaster> {
    let mut imagery = config.imagery.clone();
    if refresh {
        imagery.cache_policy = CachePolicy::Refresh;
    }
    let pipeline = ImageryPipeline::new(imagery).context("Invalid imagery configuration")?;

    match pipeline.run_with_cancel(bbox, cancel).await {
        Ok(raster) => Ok(raster),
        Err(e) => {
            let message = failure_message(bbox, &e);
            Err(anyhow::Error::new(e).context(message))
        }
    }
}

/// Context for a failed pipeline run, pointing at the timeout settings when one fired.
fn failure_message(bbox: &BoundingBox, error: &ImageryError) -> String {
    if error.is_timeout() {
        format!(
            "Imagery pipeline failed for {bbox} (raise imagery.fetch_timeout_secs or \
             imagery.georeference_timeout_secs for slow services or large extents)"
        )
    } else {
        format!("Imagery pipeline failed for {bbox}")
    }
}

pub fn pie(output: &Path, labels: Vec<String>, values: Vec<f64>, title: Option<String>) -> Result<()> {
    let mut chart = PieChart::new(labels, values);
    if let Some(title) = title {
        chart = chart.with_title(title);
    }
    save_chart(&chart, output)
        .with_context(|| format!("Failed to write pie chart {}", output.display()))?;
    info!(output = %output.display(), "Wrote pie chart");
    Ok(())
}

pub fn histogram(
    output: &Path,
    bins: Vec<f64>,
    values: Vec<f64>,
    colors_json: Option<&str>,
) -> Result<()> {
    let colors = match colors_json {
        Some(json) => parse_unit_colors(json)?,
        None => Vec::new(),
    };
    let chart = ProfitHistogram::new(bins, values, colors);
    save_chart(&chart, output)
        .with_context(|| format!("Failed to write histogram {}", output.display()))?;
    info!(output = %output.display(), "Wrote histogram");
    Ok(())
}

/// Parse `[[r, g, b, a], ...]` with channels in `[0, 1]`; alpha is optional.
pub fn parse_unit_colors(json: &str) -> Result<Vec<Color>> {
    let raw: Vec<Vec<f64>> =
        serde_json::from_str(json).context("Colors must be a JSON array of [r, g, b, a] arrays")?;

    raw.into_iter()
        .enumerate()
        .map(|(i, c)| match c.as_slice() {
            [r, g, b] => Ok(Color::from_unit_rgba(*r, *g, *b, 1.0)),
            [r, g, b, a] => Ok(Color::from_unit_rgba(*r, *g, *b, *a)),
            _ => bail!("Color {i} has {} channels, expected 3 or 4", c.len()),
        })
        .collect()
}

/// Read a JSON array of attribute values.
pub fn load_values(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read values file: {}", path.display()))?;
    let values: Vec<Value> = serde_json::from_str(&content)
        .with_context(|| format!("Values file {} is not a JSON array", path.display()))?;
    Ok(values)
}

/// Styling inputs shared by `style` and `map`.
#[derive(Debug, Clone)]
pub struct StyleRequest {
    pub map_type: MapType,
    pub field: Option<String>,
    pub classes: Option<usize>,
    pub qml: Option<PathBuf>,
    pub values_file: Option<PathBuf>,
}

pub fn resolve_style(request: &StyleRequest, opacity: f64) -> Result<StylePlan> {
    let style = MapStyle::from_parts(
        request.map_type,
        request.field.clone(),
        request.classes,
        request.qml.clone(),
    )?;

    let values = match &request.values_file {
        Some(path) => load_values(path)?,
        None => Vec::new(),
    };
    if values.is_empty() && matches!(style, MapStyle::Categorized { .. } | MapStyle::Graduated { .. }) {
        warn!(map_type = %request.map_type, "No attribute values supplied");
    }

    let plan = style
        .resolve(&values, opacity)
        .with_context(|| format!("Failed to build {} style", request.map_type))?;
    Ok(plan)
}

/// Build a map job, optionally with an imagery basemap, and hand it off.
pub async fn map(
    config: &ReportConfig,
    input: PathBuf,
    output: PathBuf,
    style: &StyleRequest,
    options: RenderOptions,
    imagery_bbox: Option<BoundingBox>,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    options.validate()?;
    let plan = resolve_style(style, options.layer_opacity)?;
    let mut job = MapJob::new(input, output, plan, options);

    if let Some(bbox) = imagery_bbox {
        let raster = imagery(config, &bbox, false, cancel).await?;
        job = job
            .with_basemap(raster.render_path())
            .with_layer_extent(&raster.bbox)?;
    }

    let renderer = JobFileRenderer;
    let written = renderer.render(&job).await?;
    Ok(written)
}

/// Parse `west,south,east,north` in `crs`.
pub fn parse_bbox(s: &str, crs: &str) -> Result<BoundingBox> {
    let crs = CrsCode::from_code(crs)?;
    BoundingBox::from_bbox_string(s, crs).with_context(|| format!("Invalid extent '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unit_colors() {
        let colors = parse_unit_colors("[[1.0, 0.0, 0.0, 0.85], [0, 1, 0]]").unwrap();
        assert_eq!(colors, vec![Color::rgba(255, 0, 0, 217), Color::rgb(0, 255, 0)]);
        assert!(parse_unit_colors("[[1.0, 0.0]]").is_err());
        assert!(parse_unit_colors("red").is_err());
    }

    #[test]
    fn test_failure_message_names_timeout_settings() {
        let bbox = parse_bbox("-93.09,42.96,-93.075,42.97", "EPSG:4326").unwrap();
        let timeout = ImageryError::Timeout {
            stage: imagery::Stage::Fetch,
            after: std::time::Duration::from_secs(60),
        };
        assert!(failure_message(&bbox, &timeout).contains("fetch_timeout_secs"));

        let cancelled = ImageryError::Cancelled {
            stage: imagery::Stage::Fetch,
        };
        assert!(!failure_message(&bbox, &cancelled).contains("timeout"));
    }

    #[test]
    fn test_parse_bbox() {
        let bbox = parse_bbox("-93.09,42.96,-93.075,42.97", "EPSG:4326").unwrap();
        assert_eq!(bbox.west(), -93.09);
        assert!(parse_bbox("-93.09,42.96", "EPSG:4326").is_err());
        assert!(parse_bbox("-93.09,42.96,-93.075,42.97", "EPSG:27700").is_err());
    }

    #[test]
    fn test_resolve_style_from_values_file() {
        let dir = test_utils::temp_test_dir();
        let values = dir.path().join("profit.json");
        std::fs::write(&values, "[-120.5, 30, 310.25, \"n/a\"]").unwrap();

        let request = StyleRequest {
            map_type: MapType::Graduated,
            field: Some("profit".into()),
            classes: Some(4),
            qml: None,
            values_file: Some(values),
        };
        match resolve_style(&request, 1.0).unwrap() {
            StylePlan::Graduated { ranges, .. } => {
                assert_eq!(ranges.len(), 4);
                assert_eq!(ranges[0].min, -120.5);
                assert_eq!(ranges[3].max, 310.25);
            }
            other => panic!("expected graduated plan, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_map_without_imagery_writes_job() {
        let dir = test_utils::temp_test_dir();
        let output = dir.path().join("field.png");
        let request = StyleRequest {
            map_type: MapType::Test,
            field: None,
            classes: None,
            qml: None,
            values_file: None,
        };

        let written = map(
            &ReportConfig::default(),
            PathBuf::from("soils.shp"),
            output,
            &request,
            RenderOptions::default(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(written, dir.path().join("field.job.json"));
        let job = MapJob::from_json(&std::fs::read_to_string(&written).unwrap()).unwrap();
        assert!(job.basemap.is_none());
    }

    #[test]
    fn test_pie_writes_svg() {
        let dir = test_utils::temp_test_dir();
        let output = dir.path().join("pie.svg");
        pie(&output, vec!["Seed".into(), "Land".into()], vec![1.0, 3.0], None).unwrap();
        assert!(std::fs::read_to_string(&output).unwrap().contains("Expenses"));
    }
}
