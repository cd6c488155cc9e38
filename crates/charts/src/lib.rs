//! Report charts.
//!
//! Charts are drawn as SVG and optionally rasterized to PNG with
//! `resvg`. [`save_chart`] picks the format from the file extension.

pub mod error;
pub mod histogram;
pub mod pie;
pub mod raster;
mod svg;

use std::path::Path;

use tracing::info;

pub use error::{ChartError, Result};
pub use histogram::ProfitHistogram;
pub use pie::{PieChart, Wedge, DEFAULT_PALETTE};
pub use raster::render_png;

/// Scale applied when a chart is saved as PNG.
pub const PNG_SCALE: f32 = 2.0;

/// A chart that can draw itself as SVG.
pub trait Chart {
    fn to_svg(&self) -> Result<String>;
}

/// Write `chart` to `path` as SVG or PNG, by extension.
pub fn save_chart(chart: &dyn Chart, path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let bytes = match extension.as_deref() {
        Some("svg") => chart.to_svg()?.into_bytes(),
        Some("png") => render_png(&chart.to_svg()?, PNG_SCALE)?,
        _ => return Err(ChartError::UnsupportedFormat(path.to_path_buf())),
    };

    std::fs::write(path, &bytes).map_err(|source| ChartError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = bytes.len(), "Saved chart");
    Ok(())
}
