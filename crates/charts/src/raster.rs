//! SVG to PNG rasterization.

use std::sync::Arc;

use tracing::debug;

use crate::error::{ChartError, Result};

/// Rasterize an SVG document at `scale` times its nominal size.
///
/// System fonts are loaded so chart text renders; on a machine without
/// fonts the shapes still render and text is dropped.
pub fn render_png(svg: &str, scale: f32) -> Result<Vec<u8>> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ChartError::InvalidData(format!(
            "raster scale must be positive, got {scale}"
        )));
    }

    let mut opt = usvg::Options::default();
    Arc::make_mut(&mut opt.fontdb).load_system_fonts();
    let tree = usvg::Tree::from_str(svg, &opt)?;

    let size = tree.size();
    let width = (size.width() * scale).ceil() as u32;
    let height = (size.height() * scale).ceil() as u32;
    let mut pixmap =
        tiny_skia::Pixmap::new(width, height).ok_or(ChartError::Raster { width, height })?;

    let transform = tiny_skia::Transform::from_scale(scale, scale);
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    let png = pixmap
        .encode_png()
        .map_err(|e| ChartError::Encode(e.to_string()))?;
    debug!(width, height, bytes = png.len(), "Rasterized chart");
    Ok(png)
}
