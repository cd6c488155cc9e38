//! Extent transforms between supported CRSs.

use report_common::{BboxResult, BoundingBox, CrsCode};

use crate::mercator;

/// Transform an extent into EPSG:4326.
///
/// The upper-left and lower-right corners are projected independently. For
/// the conformal Web Mercator this is exact: meridians and parallels stay
/// axis-aligned, so the corners still bound the extent.
pub fn to_geographic(bbox: &BoundingBox) -> BboxResult<BoundingBox> {
    to_crs(bbox, CrsCode::Epsg4326)
}

/// Transform an extent into `target`.
pub fn to_crs(bbox: &BoundingBox, target: CrsCode) -> BboxResult<BoundingBox> {
    let project: fn(f64, f64) -> (f64, f64) = match (bbox.crs(), target) {
        (CrsCode::Epsg3857, CrsCode::Epsg4326) => mercator::to_geographic,
        (CrsCode::Epsg4326, CrsCode::Epsg3857) => mercator::from_geographic,
        _ => return Ok(*bbox),
    };

    let [west, north, east, south] = bbox.upper_left_lower_right();
    let (w, n) = project(west, north);
    let (e, s) = project(east, south);

    // Rounding at the projection edge can overshoot the target bounds by an ulp
    let (min_x, min_y, max_x, max_y) = target.valid_bounds();
    BoundingBox::with_crs(
        w.clamp(min_x, max_x),
        s.clamp(min_y, max_y),
        e.clamp(min_x, max_x),
        n.clamp(min_y, max_y),
        target,
    )
}
