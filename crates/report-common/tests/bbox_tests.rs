//! Tests for BoundingBox construction, buffering and cache keys.

use report_common::bbox::{BboxError, BoundingBox};
use report_common::CrsCode;
use test_utils::assert_approx_eq;

// ============================================================================
// Constructor tests
// ============================================================================

#[test]
fn test_rejects_equal_west_east() {
    let result = BoundingBox::from_4_values(-93.0, 42.0, -93.0, 43.0);
    assert!(matches!(result, Err(BboxError::Degenerate { axis: "x", .. })));
}

#[test]
fn test_rejects_equal_south_north() {
    let result = BoundingBox::from_4_values(-94.0, 42.0, -93.0, 42.0);
    assert!(matches!(result, Err(BboxError::Degenerate { axis: "y", .. })));
}

#[test]
fn test_rejects_inverted_west_east() {
    let result = BoundingBox::from_4_values(-92.0, 42.0, -93.0, 43.0);
    assert!(matches!(result, Err(BboxError::Degenerate { .. })));
}

#[test]
fn test_rejects_latitude_above_90() {
    let result = BoundingBox::from_4_values(-93.0, 42.0, -92.0, 90.5);
    assert!(matches!(
        result,
        Err(BboxError::OutOfRange { field: "north", .. })
    ));
}

#[test]
fn test_rejects_longitude_below_minus_180() {
    let result = BoundingBox::from_4_values(-180.5, 0.0, 10.0, 10.0);
    assert!(matches!(result, Err(BboxError::OutOfRange { field: "west", .. })));
}

#[test]
fn test_rejects_nan() {
    let result = BoundingBox::from_4_values(f64::NAN, 0.0, 10.0, 10.0);
    assert!(matches!(result, Err(BboxError::NonFinite { field: "west", .. })));
}

#[test]
fn test_accepts_whole_world() {
    let bbox = BoundingBox::from_4_values(-180.0, -90.0, 180.0, 90.0).unwrap();
    assert_eq!(bbox.width(), 360.0);
    assert_eq!(bbox.height(), 180.0);
}

#[test]
fn test_web_mercator_uses_meter_bounds() {
    let bbox =
        BoundingBox::with_crs(-10_363_000.0, 5_306_000.0, -10_361_000.0, 5_308_000.0, CrsCode::Epsg3857)
            .unwrap();
    assert_eq!(bbox.crs(), CrsCode::Epsg3857);

    // Degree bounds would reject these; meter bounds reject beyond the mercator extent.
    let too_far = BoundingBox::with_crs(-3.0e7, 0.0, 0.0, 1.0, CrsCode::Epsg3857);
    assert!(too_far.is_err());
}

// ============================================================================
// from_bbox_string tests
// ============================================================================

#[test]
fn test_parse_bbox_string() {
    let bbox = BoundingBox::from_bbox_string("-93.09, 42.96,-93.075,42.97", CrsCode::Epsg4326).unwrap();
    assert_eq!(bbox.west(), -93.09);
    assert_eq!(bbox.south(), 42.96);
    assert_eq!(bbox.east(), -93.075);
    assert_eq!(bbox.north(), 42.97);
}

#[test]
fn test_parse_bbox_string_wrong_count() {
    let result = BoundingBox::from_bbox_string("0,0,1", CrsCode::Epsg4326);
    assert!(matches!(result, Err(BboxError::InvalidFormat(_))));
}

#[test]
fn test_parse_bbox_string_bad_number() {
    let result = BoundingBox::from_bbox_string("0,zero,1,1", CrsCode::Epsg4326);
    assert!(matches!(result, Err(BboxError::InvalidNumber(ref s)) if s == "zero"));
}

// ============================================================================
// Buffering
// ============================================================================

#[test]
fn test_buffered_grows_by_twice_amount_and_keeps_center() {
    let boxes = [
        (-93.09, 42.96, -93.075, 42.97),
        (-100.0, 40.0, -99.0, 41.0),
        (10.0, -45.0, 12.5, -44.0),
        (-0.001, -0.001, 0.001, 0.001),
    ];

    for amount in [0.01, 0.5, 1e-6] {
        for (w, s, e, n) in boxes {
            let raw = BoundingBox::from_4_values(w, s, e, n).unwrap();
            let buf = raw.buffered(amount).unwrap();

            assert!(buf.width() > raw.width());
            assert!(buf.height() > raw.height());
            assert_approx_eq!(buf.width() - raw.width(), 2.0 * amount, 1e-9);
            assert_approx_eq!(buf.height() - raw.height(), 2.0 * amount, 1e-9);

            let (cx, cy) = raw.center();
            let (bx, by) = buf.center();
            assert_approx_eq!(cx, bx, 1e-9);
            assert_approx_eq!(cy, by, 1e-9);
            assert!(buf.contains(&raw));
        }
    }
}

#[test]
fn test_buffered_rejects_collapse() {
    let raw = BoundingBox::from_4_values(0.0, 0.0, 0.02, 1.0).unwrap();
    let result = raw.buffered(-0.01);
    assert!(matches!(result, Err(BboxError::Degenerate { axis: "x", .. })));
}

#[test]
fn test_buffered_rejects_leaving_world() {
    let raw = BoundingBox::from_4_values(179.995, 0.0, 180.0, 1.0).unwrap();
    assert!(raw.buffered(0.01).is_err());
}

#[test]
fn test_buffered_rejects_non_finite_amount() {
    let raw = BoundingBox::from_4_values(0.0, 0.0, 1.0, 1.0).unwrap();
    assert!(matches!(
        raw.buffered(f64::INFINITY),
        Err(BboxError::NonFinite { field: "buffer", .. })
    ));
}

// ============================================================================
// Cache keys
// ============================================================================

#[test]
fn test_cache_key_is_deterministic() {
    let bbox = BoundingBox::from_4_values(-93.10, 42.95, -93.08, 42.98).unwrap();
    let first = bbox.cache_key();
    for _ in 0..10 {
        assert_eq!(bbox.cache_key(), first);
    }
    let same = BoundingBox::from_4_values(-93.10, 42.95, -93.08, 42.98).unwrap();
    assert_eq!(same.cache_key(), first);
}

#[test]
fn test_cache_key_encodes_field_names() {
    let bbox = BoundingBox::from_4_values(-93.1, 42.95, -93.08, 42.98).unwrap();
    assert_eq!(
        bbox.cache_key(),
        "WestLongitude-93.1SouthLatitude42.95EastLongitude-93.08NorthLatitude42.98"
    );
}

#[test]
fn test_cache_key_differs_per_field() {
    let base = (-93.10, 42.95, -93.08, 42.98);
    let bbox = BoundingBox::from_4_values(base.0, base.1, base.2, base.3).unwrap();

    // Smallest representable nudge on each field in turn.
    let variants = [
        (base.0.next_up_compat(), base.1, base.2, base.3),
        (base.0, base.1.next_up_compat(), base.2, base.3),
        (base.0, base.1, base.2.next_up_compat(), base.3),
        (base.0, base.1, base.2, base.3.next_up_compat()),
    ];

    for (w, s, e, n) in variants {
        let other = BoundingBox::from_4_values(w, s, e, n).unwrap();
        assert_ne!(other.cache_key(), bbox.cache_key());
    }
}

#[test]
fn test_cache_key_is_filesystem_safe() {
    let bbox = BoundingBox::from_4_values(-93.10, 42.95, -93.08, 42.98).unwrap();
    let key = bbox.cache_key();
    assert!(key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.'));
}

#[test]
fn test_cache_key_distinguishes_crs() {
    let geo = BoundingBox::with_crs(0.0, 0.0, 1.0, 1.0, CrsCode::Epsg4326).unwrap();
    let merc = BoundingBox::with_crs(0.0, 0.0, 1.0, 1.0, CrsCode::Epsg3857).unwrap();
    assert_ne!(geo.cache_key(), merc.cache_key());
}

// ============================================================================
// Serde
// ============================================================================

#[test]
fn test_deserialize_validates() {
    let ok: BoundingBox =
        serde_json::from_str(r#"{"west":-93.1,"south":42.95,"east":-93.08,"north":42.98}"#).unwrap();
    assert_eq!(ok.crs(), CrsCode::Epsg4326);

    let bad = serde_json::from_str::<BoundingBox>(
        r#"{"west":-93.0,"south":42.95,"east":-93.08,"north":42.98}"#,
    );
    assert!(bad.is_err());
}

/// `f64::next_up` is not yet stable everywhere; step one ULP by hand.
trait NextUp {
    fn next_up_compat(self) -> f64;
}

impl NextUp for f64 {
    fn next_up_compat(self) -> f64 {
        let bits = self.to_bits();
        if self > 0.0 {
            f64::from_bits(bits + 1)
        } else {
            f64::from_bits(bits - 1)
        }
    }
}
