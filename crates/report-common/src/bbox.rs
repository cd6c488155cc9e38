//! Bounding box types and operations.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crs::CrsCode;

/// Result type alias for bounding box construction.
pub type BboxResult<T> = Result<T, BboxError>;

/// A validated geographic or projected extent.
///
/// Edges are stored as west/south/east/north. For EPSG:4326 they are degrees,
/// for EPSG:3857 meters. Every constructor enforces `west < east` and
/// `south < north` and that all edges lie inside the CRS's valid bounds, so a
/// `BoundingBox` that exists is never degenerate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBoundingBox")]
pub struct BoundingBox {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
    crs: CrsCode,
}

#[derive(Deserialize)]
struct RawBoundingBox {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
    #[serde(default)]
    crs: CrsCode,
}

impl TryFrom<RawBoundingBox> for BoundingBox {
    type Error = BboxError;

    fn try_from(raw: RawBoundingBox) -> Result<Self, Self::Error> {
        BoundingBox::with_crs(raw.west, raw.south, raw.east, raw.north, raw.crs)
    }
}

impl BoundingBox {
    /// Validating constructor for an EPSG:4326 extent.
    pub fn from_4_values(west: f64, south: f64, east: f64, north: f64) -> BboxResult<Self> {
        Self::with_crs(west, south, east, north, CrsCode::Epsg4326)
    }

    /// Validating constructor for an extent in an explicit CRS.
    pub fn with_crs(
        west: f64,
        south: f64,
        east: f64,
        north: f64,
        crs: CrsCode,
    ) -> BboxResult<Self> {
        for (field, value) in [
            ("west", west),
            ("south", south),
            ("east", east),
            ("north", north),
        ] {
            if !value.is_finite() {
                return Err(BboxError::NonFinite { field, value });
            }
        }

        if west >= east {
            return Err(BboxError::Degenerate {
                axis: "x",
                min: west,
                max: east,
            });
        }
        if south >= north {
            return Err(BboxError::Degenerate {
                axis: "y",
                min: south,
                max: north,
            });
        }

        let (min_x, min_y, max_x, max_y) = crs.valid_bounds();
        for (field, value, lo, hi) in [
            ("west", west, min_x, max_x),
            ("east", east, min_x, max_x),
            ("south", south, min_y, max_y),
            ("north", north, min_y, max_y),
        ] {
            if value < lo || value > hi {
                return Err(BboxError::OutOfRange {
                    field,
                    value,
                    min: lo,
                    max: hi,
                    crs,
                });
            }
        }

        Ok(Self {
            west,
            south,
            east,
            north,
            crs,
        })
    }

    /// Parse a comma-separated "west,south,east,north" string.
    pub fn from_bbox_string(s: &str, crs: CrsCode) -> BboxResult<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| BboxError::InvalidNumber(part.to_string()))?;
        }

        Self::with_crs(values[0], values[1], values[2], values[3], crs)
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    pub fn crs(&self) -> CrsCode {
        self.crs
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Center point as `(x, y)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.west + self.east) / 2.0,
            (self.south + self.north) / 2.0,
        )
    }

    /// Returns a copy expanded outward on all four edges by `amount`.
    ///
    /// A negative amount shrinks the box; if that collapses either axis, or
    /// the grown box leaves the CRS bounds, the call fails.
    pub fn buffered(&self, amount: f64) -> BboxResult<Self> {
        if !amount.is_finite() {
            return Err(BboxError::NonFinite {
                field: "buffer",
                value: amount,
            });
        }

        Self::with_crs(
            self.west - amount,
            self.south - amount,
            self.east + amount,
            self.north + amount,
            self.crs,
        )
    }

    /// Corner coordinates in upper-left / lower-right order:
    /// `[west, north, east, south]`.
    pub fn upper_left_lower_right(&self) -> [f64; 4] {
        [self.west, self.north, self.east, self.south]
    }

    /// Check if `other` lies entirely within this bbox.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.crs == other.crs
            && other.west >= self.west
            && other.east <= self.east
            && other.south >= self.south
            && other.north <= self.north
    }

    /// Deterministic, file-system-safe key for this extent.
    ///
    /// Each edge name is concatenated with its shortest round-trip decimal
    /// form, so distinct boxes never share a key and the same box always
    /// maps to the same one.
    pub fn cache_key(&self) -> String {
        // +0.0 folds -0.0 into 0.0 so equal boxes format identically
        let mut key = format!(
            "WestLongitude{}SouthLatitude{}EastLongitude{}NorthLatitude{}",
            self.west + 0.0,
            self.south + 0.0,
            self.east + 0.0,
            self.north + 0.0
        );
        if self.crs != CrsCode::Epsg4326 {
            key.push_str(&format!("EPSG{}", self.crs.epsg()));
        }
        key
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}] ({})",
            self.west, self.south, self.east, self.north, self.crs
        )
    }
}

/// Validation failures for bounding boxes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BboxError {
    #[error("Invalid bbox format: {0}. Expected 'west,south,east,north'")]
    InvalidFormat(String),

    #[error("Invalid number in bbox: {0}")]
    InvalidNumber(String),

    #[error("Non-finite value for {field}: {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("Degenerate bbox on {axis} axis: min {min} must be less than max {max}")]
    Degenerate { axis: &'static str, min: f64, max: f64 },

    #[error("{field} = {value} is outside [{min}, {max}] for {crs}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
        crs: CrsCode,
    },
}
