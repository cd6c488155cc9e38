//! Common types shared across the field-report crates.

pub mod bbox;
pub mod crs;
pub mod style;

pub use bbox::{BboxError, BboxResult, BoundingBox};
pub use crs::{CrsCode, CrsParseError};
pub use style::{Color, ColorParseError};
