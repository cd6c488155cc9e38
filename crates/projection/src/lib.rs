//! Coordinate reference system transformations.
//!
//! Implements the spherical Web Mercator projection from scratch without
//! external dependencies, plus extent transforms built on it.

pub mod mercator;
pub mod transform;

pub use transform::{to_crs, to_geographic};
