//! Shared test utilities for the field-reports workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Temporary directory helpers
//! - Imagery metadata fixtures
//! - A scriptable stand-in for external raster tools
//! - Floating point assertions
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_approx_eq, fixtures};
//! ```

pub mod fixtures;
pub mod paths;
#[cfg(unix)]
pub mod stub_tool;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use paths::*;
#[cfg(unix)]
pub use stub_tool::{StubBehavior, StubTool};

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(bbox.west(), -93.10, 1e-9);
/// assert_approx_eq!(x_meters, -20_037_508.34, 0.01);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
