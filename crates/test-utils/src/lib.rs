//! Shared test utilities for the raster-viewer workspace.
//!
//! This crate provides common testing infrastructure including:
//! - In-memory GeoTIFF writers
//! - Raster grid generators
//! - Common fixtures (bounds, GeoJSON collections)
//! - A tracing subscriber for tests
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
//! use test_utils::{geotiff::GeoTiffBuilder, fixtures};
//! ```

pub mod fixtures;
pub mod generators;
pub mod geotiff;

pub use fixtures::*;
pub use generators::*;

use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a test-friendly tracing subscriber once per process.
///
/// Respects `RUST_LOG`; defaults to `warn` so test output stays quiet.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
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

/// Assert that an RGBA pixel buffer has the given pixel at `(x, y)`.
#[macro_export]
macro_rules! assert_pixel {
    ($rgba:expr, $width:expr, ($x:expr, $y:expr), $expected:expr) => {{
        let idx = (($y) * ($width) + ($x)) * 4;
        let actual: [u8; 4] = [
            $rgba[idx],
            $rgba[idx + 1],
            $rgba[idx + 2],
            $rgba[idx + 3],
        ];
        let expected: [u8; 4] = $expected;
        assert_eq!(
            actual, expected,
            "pixel ({}, {}) mismatch",
            $x, $y
        );
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_assert_pixel() {
        let rgba = vec![0u8, 0, 0, 0, 255, 0, 0, 255];
        assert_pixel!(rgba, 2, (1, 0), [255, 0, 0, 255]);
        assert_pixel!(rgba, 2, (0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        super::init_tracing();
        super::init_tracing();
    }
}
