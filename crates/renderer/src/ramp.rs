//! Piecewise color ramps.
//!
//! A ramp is an ordered list of lower-inclusive bounds with one color per
//! class. `bounds[i]` opens the class painted with `colors[i]`:
//!
//! ```text
//! bounds:  0      2      5      10     25
//! colors:  blue | green| yellow|orange| red ...
//! ```
//!
//! Values below `bounds[1]` take `colors[0]` and values at or above the last
//! class bound take the last color. `bounds` may carry one extra trailing
//! entry (an explicit upper bound); it does not change the lookup.
//!
//! Bad configuration never fails a render. A ramp that does not validate
//! resolves every value to [`FALLBACK_GRAY`], and an unparseable hex entry
//! turns only that class gray.

use crate::quantile::format_legend_value;
use raster_common::color::parse_hex;
use raster_common::{hex_to_rgb, Rgb, FALLBACK_GRAY};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Why a ramp configuration could not be turned into a [`ColorRamp`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidColorRamp {
    #[error("color ramp has no colors")]
    NoColors,

    #[error("color ramp needs at least 2 bounds, found {0}")]
    TooFewBounds(usize),

    #[error("{bounds} bounds cannot describe {colors} colors")]
    LengthMismatch { bounds: usize, colors: usize },

    #[error("bound {index} is not finite")]
    NonFiniteBound { index: usize },

    #[error("bounds must be strictly increasing (index {index})")]
    NotIncreasing { index: usize },

    #[error("ramp configuration is not a ramp object: {0}")]
    Shape(String),
}

/// A validated ramp: strictly increasing finite bounds and at least one color.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRamp {
    bounds: Vec<f64>,
    colors: Vec<Rgb>,
}

impl ColorRamp {
    pub fn new(bounds: Vec<f64>, colors: Vec<Rgb>) -> Result<Self, InvalidColorRamp> {
        if colors.is_empty() {
            return Err(InvalidColorRamp::NoColors);
        }
        if bounds.len() < 2 {
            return Err(InvalidColorRamp::TooFewBounds(bounds.len()));
        }
        if bounds.len() != colors.len() && bounds.len() != colors.len() + 1 {
            return Err(InvalidColorRamp::LengthMismatch {
                bounds: bounds.len(),
                colors: colors.len(),
            });
        }
        if let Some(index) = bounds.iter().position(|b| !b.is_finite()) {
            return Err(InvalidColorRamp::NonFiniteBound { index });
        }
        if let Some(index) = bounds.windows(2).position(|w| w[0] >= w[1]) {
            return Err(InvalidColorRamp::NotIncreasing { index: index + 1 });
        }

        Ok(Self { bounds, colors })
    }

    /// Build from hex strings. Entries that are not valid hex become gray.
    pub fn from_hex<S: AsRef<str>>(bounds: Vec<f64>, colors: &[S]) -> Result<Self, InvalidColorRamp> {
        let colors = colors.iter().map(|c| hex_to_rgb(c.as_ref())).collect();
        Self::new(bounds, colors)
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    /// Color of the class containing `value`.
    ///
    /// NaN compares false against every bound and lands on the last color.
    pub fn color_for(&self, value: f64) -> Rgb {
        let last = self.colors.len() - 1;
        if value.is_nan() {
            return self.colors[last];
        }
        let class_bounds = &self.bounds[..self.colors.len()];
        let above = class_bounds.partition_point(|&b| b <= value);
        self.colors[above.saturating_sub(1).min(last)]
    }

    /// Index of the class containing `value`, `None` for NaN.
    pub fn class_of(&self, value: f64) -> Option<usize> {
        if value.is_nan() {
            return None;
        }
        let class_bounds = &self.bounds[..self.colors.len()];
        let above = class_bounds.partition_point(|&b| b <= value);
        Some(above.saturating_sub(1).min(self.colors.len() - 1))
    }

    /// One legend label per class: `"lo - hi"`, or `"lo+"` for an
    /// open-ended last class.
    pub fn legend_labels(&self) -> Vec<String> {
        (0..self.colors.len())
            .map(|i| match self.bounds.get(i + 1) {
                Some(hi) => format!(
                    "{} - {}",
                    format_legend_value(self.bounds[i]),
                    format_legend_value(*hi)
                ),
                None => format!("{}+", format_legend_value(self.bounds[i])),
            })
            .collect()
    }
}

/// Ramp configuration as supplied by callers.
///
/// Accepts the three shapes found in dashboard configs:
///
/// ```json
/// { "ranges": [0, 2, 5, 10, 25], "colors": ["#0000FF", "#00FF00", ...] }
/// { "breakpoints": [0, 0.5, 1], "colors": ["#fff", "#000"] }
/// ["#2c7bb6", "#abd9e9", "#ffffbf", "#fdae61", "#d7191c"]
/// ```
///
/// The bare array carries no bounds and is only meaningful for quantile
/// styling; resolved as a fixed ramp it falls back to gray.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RampConfig {
    Ranges { ranges: Vec<f64>, colors: Vec<String> },
    Breakpoints { breakpoints: Vec<f64>, colors: Vec<String> },
    Palette(Vec<String>),
}

impl RampConfig {
    pub fn ranges<S: Into<String>>(ranges: Vec<f64>, colors: impl IntoIterator<Item = S>) -> Self {
        RampConfig::Ranges {
            ranges,
            colors: colors.into_iter().map(Into::into).collect(),
        }
    }

    pub fn palette<S: Into<String>>(colors: impl IntoIterator<Item = S>) -> Self {
        RampConfig::Palette(colors.into_iter().map(Into::into).collect())
    }

    /// Equal-width classes spanning `[min, max]`, one per color.
    ///
    /// Produces `colors.len() + 1` bounds. A collapsed range (`max <= min`)
    /// is widened to one unit so a constant raster still gets the first color.
    pub fn equal_interval<S: Into<String>>(
        min: f64,
        max: f64,
        colors: impl IntoIterator<Item = S>,
    ) -> Self {
        let colors: Vec<String> = colors.into_iter().map(Into::into).collect();
        let max = if max > min { max } else { min + 1.0 };
        let steps = colors.len().max(1);
        let step = (max - min) / steps as f64;
        let ranges = (0..=steps)
            .map(|i| if i == steps { max } else { min + step * i as f64 })
            .collect();
        RampConfig::Ranges { ranges, colors }
    }

    pub fn colors(&self) -> &[String] {
        match self {
            RampConfig::Ranges { colors, .. } | RampConfig::Breakpoints { colors, .. } => colors,
            RampConfig::Palette(colors) => colors,
        }
    }

    /// Class bounds, `None` for a bare palette.
    pub fn bounds(&self) -> Option<&[f64]> {
        match self {
            RampConfig::Ranges { ranges, .. } => Some(ranges),
            RampConfig::Breakpoints { breakpoints, .. } => Some(breakpoints),
            RampConfig::Palette(_) => None,
        }
    }

    /// Palette colors as RGB, bad entries gray.
    pub fn rgb_colors(&self) -> Vec<Rgb> {
        self.colors().iter().map(|c| hex_to_rgb(c)).collect()
    }

    /// Hex entries that do not parse.
    pub fn invalid_colors(&self) -> Vec<&str> {
        self.colors()
            .iter()
            .filter(|c| parse_hex(c).is_none())
            .map(String::as_str)
            .collect()
    }

    pub fn to_ramp(&self) -> Result<ColorRamp, InvalidColorRamp> {
        match self.bounds() {
            Some(bounds) => ColorRamp::from_hex(bounds.to_vec(), self.colors()),
            None if self.colors().is_empty() => Err(InvalidColorRamp::NoColors),
            None => Err(InvalidColorRamp::TooFewBounds(0)),
        }
    }
}

/// A ramp ready for per-pixel lookups, or the gray fallback.
///
/// Built once per render at the configuration boundary, which is also where
/// malformed configuration is logged.
#[derive(Debug, Clone, PartialEq)]
pub struct RampResolver {
    ramp: Option<ColorRamp>,
}

impl RampResolver {
    pub fn new(config: &RampConfig) -> Self {
        let invalid = config.invalid_colors();
        if !invalid.is_empty() {
            warn!(colors = ?invalid, "Invalid hex colors in ramp, using gray for those classes");
        }
        match config.to_ramp() {
            Ok(ramp) => Self { ramp: Some(ramp) },
            Err(e) => {
                warn!(error = %e, "Malformed color ramp, rendering with fallback gray");
                Self::fallback()
            }
        }
    }

    /// Resolve an untyped JSON value. Anything that is not one of the
    /// accepted shapes resolves to the gray fallback.
    pub fn from_value(value: &serde_json::Value) -> Self {
        match serde_json::from_value::<RampConfig>(value.clone()) {
            Ok(config) => Self::new(&config),
            Err(e) => {
                let err = InvalidColorRamp::Shape(e.to_string());
                warn!(error = %err, "Malformed color ramp, rendering with fallback gray");
                Self::fallback()
            }
        }
    }

    pub fn fallback() -> Self {
        Self { ramp: None }
    }

    pub fn is_fallback(&self) -> bool {
        self.ramp.is_none()
    }

    pub fn ramp(&self) -> Option<&ColorRamp> {
        self.ramp.as_ref()
    }

    #[inline]
    pub fn color_for(&self, value: f64) -> Rgb {
        match &self.ramp {
            Some(ramp) => ramp.color_for(value),
            None => FALLBACK_GRAY,
        }
    }
}

impl From<ColorRamp> for RampResolver {
    fn from(ramp: ColorRamp) -> Self {
        Self { ramp: Some(ramp) }
    }
}

/// Color for `value` under `config`, gray when the config is malformed.
pub fn color_for(value: f64, config: &RampConfig) -> Rgb {
    config
        .to_ramp()
        .map(|ramp| ramp.color_for(value))
        .unwrap_or(FALLBACK_GRAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tower_density() -> RampConfig {
        RampConfig::ranges(
            vec![0.0, 2.0, 5.0, 10.0, 25.0],
            ["#0000FF", "#00FF00", "#FFFF00", "#FF7F00", "#FF0000"],
        )
    }

    #[test]
    fn test_legend_labels() {
        let open = tower_density().to_ramp().unwrap();
        assert_eq!(
            open.legend_labels(),
            vec!["0 - 2", "2 - 5", "5 - 10", "10 - 25", "25+"]
        );
        let closed = RampConfig::equal_interval(0.0, 2000.0, ["#000", "#fff"])
            .to_ramp()
            .unwrap();
        assert_eq!(closed.legend_labels(), vec!["0 - 1,000", "1,000 - 2,000"]);
    }

    #[test]
    fn test_color_for_classes() {
        let cfg = tower_density();
        assert_eq!(color_for(0.0, &cfg), Rgb::new(0, 0, 255));
        assert_eq!(color_for(1.99, &cfg), Rgb::new(0, 0, 255));
        assert_eq!(color_for(2.0, &cfg), Rgb::new(0, 255, 0));
        assert_eq!(color_for(9.5, &cfg), Rgb::new(255, 255, 0));
        assert_eq!(color_for(10.0, &cfg), Rgb::new(255, 127, 0));
        assert_eq!(color_for(25.0, &cfg), Rgb::new(255, 0, 0));
        assert_eq!(color_for(1e9, &cfg), Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_below_first_bound_takes_first_color() {
        let cfg = tower_density();
        assert_eq!(color_for(-50.0, &cfg), Rgb::new(0, 0, 255));
        assert_eq!(color_for(f64::NEG_INFINITY, &cfg), Rgb::new(0, 0, 255));
    }

    #[test]
    fn test_trailing_upper_bound_form() {
        let cfg = RampConfig::ranges(vec![0.0, 0.5, 1.0], ["#000000", "#ffffff"]);
        assert_eq!(color_for(0.25, &cfg), Rgb::new(0, 0, 0));
        assert_eq!(color_for(0.5, &cfg), Rgb::new(255, 255, 255));
        assert_eq!(color_for(1.0, &cfg), Rgb::new(255, 255, 255));
        assert_eq!(color_for(7.0, &cfg), Rgb::new(255, 255, 255));
    }

    #[test]
    fn test_nan_takes_last_color() {
        let ramp = tower_density().to_ramp().unwrap();
        assert_eq!(ramp.color_for(f64::NAN), Rgb::new(255, 0, 0));
        assert_eq!(ramp.class_of(f64::NAN), None);
    }

    #[test]
    fn test_malformed_ramps_are_gray() {
        let too_short = RampConfig::ranges(vec![0.0], ["#ff0000"]);
        let no_colors = RampConfig::ranges(vec![0.0, 1.0], Vec::<String>::new());
        let unsorted = RampConfig::ranges(vec![0.0, 5.0, 2.0], ["#f00", "#0f0", "#00f"]);
        let mismatch = RampConfig::ranges(vec![0.0, 1.0, 2.0, 3.0, 4.0], ["#f00", "#0f0"]);
        let infinite = RampConfig::ranges(vec![0.0, f64::INFINITY], ["#f00", "#0f0"]);
        for cfg in [too_short, no_colors, unsorted, mismatch, infinite] {
            assert_eq!(color_for(1.0, &cfg), FALLBACK_GRAY, "{:?}", cfg);
            assert!(RampResolver::new(&cfg).is_fallback());
        }
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(
            ColorRamp::new(vec![0.0, 1.0], vec![]),
            Err(InvalidColorRamp::NoColors)
        );
        assert_eq!(
            ColorRamp::new(vec![0.0, 0.0], vec![FALLBACK_GRAY; 2]),
            Err(InvalidColorRamp::NotIncreasing { index: 1 })
        );
        assert_eq!(
            ColorRamp::new(vec![0.0, f64::NAN], vec![FALLBACK_GRAY; 2]),
            Err(InvalidColorRamp::NonFiniteBound { index: 1 })
        );
    }

    #[test]
    fn test_bad_hex_entry_is_gray_only_for_its_class() {
        let cfg = RampConfig::ranges(vec![0.0, 1.0], ["#ff0000", "oops"]);
        let resolver = RampResolver::new(&cfg);
        assert!(!resolver.is_fallback());
        assert_eq!(resolver.color_for(0.5), Rgb::new(255, 0, 0));
        assert_eq!(resolver.color_for(1.5), FALLBACK_GRAY);
        assert_eq!(cfg.invalid_colors(), vec!["oops"]);
    }

    #[test]
    fn test_config_shapes_deserialize() {
        let ranges: RampConfig =
            serde_json::from_str(r##"{"ranges":[0,1],"colors":["#000","#fff"]}"##).unwrap();
        assert!(matches!(ranges, RampConfig::Ranges { .. }));

        let bp: RampConfig =
            serde_json::from_str(r##"{"breakpoints":[0,1],"colors":["#000","#fff"]}"##).unwrap();
        assert!(matches!(bp, RampConfig::Breakpoints { .. }));
        assert_eq!(color_for(0.7, &bp), Rgb::new(0, 0, 0));

        let palette: RampConfig = serde_json::from_str(r##"["#000","#fff"]"##).unwrap();
        assert_eq!(palette.bounds(), None);
        assert_eq!(color_for(0.7, &palette), FALLBACK_GRAY);
    }

    #[test]
    fn test_from_value_degrades() {
        let missing_colors = serde_json::json!({ "ranges": [0, 1, 2] });
        assert!(RampResolver::from_value(&missing_colors).is_fallback());
        let not_array = serde_json::json!({ "ranges": "0,1", "colors": "#fff" });
        assert!(RampResolver::from_value(&not_array).is_fallback());
        assert!(RampResolver::from_value(&serde_json::Value::Null).is_fallback());
    }

    #[test]
    fn test_equal_interval() {
        let cfg = RampConfig::equal_interval(0.0, 100.0, ["#a", "#b", "#c", "#d", "#e"]);
        assert_eq!(cfg.bounds(), Some(&[0.0, 20.0, 40.0, 60.0, 80.0, 100.0][..]));

        let flat = RampConfig::equal_interval(3.0, 3.0, ["#000", "#fff"]);
        assert_eq!(flat.bounds(), Some(&[3.0, 3.5, 4.0][..]));
        assert_eq!(color_for(3.0, &flat), Rgb::new(0, 0, 0));
    }
}
