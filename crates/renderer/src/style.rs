//! Named ramp catalog loaded from JSON.

use crate::ramp::{InvalidColorRamp, RampConfig, RampResolver};
use raster_common::ViewerResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Ramps keyed by name, as stored in a style file:
///
/// ```json
/// {
///   "version": "1",
///   "ramps": {
///     "cellTowerDensity": { "ranges": [0, 2, 5, 10, 25], "colors": ["#0000FF", ...] },
///     "viridis": ["#440154", "#3b528b", "#21918c", "#5ec962", "#fde725"]
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RampCatalog {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub ramps: BTreeMap<String, RampConfig>,
}

const BLUE_TO_RED: [&str; 5] = ["#0000FF", "#00FF00", "#FFFF00", "#FF7F00", "#FF0000"];

const PALETTES: &[(&str, [&str; 5])] = &[
    ("blueToRed", ["#2c7bb6", "#abd9e9", "#ffffbf", "#fdae61", "#d7191c"]),
    ("redToBlue", ["#d7191c", "#fdae61", "#ffffbf", "#abd9e9", "#2c7bb6"]),
    ("whiteToBlack", ["#ffffff", "#d9d9d9", "#bdbdbd", "#737373", "#252525"]),
    ("purpleToOrange", ["#7b3294", "#c2a5cf", "#f7f7f7", "#fdae61", "#e66101"]),
    ("greenToRed", ["#1a9641", "#a6d96a", "#ffffbf", "#fdae61", "#d7191c"]),
    ("blueToYellow", ["#0571b0", "#92c5de", "#f7f7f7", "#f4a582", "#ca0020"]),
    ("viridis", ["#440154", "#3b528b", "#21918c", "#5ec962", "#fde725"]),
    ("magma", ["#000004", "#51127c", "#b73779", "#fb8761", "#fcfdbf"]),
    ("plasma", ["#0d0887", "#6a00a8", "#b12a90", "#e16462", "#fca636"]),
    ("inferno", ["#000004", "#420a68", "#932667", "#dd513a", "#fca50a"]),
    ("spectral", ["#9e0142", "#f46d43", "#ffffbf", "#66c2a5", "#5e4fa2"]),
    ("rdYlGn", ["#d73027", "#fc8d59", "#ffffbf", "#91cf60", "#1a9850"]),
    ("rdYlBu", ["#d73027", "#fc8d59", "#ffffbf", "#91bfdb", "#4575b4"]),
];

impl RampCatalog {
    /// The dashboard's stock scales and palettes.
    pub fn builtin() -> Self {
        let mut ramps = BTreeMap::new();
        ramps.insert(
            "cellTowerDensity".to_string(),
            RampConfig::ranges(vec![0.0, 2.0, 5.0, 10.0, 25.0], BLUE_TO_RED),
        );
        ramps.insert(
            "populationDensity".to_string(),
            RampConfig::ranges(
                vec![0.0, 25.0, 50.0, 75.0, 100.0],
                ["#FFFFFF", "#CCCCCC", "#999999", "#666666", "#333333"],
            ),
        );
        ramps.insert(
            "socialVulnerability".to_string(),
            RampConfig::ranges(vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0], BLUE_TO_RED),
        );
        ramps.insert(
            "relativeWealth".to_string(),
            RampConfig::ranges(vec![0.1, 2.0, 4.0, 6.0, 8.0, 10.0], BLUE_TO_RED),
        );
        for (name, colors) in PALETTES {
            ramps.insert(name.to_string(), RampConfig::palette(*colors));
        }

        Self {
            version: Some("1".to_string()),
            ramps,
        }
    }

    /// Load catalog from JSON string
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Load catalog from file
    pub fn from_file(path: impl AsRef<Path>) -> ViewerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }

    pub fn get(&self, name: &str) -> Option<&RampConfig> {
        self.ramps.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ramps.keys().map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, ramp: RampConfig) {
        self.ramps.insert(name.into(), ramp);
    }

    /// Add `other`'s ramps, replacing same-named entries.
    pub fn merge(&mut self, other: RampCatalog) {
        self.ramps.extend(other.ramps);
    }

    /// Resolver for a named ramp; unknown names fall back to gray.
    pub fn resolver(&self, name: &str) -> RampResolver {
        match self.get(name) {
            Some(config) => RampResolver::new(config),
            None => {
                warn!(ramp = name, "Unknown color ramp, rendering with fallback gray");
                RampResolver::fallback()
            }
        }
    }

    /// Bounded ramps that fail validation. Palettes are not checked for
    /// bounds since they only feed quantile styling.
    pub fn validate(&self) -> Vec<(String, InvalidColorRamp)> {
        self.ramps
            .iter()
            .filter(|(_, cfg)| cfg.bounds().is_some() || cfg.colors().is_empty())
            .filter_map(|(name, cfg)| cfg.to_ramp().err().map(|e| (name.clone(), e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::Rgb;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = RampCatalog::builtin();
        assert!(catalog.validate().is_empty());
        assert_eq!(catalog.names().count(), 17);
        assert_eq!(catalog.get("viridis").map(|r| r.colors().len()), Some(5));
    }

    #[test]
    fn test_builtin_scale_lookup() {
        let resolver = RampCatalog::builtin().resolver("relativeWealth");
        assert_eq!(resolver.color_for(0.0), Rgb::new(0, 0, 255));
        assert_eq!(resolver.color_for(5.0), Rgb::new(255, 255, 0));
        assert_eq!(resolver.color_for(12.0), Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_unknown_ramp_is_gray() {
        assert!(RampCatalog::builtin().resolver("nope").is_fallback());
    }
}
