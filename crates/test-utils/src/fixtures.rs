//! Common test fixtures.

use serde_json::{json, Value};

/// Common bounding box definitions for testing, as `(west, south, east, north)`.
pub mod bbox {
    /// Global bounding box (-180 to 180, -90 to 90)
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// Kenya, a typical national-scale coverage raster
    pub const KENYA: (f64, f64, f64, f64) = (33.9, -4.7, 41.9, 5.0);

    /// A one-degree square around the origin quadrant
    pub const UNIT: (f64, f64, f64, f64) = (0.0, 0.0, 1.0, 1.0);

    /// Invalid bbox (min > max)
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 10.0, 5.0, 5.0);
}

/// Converts a fixture tuple into a [`raster_common::BoundingBox`].
pub fn bounds(t: (f64, f64, f64, f64)) -> raster_common::BoundingBox {
    raster_common::BoundingBox::new(t.0, t.1, t.2, t.3)
}

/// Polygon collection whose features carry a numeric `density` property,
/// a string-typed numeric `score` and a non-numeric `name`.
pub fn district_collection() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [
            feature("north", 2.0, "0.1", 0.0),
            feature("east", 8.0, "0.5", 1.0),
            feature("south", 15.0, "0.7", 2.0),
            feature("west", 40.0, "n/a", 3.0),
        ]
    })
}

fn feature(name: &str, density: f64, score: &str, offset: f64) -> Value {
    json!({
        "type": "Feature",
        "id": name,
        "properties": {
            "name": name,
            "density": density,
            "score": score,
        },
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [offset, 0.0], [offset + 1.0, 0.0], [offset + 1.0, 1.0], [offset, 1.0], [offset, 0.0]
            ]]
        }
    })
}

/// A collection with no features.
pub fn empty_collection() -> Value {
    json!({ "type": "FeatureCollection", "features": [] })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_district_collection_shape() {
        let fc = district_collection();
        assert_eq!(fc["features"].as_array().map(Vec::len), Some(4));
        assert_eq!(fc["features"][0]["properties"]["density"], 2.0);
    }

    #[test]
    fn test_bounds_fixture() {
        assert!(bounds(bbox::KENYA).is_valid());
        assert!(!bounds(bbox::INVALID).is_valid());
    }
}
