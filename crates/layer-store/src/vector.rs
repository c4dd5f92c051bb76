//! GeoJSON vector layers styled by a numeric attribute.
//!
//! Features are colored by quantile class of the selected property. Values
//! are coerced the way the map UI reads them: JSON numbers and numeric
//! strings count, everything else is left unclassified and drawn in the
//! fallback color.

use crate::error::{StoreError, StoreResult};
use raster_common::{Rgb, FALLBACK_GRAY};
use renderer::quantile::{ClassificationError, QuantileClassifier};
use renderer::ramp::RampConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Stroke and fill used when no attribute is selected.
pub const DEFAULT_FEATURE_COLOR: Rgb = Rgb::new(0x33, 0x88, 0xff);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub geometry: Option<Value>,
}

impl Feature {
    /// Style key: the feature id, or `#<index>` for features without one.
    pub fn key(&self, index: usize) -> String {
        match &self.id {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => format!("#{}", index),
        }
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.as_ref()?.get(name)
    }

    /// Numeric value of `name`, if it has one.
    pub fn numeric(&self, name: &str) -> Option<f64> {
        self.property(name).and_then(numeric_value)
    }

    /// Tooltip for the selected property.
    pub fn tooltip(&self, property: Option<&str>) -> String {
        if self.properties.is_none() {
            return "No properties available".to_string();
        }
        let Some(property) = property else {
            return "Select an attribute to view values".to_string();
        };
        match self.property(property) {
            None => format!("No data for {}", property),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) => format!("{}: {}", property, format_attribute_value(v)),
                None => format!("{}: {}", property, n),
            },
            Some(Value::String(s)) => format!("{}: {}", property, s),
            Some(other) => format!("{}: {}", property, other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "feature_collection_type")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

fn feature_collection_type() -> String {
    "FeatureCollection".to_string()
}

impl FeatureCollection {
    pub fn from_slice(bytes: &[u8]) -> StoreResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::InvalidGeoJson(e.to_string()))
    }

    pub fn from_value(value: Value) -> StoreResult<Self> {
        serde_json::from_value(value).map_err(|e| StoreError::InvalidGeoJson(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Property names of the first feature.
    pub fn property_fields(&self) -> Vec<String> {
        self.features
            .first()
            .and_then(|f| f.properties.as_ref())
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Unique style key per feature, in collection order.
    ///
    /// A feature repeating an earlier key is keyed by its position instead,
    /// so every feature keeps its own style.
    pub fn feature_keys(&self) -> Vec<String> {
        let mut seen = HashSet::with_capacity(self.features.len());
        self.features
            .iter()
            .enumerate()
            .map(|(i, feature)| {
                let key = feature.key(i);
                if seen.insert(key.clone()) {
                    return key;
                }
                warn!(key = %key, index = i, "Duplicate feature id, keying by position");
                let mut fallback = format!("#{}", i);
                let mut n = 1;
                while !seen.insert(fallback.clone()) {
                    fallback = format!("#{}.{}", i, n);
                    n += 1;
                }
                fallback
            })
            .collect()
    }

    /// Numeric values of `property` across all features, skipping the rest.
    pub fn numeric_values(&self, property: &str) -> Vec<f64> {
        self.features.iter().filter_map(|f| f.numeric(property)).collect()
    }
}

/// Coerce a property value to a number.
///
/// Numbers pass through; strings are trimmed and parsed. Empty strings,
/// booleans and non-finite results are not numeric.
pub fn numeric_value(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Up to two decimals with thousands separators, as shown in tooltips.
pub fn format_attribute_value(value: f64) -> String {
    let fixed = format!("{:.2}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    let (sign, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) if rest != "0" => ("-", rest),
        Some(rest) => ("", rest),
        None => ("", trimmed),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut out = String::from(sign);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Fill of one feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureStyle {
    pub value: Option<f64>,
    pub class: Option<usize>,
    pub fill: Rgb,
}

/// Per-feature fills for one property, plus its legend.
#[derive(Debug, Clone)]
pub struct AttributeStyle {
    property: String,
    colors: Vec<Rgb>,
    classifier: Option<QuantileClassifier>,
    keys: Vec<String>,
    styles: HashMap<String, FeatureStyle>,
}

impl AttributeStyle {
    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn classifier(&self) -> Option<&QuantileClassifier> {
        self.classifier.as_ref()
    }

    /// No feature had a numeric value for the property.
    pub fn has_no_data(&self) -> bool {
        self.classifier.is_none()
    }

    pub fn get(&self, key: &str) -> Option<&FeatureStyle> {
        self.styles.get(key)
    }

    pub fn fill_for(&self, key: &str) -> Rgb {
        self.styles.get(key).map(|s| s.fill).unwrap_or(FALLBACK_GRAY)
    }

    /// Key the feature at `index` was styled under.
    pub fn key_at(&self, index: usize) -> Option<&str> {
        self.keys.get(index).map(String::as_str)
    }

    pub fn style_at(&self, index: usize) -> Option<&FeatureStyle> {
        self.key_at(index).and_then(|key| self.styles.get(key))
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// `(color, "start - end")` per class; empty when there is no data.
    pub fn legend(&self) -> Vec<(Rgb, String)> {
        match &self.classifier {
            Some(c) => self.colors.iter().copied().zip(c.legend_labels()).collect(),
            None => Vec::new(),
        }
    }
}

/// Quantile-classify `property` over the collection and color each feature.
///
/// One class per palette color. With no numeric values the style reports
/// no data and every feature gets the fallback color.
pub fn style_by_attribute(
    collection: &FeatureCollection,
    property: &str,
    palette: &[Rgb],
) -> AttributeStyle {
    let values = collection.numeric_values(property);
    let classifier = match QuantileClassifier::new(values, palette.len()) {
        Ok(c) => Some(c),
        Err(ClassificationError::NoData) => {
            debug!(property = %property, "No numeric values to classify");
            None
        }
        Err(e) => {
            warn!(property = %property, error = %e, "Cannot classify attribute");
            None
        }
    };

    let keys = collection.feature_keys();
    let styles = collection
        .features
        .iter()
        .zip(&keys)
        .map(|(feature, key)| {
            let value = feature.numeric(property);
            let class = value.zip(classifier.as_ref()).and_then(|(v, c)| c.classify(v));
            let fill = class
                .and_then(|c| palette.get(c))
                .copied()
                .unwrap_or(FALLBACK_GRAY);
            (key.clone(), FeatureStyle { value, class, fill })
        })
        .collect();

    AttributeStyle {
        property: property.to_string(),
        colors: palette.to_vec(),
        classifier,
        keys,
        styles,
    }
}

/// [`style_by_attribute`] with the colors of a ramp configuration.
pub fn style_with_ramp(
    collection: &FeatureCollection,
    property: &str,
    ramp: &RampConfig,
) -> AttributeStyle {
    let invalid = ramp.invalid_colors();
    if !invalid.is_empty() {
        warn!(property = %property, invalid = ?invalid, "Ramp has invalid colors, using gray for them");
    }
    style_by_attribute(collection, property, &ramp.rgb_colors())
}

/// A loaded vector layer and its current attribute selection.
#[derive(Debug, Clone)]
pub struct VectorLayer {
    collection: Arc<FeatureCollection>,
    style: Option<AttributeStyle>,
}

impl VectorLayer {
    pub fn new(collection: Arc<FeatureCollection>) -> Self {
        Self {
            collection,
            style: None,
        }
    }

    pub fn collection(&self) -> &Arc<FeatureCollection> {
        &self.collection
    }

    pub fn property_fields(&self) -> Vec<String> {
        self.collection.property_fields()
    }

    pub fn selected_property(&self) -> Option<&str> {
        self.style.as_ref().map(AttributeStyle::property)
    }

    pub fn style(&self) -> Option<&AttributeStyle> {
        self.style.as_ref()
    }

    /// Style the features by `property` with the colors of `ramp`.
    pub fn select(&mut self, property: &str, ramp: &RampConfig) -> &AttributeStyle {
        self.style.insert(style_with_ramp(&self.collection, property, ramp))
    }

    pub fn clear_selection(&mut self) {
        self.style = None;
    }

    /// Fill for the feature with `key`; the default blue until a property
    /// is selected.
    pub fn fill_for(&self, key: &str) -> Rgb {
        match &self.style {
            Some(style) => style.fill_for(key),
            None => DEFAULT_FEATURE_COLOR,
        }
    }

    pub fn tooltip(&self, index: usize) -> Option<String> {
        self.collection
            .features
            .get(index)
            .map(|f| f.tooltip(self.selected_property()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(numeric_value(&json!(3)), Some(3.0));
        assert_eq!(numeric_value(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(numeric_value(&json!("n/a")), None);
        assert_eq!(numeric_value(&json!("")), None);
        assert_eq!(numeric_value(&json!(true)), None);
        assert_eq!(numeric_value(&json!(null)), None);
        assert_eq!(numeric_value(&json!("inf")), None);
    }

    #[test]
    fn test_feature_key_falls_back_to_index() {
        let with_id: Feature = serde_json::from_value(json!({ "id": 7, "properties": {} })).unwrap();
        let without: Feature = serde_json::from_value(json!({ "properties": {} })).unwrap();
        assert_eq!(with_id.key(0), "7");
        assert_eq!(without.key(3), "#3");
    }

    #[test]
    fn test_colliding_ids_keep_separate_styles() {
        let collection = FeatureCollection::from_value(json!({
            "type": "FeatureCollection",
            "features": [
                { "id": "3", "properties": { "v": 1 } },
                { "id": "a", "properties": { "v": 2 } },
                { "id": "a", "properties": { "v": 3 } },
                { "properties": { "v": 4 } },
            ]
        }))
        .unwrap();
        assert_eq!(collection.feature_keys(), vec!["3", "a", "#2", "#3"]);

        let palette = [Rgb::new(0, 0, 0), Rgb::new(255, 255, 255)];
        let style = style_by_attribute(&collection, "v", &palette);
        assert_eq!(style.len(), 4);
        let values: Vec<_> = (0..4).map(|i| style.style_at(i).and_then(|s| s.value)).collect();
        assert_eq!(values, vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
        assert_eq!(style.key_at(3), Some("#3"));
        assert_eq!(style.get("3").and_then(|s| s.value), Some(1.0));
        assert!(style.style_at(4).is_none());
    }

    #[test]
    fn test_format_attribute_value() {
        assert_eq!(format_attribute_value(1234567.891), "1,234,567.89");
        assert_eq!(format_attribute_value(0.5), "0.5");
        assert_eq!(format_attribute_value(12.0), "12");
        assert_eq!(format_attribute_value(-1500.25), "-1,500.25");
        assert_eq!(format_attribute_value(-0.001), "0");
    }

    #[test]
    fn test_tooltip_texts() {
        let feature: Feature = serde_json::from_value(json!({
            "properties": { "density": 1234.5, "name": "Nairobi" }
        }))
        .unwrap();
        assert_eq!(feature.tooltip(None), "Select an attribute to view values");
        assert_eq!(feature.tooltip(Some("density")), "density: 1,234.5");
        assert_eq!(feature.tooltip(Some("name")), "name: Nairobi");
        assert_eq!(feature.tooltip(Some("score")), "No data for score");

        let bare: Feature = serde_json::from_value(json!({ "geometry": null })).unwrap();
        assert_eq!(bare.tooltip(Some("density")), "No properties available");
    }

    #[test]
    fn test_zero_colors_is_no_data() {
        let fc = FeatureCollection::from_value(json!({
            "type": "FeatureCollection",
            "features": [{ "properties": { "v": 1 } }]
        }))
        .unwrap();
        let style = style_by_attribute(&fc, "v", &[]);
        assert!(style.has_no_data());
        assert_eq!(style.fill_for("0"), FALLBACK_GRAY);
    }
}
