//! Request field schema.
//!
//! Which keys a request must carry, which ones fall back to defaults, and how
//! each maps onto coordinates or a model feature, written down as data and
//! checked in one pass before any feature vector is built.

use crate::error::{AppError, Result};
use crate::ml::{Feature, FeatureVector, FEATURE_COUNT};
use serde_json::{Map, Value};

/// Where a request field ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTarget {
    Latitude,
    Longitude,
    Feature(Feature),
}

/// How an absent field is handled
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Presence {
    /// Absence is a validation failure
    Required,
    /// Absent (or `null`) resolves to no value
    Optional,
    /// Absent resolves to the given value
    Default(f64),
}

/// Single location (`/predict`) or one entry of a batch (`/batch_predict`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Single,
    Batch,
}

impl RequestMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestMode::Single => "single",
            RequestMode::Batch => "batch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub target: FieldTarget,
    pub single: Presence,
    pub batch: Presence,
}

impl FieldSpec {
    pub fn presence(&self, mode: RequestMode) -> Presence {
        match mode {
            RequestMode::Single => self.single,
            RequestMode::Batch => self.batch,
        }
    }
}

const fn feature(name: &'static str, feature: Feature, single: Presence, batch: f64) -> FieldSpec {
    FieldSpec {
        name,
        target: FieldTarget::Feature(feature),
        single,
        batch: Presence::Default(batch),
    }
}

/// Every recognised request field, in validation order.
pub const REQUEST_SCHEMA: [FieldSpec; 2 + FEATURE_COUNT] = [
    FieldSpec {
        name: "latitude",
        target: FieldTarget::Latitude,
        single: Presence::Required,
        batch: Presence::Optional,
    },
    FieldSpec {
        name: "longitude",
        target: FieldTarget::Longitude,
        single: Presence::Required,
        batch: Presence::Optional,
    },
    feature("temperature", Feature::Temperature, Presence::Required, 25.0),
    feature("humidity", Feature::Humidity, Presence::Required, 50.0),
    feature("wind_speed", Feature::WindSpeed, Presence::Required, 10.0),
    feature("vegetation_density", Feature::VegetationDensity, Presence::Required, 60.0),
    feature("slope", Feature::Slope, Presence::Default(15.0), 15.0),
    feature("elevation", Feature::Elevation, Presence::Default(500.0), 500.0),
    feature("days_since_rain", Feature::DaysSinceRain, Presence::Default(7.0), 7.0),
    feature("proximity_to_water", Feature::ProximityToWater, Presence::Default(5.0), 5.0),
];

/// Field names that must be present for the given mode
pub fn required_fields(mode: RequestMode) -> Vec<&'static str> {
    REQUEST_SCHEMA
        .iter()
        .filter(|field| field.presence(mode) == Presence::Required)
        .map(|field| field.name)
        .collect()
}

/// Validated request content
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedRequest {
    pub features: FeatureVector,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Check presence of every required field, then parse and default.
///
/// A missing required field is reported before any malformed value, so the
/// client always learns the first absent key in schema order.
pub fn resolve(map: &Map<String, Value>, mode: RequestMode) -> Result<ResolvedRequest> {
    if let Some(missing) = REQUEST_SCHEMA
        .iter()
        .find(|field| field.presence(mode) == Presence::Required && !map.contains_key(field.name))
    {
        return Err(AppError::missing_field(missing.name));
    }

    let mut values = [0.0; FEATURE_COUNT];
    let mut latitude = None;
    let mut longitude = None;

    for field in &REQUEST_SCHEMA {
        let value = match (map.get(field.name), field.presence(mode)) {
            (None | Some(Value::Null), Presence::Optional) => None,
            (None, Presence::Default(default)) => Some(default),
            (None, Presence::Required) => return Err(AppError::missing_field(field.name)),
            (Some(raw), _) => Some(parse_number(raw).ok_or_else(|| AppError::invalid_field(field.name))?),
        };

        match field.target {
            FieldTarget::Latitude => latitude = value,
            FieldTarget::Longitude => longitude = value,
            FieldTarget::Feature(feature) => {
                // Feature fields are never Optional, so a value is always resolved.
                values[feature.index()] = value.ok_or_else(|| AppError::invalid_field(field.name))?;
            }
        }
    }

    Ok(ResolvedRequest {
        features: FeatureVector::from_array(values),
        latitude,
        longitude,
    })
}

/// Finite JSON number, or a string holding one
fn parse_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn full_single() -> Map<String, Value> {
        object(json!({
            "latitude": 34.05,
            "longitude": -118.24,
            "temperature": 35,
            "humidity": 15,
            "wind_speed": 25,
            "vegetation_density": 80
        }))
    }

    #[test]
    fn test_schema_covers_every_feature_once() {
        for feature in Feature::ALL {
            let matches = REQUEST_SCHEMA
                .iter()
                .filter(|field| field.target == FieldTarget::Feature(feature))
                .count();
            assert_eq!(matches, 1, "{:?}", feature);
            let field = REQUEST_SCHEMA
                .iter()
                .find(|field| field.target == FieldTarget::Feature(feature))
                .unwrap();
            assert_eq!(field.name, feature.name());
        }
    }

    #[test]
    fn test_required_fields() {
        assert_eq!(
            required_fields(RequestMode::Single),
            vec!["latitude", "longitude", "temperature", "humidity", "wind_speed", "vegetation_density"]
        );
        assert!(required_fields(RequestMode::Batch).is_empty());
    }

    #[test]
    fn test_single_defaults_applied() {
        let resolved = resolve(&full_single(), RequestMode::Single).unwrap();
        assert_eq!(resolved.features.slope, 15.0);
        assert_eq!(resolved.features.elevation, 500.0);
        assert_eq!(resolved.features.days_since_rain, 7.0);
        assert_eq!(resolved.features.proximity_to_water, 5.0);
        assert_eq!(resolved.features.temperature, 35.0);
        assert_eq!(resolved.latitude, Some(34.05));
    }

    #[test]
    fn test_missing_field_named() {
        let mut map = full_single();
        map.remove("humidity");
        let err = resolve(&map, RequestMode::Single).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: humidity");
    }

    #[test]
    fn test_missing_reported_before_malformed() {
        let mut map = full_single();
        map.insert("temperature".to_string(), json!("hot"));
        map.remove("vegetation_density");
        let err = resolve(&map, RequestMode::Single).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: vegetation_density");
    }

    #[test]
    fn test_numeric_strings_accepted_and_garbage_rejected() {
        let mut map = full_single();
        map.insert("wind_speed".to_string(), json!(" 12.5 "));
        let resolved = resolve(&map, RequestMode::Single).unwrap();
        assert_eq!(resolved.features.wind_speed, 12.5);

        for bad in [json!("fast"), json!(null), json!("NaN"), json!("inf"), json!([1]), json!(true)] {
            map.insert("wind_speed".to_string(), bad);
            let err = resolve(&map, RequestMode::Single).unwrap_err();
            assert_eq!(err.to_string(), "Invalid value for field: wind_speed");
        }
    }

    #[test]
    fn test_batch_entry_all_defaults() {
        let resolved = resolve(&Map::new(), RequestMode::Batch).unwrap();
        assert_eq!(resolved.latitude, None);
        assert_eq!(resolved.longitude, None);
        assert_eq!(
            resolved.features.to_array(),
            [25.0, 50.0, 10.0, 60.0, 15.0, 500.0, 7.0, 5.0]
        );
    }

    #[test]
    fn test_batch_null_coordinates_are_absent() {
        let map = object(json!({"latitude": null, "longitude": 10.5, "humidity": 5}));
        let resolved = resolve(&map, RequestMode::Batch).unwrap();
        assert_eq!(resolved.latitude, None);
        assert_eq!(resolved.longitude, Some(10.5));
        assert_eq!(resolved.features.humidity, 5.0);
    }

    #[test]
    fn test_batch_coordinates_parsed_like_features() {
        let map = object(json!({"latitude": "34.05", "longitude": -118.24}));
        let resolved = resolve(&map, RequestMode::Batch).unwrap();
        assert_eq!(resolved.latitude, Some(34.05));
        assert_eq!(resolved.longitude, Some(-118.24));

        let map = object(json!({"latitude": "north"}));
        let err = resolve(&map, RequestMode::Batch).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for field: latitude");
    }
}
