//! Fixed-order feature layout shared by the generator, scaler and forest.
//!
//! Index table:
//!
//! | idx | feature              | unit    |
//! |-----|----------------------|---------|
//! | 0   | `temperature`        | °C      |
//! | 1   | `humidity`           | %       |
//! | 2   | `wind_speed`         | km/h    |
//! | 3   | `vegetation_density` | %       |
//! | 4   | `slope`              | degrees |
//! | 5   | `elevation`          | m       |
//! | 6   | `days_since_rain`    | days    |
//! | 7   | `proximity_to_water` | km      |

use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumIter, IntoStaticStr};

/// Number of model inputs.
pub const FEATURE_COUNT: usize = Feature::COUNT;

/// A single model input. The discriminant is the column index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumCount, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Feature {
    Temperature = 0,
    Humidity = 1,
    WindSpeed = 2,
    VegetationDensity = 3,
    Slope = 4,
    Elevation = 5,
    DaysSinceRain = 6,
    ProximityToWater = 7,
}

impl Feature {
    /// All features in column order.
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Temperature,
        Feature::Humidity,
        Feature::WindSpeed,
        Feature::VegetationDensity,
        Feature::Slope,
        Feature::Elevation,
        Feature::DaysSinceRain,
        Feature::ProximityToWater,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Wire name, as used in request bodies and `features_used`.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Physical range the synthetic generator draws from.
    pub const fn domain(self) -> (f64, f64) {
        match self {
            Feature::Temperature => (10.0, 50.0),
            Feature::Humidity => (10.0, 90.0),
            Feature::WindSpeed => (0.0, 30.0),
            Feature::VegetationDensity => (0.0, 100.0),
            Feature::Slope => (0.0, 45.0),
            Feature::Elevation => (0.0, 3000.0),
            Feature::DaysSinceRain => (0.0, 30.0),
            Feature::ProximityToWater => (0.0, 10.0),
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.name()).collect()
    }
}

/// Raw environmental measurements for one location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub vegetation_density: f64,
    pub slope: f64,
    pub elevation: f64,
    pub days_since_rain: f64,
    pub proximity_to_water: f64,
}

impl FeatureVector {
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Temperature => self.temperature,
            Feature::Humidity => self.humidity,
            Feature::WindSpeed => self.wind_speed,
            Feature::VegetationDensity => self.vegetation_density,
            Feature::Slope => self.slope,
            Feature::Elevation => self.elevation,
            Feature::DaysSinceRain => self.days_since_rain,
            Feature::ProximityToWater => self.proximity_to_water,
        }
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        let slot = match feature {
            Feature::Temperature => &mut self.temperature,
            Feature::Humidity => &mut self.humidity,
            Feature::WindSpeed => &mut self.wind_speed,
            Feature::VegetationDensity => &mut self.vegetation_density,
            Feature::Slope => &mut self.slope,
            Feature::Elevation => &mut self.elevation,
            Feature::DaysSinceRain => &mut self.days_since_rain,
            Feature::ProximityToWater => &mut self.proximity_to_water,
        };
        *slot = value;
    }

    /// Copy with one feature replaced.
    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        self.set(feature, value);
        self
    }

    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        Feature::ALL.map(|f| self.get(f))
    }

    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            temperature: values[Feature::Temperature.index()],
            humidity: values[Feature::Humidity.index()],
            wind_speed: values[Feature::WindSpeed.index()],
            vegetation_density: values[Feature::VegetationDensity.index()],
            slope: values[Feature::Slope.index()],
            elevation: values[Feature::Elevation.index()],
            days_since_rain: values[Feature::DaysSinceRain.index()],
            proximity_to_water: values[Feature::ProximityToWater.index()],
        }
    }
}

/// A feature vector after standardization. Only the scaler constructs these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledVector(pub(crate) [f64; FEATURE_COUNT]);

impl ScaledVector {
    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_index_table_matches_declaration_order() {
        for (idx, feature) in Feature::iter().enumerate() {
            assert_eq!(feature.index(), idx);
            assert_eq!(Feature::ALL[idx], feature);
            assert_eq!(Feature::from_index(idx), Some(feature));
        }
        assert_eq!(Feature::from_index(FEATURE_COUNT), None);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            Feature::names(),
            vec![
                "temperature",
                "humidity",
                "wind_speed",
                "vegetation_density",
                "slope",
                "elevation",
                "days_since_rain",
                "proximity_to_water",
            ]
        );
    }

    #[test]
    fn test_array_round_trip_keeps_positions() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let vector = FeatureVector::from_array(values);
        assert_eq!(vector.wind_speed, 3.0);
        assert_eq!(vector.proximity_to_water, 8.0);
        assert_eq!(vector.to_array(), values);
    }

    #[test]
    fn test_with_replaces_single_feature() {
        let base = FeatureVector::from_array([0.0; FEATURE_COUNT]);
        let changed = base.with(Feature::Elevation, 1200.0);
        assert_eq!(changed.elevation, 1200.0);
        assert_eq!(changed.get(Feature::Slope), 0.0);
        assert_eq!(base.elevation, 0.0);
    }
}
