//! Reproducible synthetic training data.
//!
//! The generator stands in for observational data. Each sample draws eight
//! independent uniforms, rescales them into the physical domain of each
//! feature, and labels the result with a fixed linear risk formula plus
//! Gaussian noise.

use crate::error::{AppError, Result};
use crate::ml::features::{Feature, FeatureVector, FEATURE_COUNT};
use ndarray::{Array1, Array2};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

/// Lowest valid risk score.
pub const MIN_RISK: f64 = 0.0;

/// Highest valid risk score.
pub const MAX_RISK: f64 = 100.0;

/// Divisor that brings the weighted sum onto the 0-100 scale.
pub const RISK_NORMALIZATION: f64 = 2.0;

/// `(weight, pivot)` per feature: contribution is `weight * (value - pivot)`.
/// Negative weights mark the features that lower risk as they grow.
const RISK_WEIGHTS: [(f64, f64); FEATURE_COUNT] = [
    (1.5, 10.0),    // temperature above 10°C
    (-0.8, 100.0),  // humidity deficit below 100%
    (1.2, 0.0),     // wind speed
    (0.5, 0.0),     // vegetation density
    (0.3, 0.0),     // slope
    (0.0004, 0.0),  // elevation, 0.4 per km
    (1.8, 0.0),     // days since rain
    (-0.6, 10.0),   // distance to water below 10 km
];

/// Noise-free risk before clamping.
pub fn reference_risk(features: &FeatureVector) -> f64 {
    let weighted: f64 = Feature::ALL
        .iter()
        .map(|&f| {
            let (weight, pivot) = RISK_WEIGHTS[f.index()];
            weight * (features.get(f) - pivot)
        })
        .sum();
    weighted / RISK_NORMALIZATION
}

/// Training sample for the risk model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub features: FeatureVector,

    /// Target risk in [0, 100]
    pub risk: f64,
}

/// Ordered samples produced from one seed
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingCorpus {
    samples: Vec<TrainingSample>,
    seed: u64,
}

impl TrainingCorpus {
    pub fn samples(&self) -> &[TrainingSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Dense `(n_samples, FEATURE_COUNT)` matrix plus target column.
    pub fn to_dataset(&self) -> TrainingDataset {
        let n_samples = self.samples.len();
        let mut features = Array2::zeros((n_samples, FEATURE_COUNT));
        let mut targets = Array1::zeros(n_samples);

        for (i, sample) in self.samples.iter().enumerate() {
            for (j, value) in sample.features.to_array().into_iter().enumerate() {
                features[[i, j]] = value;
            }
            targets[i] = sample.risk;
        }

        TrainingDataset { features, targets }
    }
}

/// Matrix form of a corpus, raw or standardized
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingDataset {
    /// Feature matrix (n_samples × FEATURE_COUNT)
    pub features: Array2<f64>,

    /// Target risk per row
    pub targets: Array1<f64>,
}

impl TrainingDataset {
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn row(&self, index: usize) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (j, value) in self.features.row(index).iter().enumerate().take(FEATURE_COUNT) {
            out[j] = *value;
        }
        out
    }
}

/// Synthetic labeled corpus generator
#[derive(Debug, Clone, Copy)]
pub struct SyntheticDataGenerator {
    noise_std: f64,
}

impl Default for SyntheticDataGenerator {
    fn default() -> Self {
        Self { noise_std: 5.0 }
    }
}

impl SyntheticDataGenerator {
    pub fn new(noise_std: f64) -> Self {
        Self { noise_std }
    }

    pub fn noise_std(&self) -> f64 {
        self.noise_std
    }

    /// Generate `n_samples` labeled samples. Same `(n_samples, seed)` always
    /// yields the same corpus.
    pub fn generate(&self, n_samples: usize, seed: u64) -> Result<TrainingCorpus> {
        if n_samples == 0 {
            return Err(AppError::Training(
                "corpus must contain at least one sample".to_string(),
            ));
        }
        if !self.noise_std.is_finite() || self.noise_std < 0.0 {
            return Err(AppError::Training(format!(
                "invalid noise standard deviation: {}",
                self.noise_std
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);

        let features: Vec<FeatureVector> = (0..n_samples)
            .map(|_| {
                let mut values = [0.0; FEATURE_COUNT];
                for feature in Feature::ALL {
                    let (low, high) = feature.domain();
                    let unit: f64 = rng.gen();
                    values[feature.index()] = low + unit * (high - low);
                }
                FeatureVector::from_array(values)
            })
            .collect();

        let noise = if self.noise_std > 0.0 {
            Some(
                Normal::new(0.0, self.noise_std)
                    .map_err(|e| AppError::Training(format!("invalid noise model: {}", e)))?,
            )
        } else {
            None
        };

        let samples = features
            .into_iter()
            .map(|features| {
                let jitter = noise.as_ref().map_or(0.0, |n| n.sample(&mut rng));
                let risk = (reference_risk(&features) + jitter).clamp(MIN_RISK, MAX_RISK);
                TrainingSample { features, risk }
            })
            .collect();

        Ok(TrainingCorpus { samples, seed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_same_seed_same_corpus() {
        let generator = SyntheticDataGenerator::default();
        let a = generator.generate(500, 42).unwrap();
        let b = generator.generate(500, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_different_corpus() {
        let generator = SyntheticDataGenerator::default();
        let a = generator.generate(50, 1).unwrap();
        let b = generator.generate(50, 2).unwrap();
        assert_ne!(a.samples(), b.samples());
    }

    #[test]
    fn test_features_stay_in_domain() {
        let corpus = SyntheticDataGenerator::default().generate(2000, 7).unwrap();
        for sample in corpus.samples() {
            for feature in Feature::ALL {
                let (low, high) = feature.domain();
                let value = sample.features.get(feature);
                assert!(value >= low && value <= high, "{:?} = {}", feature, value);
            }
            assert!(sample.risk >= MIN_RISK && sample.risk <= MAX_RISK);
        }
    }

    #[test]
    fn test_noise_free_targets_follow_formula() {
        let corpus = SyntheticDataGenerator::new(0.0).generate(100, 3).unwrap();
        for sample in corpus.samples() {
            let expected = reference_risk(&sample.features).clamp(MIN_RISK, MAX_RISK);
            assert_relative_eq!(sample.risk, expected);
        }
    }

    #[test]
    fn test_reference_risk_known_point() {
        // Worked example from the low-risk field scenario.
        let features = FeatureVector {
            temperature: 18.0,
            humidity: 75.0,
            wind_speed: 3.0,
            vegetation_density: 30.0,
            slope: 5.0,
            elevation: 200.0,
            days_since_rain: 1.0,
            proximity_to_water: 1.0,
        };
        assert_relative_eq!(reference_risk(&features), 29.69, epsilon = 1e-9);
    }

    #[test]
    fn test_reference_risk_directions() {
        let base = FeatureVector::from_array([30.0, 50.0, 15.0, 50.0, 20.0, 1500.0, 15.0, 5.0]);
        let base_risk = reference_risk(&base);
        let rising = [
            Feature::Temperature,
            Feature::WindSpeed,
            Feature::VegetationDensity,
            Feature::Slope,
            Feature::Elevation,
            Feature::DaysSinceRain,
        ];
        for feature in rising {
            let bumped = base.with(feature, base.get(feature) + 1.0);
            assert!(reference_risk(&bumped) > base_risk, "{:?}", feature);
        }
        for feature in [Feature::Humidity, Feature::ProximityToWater] {
            let bumped = base.with(feature, base.get(feature) + 1.0);
            assert!(reference_risk(&bumped) < base_risk, "{:?}", feature);
        }
    }

    #[test]
    fn test_empty_corpus_rejected() {
        let err = SyntheticDataGenerator::default().generate(0, 42).unwrap_err();
        assert!(matches!(err, AppError::Training(_)));
    }

    #[test]
    fn test_dataset_shape() {
        let corpus = SyntheticDataGenerator::default().generate(10, 42).unwrap();
        let dataset = corpus.to_dataset();
        assert_eq!(dataset.features.shape(), &[10, FEATURE_COUNT]);
        assert_eq!(dataset.targets.len(), 10);
        assert_eq!(dataset.row(3), corpus.samples()[3].features.to_array());
    }
}
