//! Shared fixtures for integration tests.

#![allow(dead_code)]

use emberalert_ml::config::ModelConfig;
use emberalert_ml::ml::{FeatureVector, RiskModel};

/// Production hyper-parameters without touching the filesystem.
pub fn serving_config() -> ModelConfig {
    ModelConfig {
        validation_samples: 500,
        persist: false,
        load_existing: false,
        ..ModelConfig::default()
    }
}

/// Small, fast model for tests that only exercise plumbing.
pub fn quick_config() -> ModelConfig {
    ModelConfig {
        n_samples: 600,
        tree_count: 10,
        max_depth: 8,
        validation_samples: 0,
        persist: false,
        load_existing: false,
        ..ModelConfig::default()
    }
}

pub fn train(config: &ModelConfig) -> RiskModel {
    RiskModel::train(config).expect("training should succeed")
}

pub fn high_risk() -> FeatureVector {
    FeatureVector {
        temperature: 42.0,
        humidity: 15.0,
        wind_speed: 25.0,
        vegetation_density: 80.0,
        slope: 30.0,
        elevation: 1200.0,
        days_since_rain: 21.0,
        proximity_to_water: 8.0,
    }
}

pub fn low_risk() -> FeatureVector {
    FeatureVector {
        temperature: 18.0,
        humidity: 75.0,
        wind_speed: 3.0,
        vegetation_density: 30.0,
        slope: 5.0,
        elevation: 200.0,
        days_since_rain: 1.0,
        proximity_to_water: 1.0,
    }
}

/// Sample value of the first exposition line for `metric` whose labels
/// contain every `key="value"` pair in `labels`.
pub fn metric_value(output: &str, metric: &str, labels: &[(&str, &str)]) -> Option<f64> {
    output
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| {
            line.strip_prefix(metric)
                .is_some_and(|rest| rest.starts_with('{') || rest.starts_with(' '))
        })
        .find(|line| {
            labels
                .iter()
                .all(|(key, value)| line.contains(&format!("{}=\"{}\"", key, value)))
        })
        .and_then(|line| line.split_whitespace().last())
        .and_then(|value| value.parse().ok())
}
