use crate::ml::features::{Feature, FEATURE_COUNT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Forest hyper-parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees in the ensemble
    pub tree_count: usize,

    /// Maximum depth of each tree (root is depth 0)
    pub max_depth: usize,

    /// Size of the random feature subset considered at each split
    pub max_features: usize,

    /// Nodes with fewer samples become leaves
    pub min_samples_split: usize,

    /// Minimum samples on each side of a split
    pub min_samples_leaf: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            tree_count: 100,
            max_depth: 15,
            max_features: 6,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

impl ForestParams {
    pub fn to_map(&self) -> BTreeMap<String, String> {
        [
            ("tree_count", self.tree_count),
            ("max_depth", self.max_depth),
            ("max_features", self.max_features),
            ("min_samples_split", self.min_samples_split),
            ("min_samples_leaf", self.min_samples_leaf),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    /// Effective subset size, never zero and never above the feature count.
    pub fn feature_subset_size(&self) -> usize {
        self.max_features.clamp(1, FEATURE_COUNT)
    }
}

/// Everything that determines the trained model. Two fingerprints that
/// compare equal produce identical models.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingFingerprint {
    pub n_samples: usize,
    pub seed: u64,
    pub noise_std: f64,
    pub forest: ForestParams,
}

/// Regression evaluation metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Coefficient of determination
    pub r2: f64,

    /// Root mean squared error
    pub rmse: f64,

    /// Mean absolute error
    pub mae: f64,

    /// Number of evaluated samples
    pub n_samples: usize,
}

impl ModelMetrics {
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Self {
        let n = y_true.len().min(y_pred.len());
        if n == 0 {
            return Self::default();
        }

        let mean = y_true[..n].iter().sum::<f64>() / n as f64;
        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        let mut abs_err = 0.0;

        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            let residual = t - p;
            ss_res += residual * residual;
            ss_tot += (t - mean) * (t - mean);
            abs_err += residual.abs();
        }

        let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Self {
            r2,
            rmse: (ss_res / n as f64).sqrt(),
            mae: abs_err / n as f64,
            n_samples: n,
        }
    }
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Model version
    pub version: String,

    /// Model type
    pub model_type: ModelType,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Wall-clock training time
    pub training_duration_ms: u64,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Held-out evaluation
    pub validation_metrics: Option<ModelMetrics>,

    /// Normalized mean impurity decrease per feature
    pub feature_importance: BTreeMap<String, f64>,

    /// Hyperparameters
    pub hyperparameters: BTreeMap<String, String>,
}

impl ModelMetadata {
    pub fn importance_map(importance: &[f64; FEATURE_COUNT]) -> BTreeMap<String, f64> {
        Feature::ALL
            .iter()
            .map(|f| (f.name().to_string(), importance[f.index()]))
            .collect()
    }
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Bootstrap-aggregated regression trees
    RandomForestRegressor,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::RandomForestRegressor => write!(f, "RandomForestRegressor"),
        }
    }
}
