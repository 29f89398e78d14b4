/// Machine learning core for wildfire risk estimation
///
/// This module provides:
/// - Synthetic training corpus generation
/// - Per-feature standardization
/// - Bootstrap random forest regression
/// - Score banding into risk categories
/// - Model persistence and held-out evaluation

pub mod category;
pub mod dataset;
pub mod features;
pub mod forest;
pub mod models;
pub mod persistence;
pub mod scaler;
pub mod service;
pub mod tree;

pub use category::RiskCategory;
pub use dataset::{
    reference_risk, SyntheticDataGenerator, TrainingCorpus, TrainingDataset, TrainingSample,
};
pub use features::{Feature, FeatureVector, ScaledVector, FEATURE_COUNT};
pub use forest::{EnsemblePrediction, RandomForestRegressor};
pub use models::{ForestParams, ModelMetadata, ModelMetrics, ModelType, TrainingFingerprint};
pub use persistence::{ModelArtifact, ARTIFACT_FORMAT_VERSION};
pub use scaler::{FeatureScaler, ScalerParameters};
pub use service::{clamp_score, ModelSource, RiskEstimate, RiskModel, MODEL_VERSION};
