use crate::config::ModelConfig;
use crate::error::{AppError, Result};
use crate::ml::category::RiskCategory;
use crate::ml::dataset::{SyntheticDataGenerator, TrainingCorpus, MAX_RISK, MIN_RISK};
use crate::ml::features::FeatureVector;
use crate::ml::forest::RandomForestRegressor;
use crate::ml::models::{ModelMetadata, ModelMetrics, ModelType, TrainingFingerprint};
use crate::ml::persistence::{ModelArtifact, ARTIFACT_FORMAT_VERSION};
use crate::ml::scaler::FeatureScaler;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Version string reported by `/model/info`.
pub const MODEL_VERSION: &str = "1.0.0";

/// Output of one model evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskEstimate {
    /// Forest mean clamped to [0, 100]
    pub score: f64,

    pub category: RiskCategory,

    /// Fraction of trees whose own clamped prediction lands in `category`
    pub confidence: f64,
}

/// How the serving model came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    Trained,
    Loaded,
}

/// Fitted scaler + trained forest. Immutable once built; share behind `Arc`.
#[derive(Debug, Clone)]
pub struct RiskModel {
    scaler: FeatureScaler,
    regressor: RandomForestRegressor,
    metadata: ModelMetadata,
    fingerprint: TrainingFingerprint,
}

impl RiskModel {
    /// Generate the corpus, fit the scaler, train the forest, evaluate
    pub fn train(config: &ModelConfig) -> Result<Self> {
        let started = Instant::now();
        let generator = SyntheticDataGenerator::new(config.noise_std);

        info!(
            n_samples = config.n_samples,
            seed = config.seed,
            noise_std = config.noise_std,
            "Generating synthetic training corpus"
        );
        let corpus = generator.generate(config.n_samples, config.seed)?;

        let mut scaler = FeatureScaler::new();
        scaler.fit(&corpus)?;
        let dataset = scaler.transform_dataset(&corpus.to_dataset())?;

        let params = config.forest_params();
        info!(
            tree_count = params.tree_count,
            max_depth = params.max_depth,
            max_features = params.max_features,
            "Training wildfire risk forest"
        );
        let regressor = RandomForestRegressor::fit(&dataset, params, config.seed)?;
        let training_duration = started.elapsed();

        let mut model = Self {
            scaler,
            regressor,
            metadata: ModelMetadata {
                name: "Wildfire Risk Forest".to_string(),
                version: MODEL_VERSION.to_string(),
                model_type: ModelType::RandomForestRegressor,
                trained_at: chrono::Utc::now(),
                training_duration_ms: training_duration.as_millis() as u64,
                n_training_samples: corpus.len(),
                validation_metrics: None,
                feature_importance: Default::default(),
                hyperparameters: params.to_map(),
            },
            fingerprint: config.fingerprint(),
        };
        model.metadata.feature_importance =
            ModelMetadata::importance_map(model.regressor.feature_importance());

        if config.validation_samples > 0 {
            let holdout =
                generator.generate(config.validation_samples, config.seed.wrapping_add(1))?;
            let metrics = model.evaluate(&holdout)?;
            info!(
                r2 = format!("{:.4}", metrics.r2),
                rmse = format!("{:.3}", metrics.rmse),
                mae = format!("{:.3}", metrics.mae),
                "Held-out evaluation"
            );
            model.metadata.validation_metrics = Some(metrics);
        }

        crate::metrics::record_training(training_duration.as_secs_f64(), model.regressor.n_trees());
        info!(
            duration_ms = model.metadata.training_duration_ms,
            avg_depth = format!("{:.1}", model.regressor.avg_depth()),
            nodes = model.regressor.total_nodes(),
            "✅ Model training completed"
        );

        Ok(model)
    }

    /// Reuse a compatible artifact when allowed, otherwise train (and persist)
    pub fn load_or_train(config: &ModelConfig) -> Result<(Self, ModelSource)> {
        if config.load_existing && config.artifact_path.exists() {
            match Self::load(&config.artifact_path) {
                Ok(model) if model.fingerprint == config.fingerprint() => {
                    info!(path = %config.artifact_path.display(), "Loaded persisted model");
                    return Ok((model, ModelSource::Loaded));
                }
                Ok(_) => {
                    warn!(
                        path = %config.artifact_path.display(),
                        "Persisted model was trained with different parameters, retraining"
                    );
                }
                Err(e) => {
                    warn!(
                        path = %config.artifact_path.display(),
                        error = %e,
                        "Persisted model unreadable, retraining"
                    );
                }
            }
        }

        let model = Self::train(config)?;

        if config.persist {
            // A failed write only costs a retrain on the next start.
            match model.save(&config.artifact_path) {
                Ok(()) => info!(path = %config.artifact_path.display(), "Persisted model"),
                Err(e) => warn!(
                    path = %config.artifact_path.display(),
                    error = %e,
                    "Failed to persist model"
                ),
            }
        }

        Ok((model, ModelSource::Trained))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        ModelArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            fingerprint: self.fingerprint,
            scaler: *self.scaler.parameters()?,
            regressor: self.regressor.clone(),
            metadata: self.metadata.clone(),
        }
        .save(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let artifact = ModelArtifact::load(path)?;
        Ok(Self {
            scaler: FeatureScaler::from_parameters(artifact.scaler),
            regressor: artifact.regressor,
            metadata: artifact.metadata,
            fingerprint: artifact.fingerprint,
        })
    }

    /// Clamped forest mean for raw features
    pub fn predict_score(&self, features: &FeatureVector) -> Result<f64> {
        let scaled = self.scaler.transform(features)?;
        let raw = self.regressor.predict(&scaled)?;
        Ok(clamp_score(raw))
    }

    /// Score, category and ensemble agreement for raw features
    pub fn estimate(&self, features: &FeatureVector) -> Result<RiskEstimate> {
        let scaled = self.scaler.transform(features)?;
        let ensemble = self.regressor.predict_ensemble(&scaled)?;

        let score = clamp_score(ensemble.mean);
        if !score.is_finite() {
            return Err(AppError::Internal(format!(
                "non-finite risk score for {:?}",
                features
            )));
        }
        let category = RiskCategory::categorize(score);

        let agreeing = ensemble
            .members
            .iter()
            .filter(|m| RiskCategory::categorize(clamp_score(**m)) == category)
            .count();
        let confidence = agreeing as f64 / ensemble.members.len() as f64;

        Ok(RiskEstimate {
            score,
            category,
            confidence,
        })
    }

    /// Regression metrics of this model on a labeled corpus
    pub fn evaluate(&self, corpus: &TrainingCorpus) -> Result<ModelMetrics> {
        let mut y_true = Vec::with_capacity(corpus.len());
        let mut y_pred = Vec::with_capacity(corpus.len());
        for sample in corpus.samples() {
            y_true.push(sample.risk);
            y_pred.push(self.predict_score(&sample.features)?);
        }
        Ok(ModelMetrics::compute(&y_true, &y_pred))
    }

    pub fn is_trained(&self) -> bool {
        self.scaler.is_fitted() && self.regressor.is_trained()
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn regressor(&self) -> &RandomForestRegressor {
        &self.regressor
    }

    pub fn scaler(&self) -> &FeatureScaler {
        &self.scaler
    }

    pub fn fingerprint(&self) -> &TrainingFingerprint {
        &self.fingerprint
    }
}

/// Clamp to the valid score range.
pub fn clamp_score(raw: f64) -> f64 {
    raw.clamp(MIN_RISK, MAX_RISK)
}
