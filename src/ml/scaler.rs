use crate::error::{AppError, Result};
use crate::ml::dataset::{TrainingCorpus, TrainingDataset};
use crate::ml::features::{FeatureVector, ScaledVector, FEATURE_COUNT};
use ndarray::Axis;
use serde::{Deserialize, Serialize};

/// Per-feature standardization parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParameters {
    pub mean: [f64; FEATURE_COUNT],

    /// Population standard deviation. Zero entries are stored as 1.0.
    pub std_dev: [f64; FEATURE_COUNT],
}

impl ScalerParameters {
    pub fn transform(&self, vector: &FeatureVector) -> ScaledVector {
        let raw = vector.to_array();
        let mut scaled = [0.0; FEATURE_COUNT];
        for j in 0..FEATURE_COUNT {
            scaled[j] = (raw[j] - self.mean[j]) / self.std_dev[j];
        }
        ScaledVector(scaled)
    }
}

/// Feature standardizer: Unfitted → Fitted, never back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureScaler {
    params: Option<ScalerParameters>,
}

impl FeatureScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a fitted scaler from stored parameters
    pub fn from_parameters(params: ScalerParameters) -> Self {
        Self {
            params: Some(params),
        }
    }

    /// Compute mean and standard deviation per feature across the corpus
    pub fn fit(&mut self, corpus: &TrainingCorpus) -> Result<&ScalerParameters> {
        if self.params.is_some() {
            return Err(AppError::Training("feature scaler is already fitted".to_string()));
        }
        if corpus.is_empty() {
            return Err(AppError::Training("cannot fit scaler on an empty corpus".to_string()));
        }

        let dataset = corpus.to_dataset();
        let means = dataset
            .features
            .mean_axis(Axis(0))
            .ok_or_else(|| AppError::Training("cannot fit scaler on an empty corpus".to_string()))?;
        let stds = dataset.features.std_axis(Axis(0), 0.0);

        let mut mean = [0.0; FEATURE_COUNT];
        let mut std_dev = [1.0; FEATURE_COUNT];
        for j in 0..FEATURE_COUNT {
            mean[j] = means[j];
            // Constant columns would divide by zero.
            if stds[j] > 0.0 && stds[j].is_finite() {
                std_dev[j] = stds[j];
            }
        }

        Ok(&*self.params.insert(ScalerParameters { mean, std_dev }))
    }

    pub fn transform(&self, vector: &FeatureVector) -> Result<ScaledVector> {
        self.parameters().map(|p| p.transform(vector))
    }

    /// Standardize every row of a dataset, keeping targets as-is
    pub fn transform_dataset(&self, dataset: &TrainingDataset) -> Result<TrainingDataset> {
        let params = self.parameters()?;
        let mut features = dataset.features.clone();
        for mut row in features.rows_mut() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = (*value - params.mean[j]) / params.std_dev[j];
            }
        }
        Ok(TrainingDataset {
            features,
            targets: dataset.targets.clone(),
        })
    }

    pub fn parameters(&self) -> Result<&ScalerParameters> {
        self.params.as_ref().ok_or(AppError::NotTrained("feature scaler"))
    }

    pub fn is_fitted(&self) -> bool {
        self.params.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::dataset::SyntheticDataGenerator;
    use crate::ml::features::Feature;
    use approx::assert_relative_eq;

    fn corpus() -> TrainingCorpus {
        SyntheticDataGenerator::default().generate(1000, 42).unwrap()
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let scaler = FeatureScaler::new();
        let vector = corpus().samples()[0].features;
        assert!(matches!(
            scaler.transform(&vector),
            Err(AppError::NotTrained(_))
        ));
        assert!(!scaler.is_fitted());
    }

    #[test]
    fn test_fitted_columns_are_standardized() {
        let corpus = corpus();
        let mut scaler = FeatureScaler::new();
        scaler.fit(&corpus).unwrap();

        let scaled = scaler.transform_dataset(&corpus.to_dataset()).unwrap();
        let means = scaled.features.mean_axis(Axis(0)).unwrap();
        let stds = scaled.features.std_axis(Axis(0), 0.0);
        for j in 0..FEATURE_COUNT {
            assert_relative_eq!(means[j], 0.0, epsilon = 1e-9);
            assert_relative_eq!(stds[j], 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_single_transform_matches_dataset_transform() {
        let corpus = corpus();
        let mut scaler = FeatureScaler::new();
        scaler.fit(&corpus).unwrap();

        let scaled = scaler.transform_dataset(&corpus.to_dataset()).unwrap();
        let single = scaler.transform(&corpus.samples()[5].features).unwrap();
        for feature in Feature::ALL {
            assert_relative_eq!(single.get(feature), scaled.features[[5, feature.index()]]);
        }
    }

    #[test]
    fn test_constant_column_falls_back_to_unit_deviation() {
        // A single sample makes every column constant.
        let corpus = SyntheticDataGenerator::default().generate(1, 9).unwrap();
        let mut scaler = FeatureScaler::new();
        let params = *scaler.fit(&corpus).unwrap();
        assert_eq!(params.std_dev, [1.0; FEATURE_COUNT]);

        let scaled = scaler.transform(&corpus.samples()[0].features).unwrap();
        assert!(scaled.as_slice().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_refit_is_rejected() {
        let corpus = corpus();
        let mut scaler = FeatureScaler::new();
        let first = *scaler.fit(&corpus).unwrap();
        assert!(scaler.fit(&corpus).is_err());
        assert_eq!(scaler.parameters().unwrap(), &first);
    }
}
