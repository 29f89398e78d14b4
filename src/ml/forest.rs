//! Bootstrap-aggregated regression forest.
//!
//! Each tree is grown on its own bootstrap resample with its own RNG, so
//! trees train in parallel and the fitted forest depends only on the
//! dataset, the hyper-parameters, and the seed. The forest prediction is
//! the arithmetic mean of the member predictions.

use crate::error::{AppError, Result};
use crate::ml::dataset::TrainingDataset;
use crate::ml::features::{ScaledVector, FEATURE_COUNT};
use crate::ml::models::ForestParams;
use crate::ml::tree::RegressionTree;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Mean prediction plus the output of every member tree
#[derive(Debug, Clone, PartialEq)]
pub struct EnsemblePrediction {
    pub mean: f64,
    pub members: Vec<f64>,
}

/// Random forest regressor: Untrained → Trained, never back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    trees: Vec<RegressionTree>,
    feature_importance: [f64; FEATURE_COUNT],
    trained: bool,
}

impl RandomForestRegressor {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            feature_importance: [0.0; FEATURE_COUNT],
            trained: false,
        }
    }

    /// Build and train in one step
    pub fn fit(dataset: &TrainingDataset, params: ForestParams, seed: u64) -> Result<Self> {
        let mut forest = Self::new(params);
        forest.train(dataset, seed)?;
        Ok(forest)
    }

    /// Grow `tree_count` trees on bootstrap resamples of a standardized dataset
    pub fn train(&mut self, dataset: &TrainingDataset, seed: u64) -> Result<()> {
        if self.trained {
            return Err(AppError::Training("forest is already trained".to_string()));
        }
        if self.params.tree_count == 0 {
            return Err(AppError::Training("tree_count must be at least 1".to_string()));
        }

        let n_samples = dataset.n_samples();
        if n_samples == 0 || dataset.targets.len() != n_samples {
            return Err(AppError::Training(format!(
                "dataset has {} rows and {} targets",
                n_samples,
                dataset.targets.len()
            )));
        }
        if dataset.features.iter().chain(dataset.targets.iter()).any(|v| !v.is_finite()) {
            return Err(AppError::Training("dataset contains non-finite values".to_string()));
        }

        // Seeds are drawn up front so tree i is the same however rayon schedules it.
        let mut master = StdRng::seed_from_u64(seed);
        let tree_seeds: Vec<u64> = (0..self.params.tree_count).map(|_| master.gen()).collect();

        let params = self.params;
        let trees = tree_seeds
            .par_iter()
            .enumerate()
            .map(|(index, &tree_seed)| -> Result<RegressionTree> {
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let rows: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                let tree = RegressionTree::fit(dataset, &rows, &params, &mut rng)?;
                debug!(
                    tree = index,
                    depth = tree.depth(),
                    nodes = tree.n_nodes(),
                    "Grew regression tree"
                );
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.feature_importance = Self::aggregate_importance(&trees);
        self.trees = trees;
        self.trained = true;

        Ok(())
    }

    /// Mean of the member predictions
    pub fn predict(&self, x: &ScaledVector) -> Result<f64> {
        self.ensure_trained()?;
        let total: f64 = self.trees.iter().map(|t| t.predict(x)).sum();
        Ok(total / self.trees.len() as f64)
    }

    /// Mean prediction with every member's output
    pub fn predict_ensemble(&self, x: &ScaledVector) -> Result<EnsemblePrediction> {
        self.ensure_trained()?;
        let members: Vec<f64> = self.trees.iter().map(|t| t.predict(x)).collect();
        let mean = members.iter().sum::<f64>() / members.len() as f64;

        Ok(EnsemblePrediction { mean, members })
    }

    fn ensure_trained(&self) -> Result<()> {
        if !self.trained || self.trees.is_empty() {
            return Err(AppError::NotTrained("risk regressor"));
        }
        Ok(())
    }

    /// Per-tree importances normalized, averaged, then normalized again.
    fn aggregate_importance(trees: &[RegressionTree]) -> [f64; FEATURE_COUNT] {
        let mut total = [0.0; FEATURE_COUNT];
        for tree in trees {
            let importance = tree.importance();
            let sum: f64 = importance.iter().sum();
            if sum > 0.0 {
                for j in 0..FEATURE_COUNT {
                    total[j] += importance[j] / sum;
                }
            }
        }

        let grand: f64 = total.iter().sum();
        if grand > 0.0 {
            for value in total.iter_mut() {
                *value /= grand;
            }
        }
        total
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn feature_importance(&self) -> &[f64; FEATURE_COUNT] {
        &self.feature_importance
    }

    /// Average tree depth across the forest
    pub fn avg_depth(&self) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let total: usize = self.trees.iter().map(RegressionTree::depth).sum();
        total as f64 / self.trees.len() as f64
    }

    /// Total number of nodes across all trees
    pub fn total_nodes(&self) -> usize {
        self.trees.iter().map(RegressionTree::n_nodes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::dataset::SyntheticDataGenerator;
    use crate::ml::features::Feature;
    use crate::ml::scaler::FeatureScaler;
    use approx::assert_relative_eq;

    fn small_params() -> ForestParams {
        ForestParams {
            tree_count: 12,
            max_depth: 8,
            ..ForestParams::default()
        }
    }

    fn scaled_dataset(n: usize) -> (FeatureScaler, TrainingDataset) {
        let corpus = SyntheticDataGenerator::default().generate(n, 42).unwrap();
        let mut scaler = FeatureScaler::new();
        scaler.fit(&corpus).unwrap();
        let dataset = scaler.transform_dataset(&corpus.to_dataset()).unwrap();
        (scaler, dataset)
    }

    #[test]
    fn test_predict_before_train_fails() {
        let forest = RandomForestRegressor::new(small_params());
        let x = ScaledVector([0.0; FEATURE_COUNT]);
        assert!(matches!(forest.predict(&x), Err(AppError::NotTrained(_))));
        assert!(!forest.is_trained());
    }

    #[test]
    fn test_train_is_deterministic() {
        let (_, dataset) = scaled_dataset(600);
        let a = RandomForestRegressor::fit(&dataset, small_params(), 7).unwrap();
        let b = RandomForestRegressor::fit(&dataset, small_params(), 7).unwrap();

        for row in [0, 17, 333] {
            let x = ScaledVector(dataset.row(row));
            assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
        }
        assert_eq!(a.total_nodes(), b.total_nodes());
    }

    #[test]
    fn test_prediction_is_member_mean() {
        let (_, dataset) = scaled_dataset(400);
        let forest = RandomForestRegressor::fit(&dataset, small_params(), 3).unwrap();
        let x = ScaledVector(dataset.row(10));

        let ensemble = forest.predict_ensemble(&x).unwrap();
        assert_eq!(ensemble.members.len(), 12);
        let mean = ensemble.members.iter().sum::<f64>() / 12.0;
        assert_relative_eq!(forest.predict(&x).unwrap(), mean, epsilon = 1e-12);
        assert_relative_eq!(ensemble.mean, mean, epsilon = 1e-12);
    }

    #[test]
    fn test_depth_limit_holds() {
        let (_, dataset) = scaled_dataset(400);
        let params = ForestParams {
            max_depth: 3,
            ..small_params()
        };
        let forest = RandomForestRegressor::fit(&dataset, params, 3).unwrap();
        assert!(forest.avg_depth() <= 3.0);
        assert_eq!(forest.n_trees(), 12);
    }

    #[test]
    fn test_importance_is_normalized_and_ranks_drought_above_elevation() {
        let (_, dataset) = scaled_dataset(1500);
        let forest = RandomForestRegressor::fit(&dataset, small_params(), 11).unwrap();
        let importance = forest.feature_importance();
        assert_relative_eq!(importance.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert!(
            importance[Feature::DaysSinceRain.index()] > importance[Feature::Elevation.index()]
        );
    }

    #[test]
    fn test_second_train_rejected() {
        let (_, dataset) = scaled_dataset(200);
        let mut forest = RandomForestRegressor::new(small_params());
        forest.train(&dataset, 1).unwrap();
        assert!(forest.train(&dataset, 1).is_err());
    }

    #[test]
    fn test_zero_trees_rejected() {
        let (_, dataset) = scaled_dataset(50);
        let params = ForestParams {
            tree_count: 0,
            ..small_params()
        };
        assert!(RandomForestRegressor::fit(&dataset, params, 1).is_err());
    }
}
