//! Single regression tree.
//!
//! Nodes are a tagged variant: a leaf carries the mean target of the
//! training rows that reached it, a split routes `x[feature] <= threshold`
//! left and everything else right. Splits minimise the summed squared
//! residuals of the two children over a random feature subset drawn per
//! node.

use crate::error::{AppError, Result};
use crate::ml::dataset::TrainingDataset;
use crate::ml::features::{Feature, ScaledVector, FEATURE_COUNT};
use crate::ml::models::ForestParams;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// A node in a regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature: Feature,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    pub const fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn count(&self) -> (usize, usize) {
        match self {
            TreeNode::Leaf { .. } => (1, 1),
            TreeNode::Split { left, right, .. } => {
                let (ln, ll) = left.count();
                let (rn, rl) = right.count();
                (1 + ln + rn, ll + rl)
            }
        }
    }
}

/// A fitted regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: TreeNode,

    /// Total squared-error reduction contributed by each feature
    importance: [f64; FEATURE_COUNT],
}

impl RegressionTree {
    /// Grow a tree on the given rows of `dataset`. Rows may repeat.
    pub fn fit(
        dataset: &TrainingDataset,
        rows: &[usize],
        params: &ForestParams,
        rng: &mut StdRng,
    ) -> Result<Self> {
        if rows.is_empty() {
            return Err(AppError::Training("cannot grow a tree on zero rows".to_string()));
        }

        let mut builder = TreeBuilder {
            dataset,
            params,
            importance: [0.0; FEATURE_COUNT],
        };
        let root = builder.grow(rows, 0, rng);

        Ok(Self {
            root,
            importance: builder.importance,
        })
    }

    /// Walk from the root to a leaf and return its value
    pub fn predict(&self, x: &ScaledVector) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x.get(*feature) <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Longest root-to-leaf path
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn n_nodes(&self) -> usize {
        self.root.count().0
    }

    pub fn n_leaves(&self) -> usize {
        self.root.count().1
    }

    pub fn importance(&self) -> &[f64; FEATURE_COUNT] {
        &self.importance
    }
}

struct SplitCandidate {
    feature: Feature,
    threshold: f64,
    sse: f64,
}

struct TreeBuilder<'a> {
    dataset: &'a TrainingDataset,
    params: &'a ForestParams,
    importance: [f64; FEATURE_COUNT],
}

impl TreeBuilder<'_> {
    fn grow(&mut self, rows: &[usize], depth: usize, rng: &mut StdRng) -> TreeNode {
        let n = rows.len();
        let (sum, sum_sq) = rows.iter().fold((0.0, 0.0), |(s, sq), &i| {
            let y = self.dataset.targets[i];
            (s + y, sq + y * y)
        });
        let mean = sum / n as f64;
        let node_sse = (sum_sq - sum * sum / n as f64).max(0.0);

        let leaf = TreeNode::Leaf {
            value: mean,
            n_samples: n,
        };

        if depth >= self.params.max_depth
            || n < self.params.min_samples_split.max(2)
            || n < 2 * self.params.min_samples_leaf.max(1)
            || node_sse <= f64::EPSILON
        {
            return leaf;
        }

        let Some(best) = self.best_split(rows, sum, sum_sq, rng) else {
            return leaf;
        };
        if best.sse >= node_sse {
            return leaf;
        }

        self.importance[best.feature.index()] += node_sse - best.sse;

        let column = best.feature.index();
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&i| self.dataset.features[[i, column]] <= best.threshold);

        let left = self.grow(&left_rows, depth + 1, rng);
        let right = self.grow(&right_rows, depth + 1, rng);

        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn best_split(
        &self,
        rows: &[usize],
        sum: f64,
        sum_sq: f64,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let n = rows.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let subset = rand::seq::index::sample(rng, FEATURE_COUNT, self.params.feature_subset_size());

        let mut best: Option<SplitCandidate> = None;
        let mut column: Vec<(f64, f64)> = Vec::with_capacity(n);

        for j in subset.iter() {
            let feature = Feature::from_index(j)?;

            column.clear();
            column.extend(
                rows.iter()
                    .map(|&i| (self.dataset.features[[i, j]], self.dataset.targets[i])),
            );
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 0..n - 1 {
                let (value, target) = column[pos];
                left_sum += target;
                left_sq += target * target;

                let n_left = pos + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let next = column[pos + 1].0;
                if next <= value {
                    continue;
                }

                let right_sum = sum - left_sum;
                let right_sq = sum_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / n_left as f64)
                    + (right_sq - right_sum * right_sum / n_right as f64);

                if best.as_ref().map_or(true, |b| sse < b.sse) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: value + (next - value) / 2.0,
                        sse,
                    });
                }
            }
        }

        best
    }
}
