//! Gini decision tree
//!
//! Grown by the random forest that ranks features; its output is the
//! impurity decrease credited to each feature.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node predicting the majority class of its rows
    Leaf { class: i64, n_samples: usize },
    /// Internal node; rows with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}

struct BestSplit {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split; `None` tries all of them
    pub max_features: Option<usize>,
    pub random_state: Option<u64>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    classes: Vec<i64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: None,
            n_features: 0,
            feature_importances: None,
            classes: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(PipelineError::ValidationError(
                "Cannot fit a tree on an empty matrix".to_string(),
            ));
        }

        let mut classes: Vec<i64> = y.iter().copied().collect();
        classes.sort_unstable();
        classes.dedup();

        let encoded: Vec<usize> = y
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or(0))
            .collect();

        self.n_features = n_features;
        self.classes = classes;

        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, &encoded, &indices, 0, &mut importances, &mut rng);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn class_counts(&self, y: &[usize], indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.classes.len()];
        for &i in indices {
            counts[y[i]] += 1;
        }
        counts
    }

    fn majority(&self, counts: &[usize]) -> i64 {
        // First class wins ties
        let mut best = 0;
        for (k, &c) in counts.iter().enumerate() {
            if c > counts[best] {
                best = k;
            }
        }
        self.classes.get(best).copied().unwrap_or(0)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let counts = self.class_counts(y, indices);
        let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure;

        if should_stop {
            return TreeNode::Leaf { class: self.majority(&counts), n_samples };
        }

        let parent_impurity = gini(&counts, n_samples);
        let candidates = self.candidate_features(rng);

        match self.find_best_split(x, y, indices, &candidates, parent_impurity) {
            Some(best) => {
                let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

                importances[best.feature_idx] += n_samples as f64 * best.gain;

                let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances, rng));
                let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances, rng));

                TreeNode::Split {
                    feature_idx: best.feature_idx,
                    threshold: best.threshold,
                    left,
                    right,
                    n_samples,
                    impurity: parent_impurity,
                }
            }
            None => TreeNode::Leaf { class: self.majority(&counts), n_samples },
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut picked = rand::seq::index::sample(rng, self.n_features, k).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Sorted sweep per candidate feature, scanned in parallel
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        indices: &[usize],
        candidates: &[usize],
        parent_impurity: f64,
    ) -> Option<BestSplit> {
        let n_classes = self.classes.len();
        let n = indices.len();
        let min_leaf = self.min_samples_leaf;

        let per_feature: Vec<Option<BestSplit>> = candidates
            .par_iter()
            .map(|&feature_idx| {
                let mut pairs: Vec<(f64, usize)> =
                    indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

                let mut right = vec![0usize; n_classes];
                for &(_, c) in &pairs {
                    right[c] += 1;
                }
                let mut left = vec![0usize; n_classes];

                let mut best: Option<BestSplit> = None;
                for pos in 0..n - 1 {
                    let (value, class) = pairs[pos];
                    left[class] += 1;
                    right[class] -= 1;

                    let next = pairs[pos + 1].0;
                    if value >= next {
                        continue;
                    }
                    let n_left = pos + 1;
                    let n_right = n - n_left;
                    if n_left < min_leaf || n_right < min_leaf {
                        continue;
                    }

                    let weighted = (n_left as f64 * gini(&left, n_left)
                        + n_right as f64 * gini(&right, n_right))
                        / n as f64;
                    let gain = parent_impurity - weighted;

                    if gain > best.as_ref().map_or(1e-12, |b| b.gain) {
                        best = Some(BestSplit {
                            feature_idx,
                            threshold: (value + next) / 2.0,
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        // Lowest feature index wins ties so results do not depend on scheduling
        per_feature.into_iter().flatten().fold(None, |acc: Option<BestSplit>, cand| match acc {
            Some(b) if b.gain >= cand.gain => Some(b),
            _ => Some(cand),
        })
    }

    /// Normalised impurity decrease per feature
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_separable_needs_one_split() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0i64, 0, 1, 1];

        let mut tree = DecisionTree::new().with_random_state(0);
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.get_depth(), 2);
        assert_eq!(tree.feature_importances().unwrap(), &array![1.0, 0.0]);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0i64, 1, 0, 1];

        let mut tree = DecisionTree::new().with_max_depth(2).with_random_state(0);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 3);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0i64, 0, 1, 1];

        let mut tree = DecisionTree::new().with_random_state(0);
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_arbitrary_labels() {
        let x = array![[0.0, 4.0], [1.0, 4.0], [2.0, 4.0], [10.0, 4.0], [11.0, 4.0], [12.0, 4.0]];
        let y = array![5i64, 5, 5, -3, -3, -3];

        let mut tree = DecisionTree::new().with_random_state(3);
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.get_depth(), 2);
        assert_eq!(tree.feature_importances().unwrap()[0], 1.0);
    }

    #[test]
    fn test_unfitted_tree_has_no_importances() {
        let tree = DecisionTree::new();
        assert!(tree.feature_importances().is_none());
        assert_eq!(tree.get_depth(), 0);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut tree = DecisionTree::new();
        let result = tree.fit(&array![[1.0], [2.0]], &array![0i64]);
        assert!(matches!(result, Err(PipelineError::ShapeError { .. })));
    }
}
