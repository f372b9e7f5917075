//! SMOTE oversampling

use crate::error::{PipelineError, Result};
use crate::synthetic::{class_counts, class_indices, ResampleResult, Sampler};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

/// Ordered float for BinaryHeap-based partial sort
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    // Index breaks distance ties so the neighbour set is deterministic
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}

/// SMOTE (Synthetic Minority Over-sampling Technique)
///
/// Every class is oversampled up to the majority count. A synthetic row is
/// placed at a uniform random point on the segment between a class member
/// and one of its `k` nearest same-class neighbours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SMOTE {
    k_neighbors: usize,
    seed: Option<u64>,
    target_counts: Option<BTreeMap<i64, usize>>,
}

impl SMOTE {
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            seed: None,
            target_counts: None,
        }
    }

    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Per-class row counts after resampling, available once fitted
    pub fn target_counts(&self) -> Option<&BTreeMap<i64, usize>> {
        self.target_counts.as_ref()
    }

    fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).powi(2)).sum()
    }

    /// `k` nearest members of `members` to `members[pos]`, excluding that row itself
    fn find_neighbors(x: &Array2<f64>, members: &[usize], pos: usize, k: usize) -> Vec<usize> {
        let point = x.row(members[pos]);
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);

        for (j, &row) in members.iter().enumerate() {
            if j == pos {
                continue;
            }
            let candidate = DistIdx(Self::squared_distance(point, x.row(row)), j);
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(worst) = heap.peek() {
                if candidate < *worst {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        let mut neighbors: Vec<usize> = heap.into_sorted_vec().into_iter().map(|d| d.1).collect();
        neighbors.truncate(k);
        neighbors
    }

    fn generate_sample<R: Rng>(point: ArrayView1<f64>, neighbor: ArrayView1<f64>, rng: &mut R) -> Vec<f64> {
        let gap: f64 = rng.gen();
        point
            .iter()
            .zip(neighbor.iter())
            .map(|(&p, &n)| p + gap * (n - p))
            .collect()
    }
}

impl Default for SMOTE {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SMOTE {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }

        let counts = class_counts(y);
        if counts.len() < 2 {
            return Err(PipelineError::ValidationError(format!(
                "Need at least 2 classes for SMOTE, found {}",
                counts.len()
            )));
        }

        let max_count = counts.values().copied().max().unwrap_or(0);
        for (&class, &count) in &counts {
            if count < max_count && count < 2 {
                return Err(PipelineError::ValidationError(format!(
                    "Class {} has {} row(s); SMOTE needs at least 2 to interpolate",
                    class, count
                )));
            }
        }

        self.target_counts = Some(counts.keys().map(|&class| (class, max_count)).collect());
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        let targets = self
            .target_counts
            .as_ref()
            .ok_or_else(|| PipelineError::ValidationError("SMOTE not fitted".to_string()))?;

        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let indices = class_indices(y);
        let n_features = x.ncols();

        let mut synthetic_x: Vec<f64> = Vec::new();
        let mut synthetic_y: Vec<i64> = Vec::new();
        let mut n_synthetic = BTreeMap::new();

        for (&class, &target_count) in targets {
            let members = indices.get(&class).map(Vec::as_slice).unwrap_or(&[]);
            let n_to_generate = target_count.saturating_sub(members.len());
            n_synthetic.insert(class, n_to_generate);

            if n_to_generate == 0 {
                continue;
            }
            if members.len() < 2 {
                return Err(PipelineError::ValidationError(format!(
                    "Class {} has {} row(s); SMOTE needs at least 2 to interpolate",
                    class,
                    members.len()
                )));
            }

            let k = self.k_neighbors.min(members.len() - 1);
            let mut neighbor_cache: Vec<Option<Vec<usize>>> = vec![None; members.len()];

            for _ in 0..n_to_generate {
                let pos = rng.gen_range(0..members.len());
                let neighbors = neighbor_cache[pos]
                    .get_or_insert_with(|| Self::find_neighbors(x, members, pos, k));
                let neighbor_pos = neighbors[rng.gen_range(0..neighbors.len())];

                let sample = Self::generate_sample(x.row(members[pos]), x.row(members[neighbor_pos]), &mut rng);
                synthetic_x.extend(sample);
                synthetic_y.push(class);
            }
        }

        let n_original = x.nrows();
        let n_total = n_original + synthetic_y.len();
        let result_x = Array2::from_shape_fn((n_total, n_features), |(i, j)| {
            if i < n_original {
                x[[i, j]]
            } else {
                synthetic_x[(i - n_original) * n_features + j]
            }
        });

        let mut all_y: Vec<i64> = y.iter().copied().collect();
        all_y.extend_from_slice(&synthetic_y);

        Ok(ResampleResult {
            x: result_x,
            y: Array1::from_vec(all_y),
            n_synthetic,
        })
    }
}
