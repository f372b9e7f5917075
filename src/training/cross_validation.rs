//! Stratified k-fold splitter

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Folds that keep each class's share of rows
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    shuffle: bool,
    random_state: Option<u64>,
}

impl StratifiedKFold {
    /// Shuffled folds; balanced sets list synthetic rows last, so
    /// unshuffled folds would not mix them
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: true,
            random_state: None,
        }
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Generate one split per fold over the rows of `y`
    pub fn split(&self, y: &Array1<i64>) -> Result<Vec<CVSplit>> {
        let n_samples = y.len();
        let n_splits = self.n_splits;
        if n_splits < 2 {
            return Err(PipelineError::ValidationError("n_splits must be at least 2".to_string()));
        }
        if n_samples < n_splits {
            return Err(PipelineError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &class) in y.iter().enumerate() {
            class_indices.entry(class).or_default().push(idx);
        }

        if self.shuffle {
            let mut rng = self.rng();
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Deal rows round-robin, continuing the fold cursor across classes so
        // fold sizes differ by at most one
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut cursor = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[cursor % n_splits].push(idx);
                cursor += 1;
            }
        }
        for fold in &mut folds {
            fold.sort_unstable();
        }

        Ok((0..n_splits)
            .map(|fold_idx| CVSplit {
                test_indices: folds[fold_idx].clone(),
                train_indices: {
                    let mut train: Vec<usize> = folds
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i != fold_idx)
                        .flat_map(|(_, f)| f.iter().copied())
                        .collect();
                    train.sort_unstable();
                    train
                },
                fold_idx,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_partition(splits: &[CVSplit], n: usize) {
        let mut seen = HashSet::new();
        for split in splits {
            let train: HashSet<_> = split.train_indices.iter().copied().collect();
            assert!(split.test_indices.iter().all(|i| !train.contains(i)));
            assert_eq!(split.train_indices.len() + split.test_indices.len(), n);
            seen.extend(split.test_indices.iter().copied());
        }
        assert_eq!(seen.len(), n);
    }

    fn labels(n: usize, n_zero: usize) -> Array1<i64> {
        Array1::from_vec((0..n).map(|i| if i < n_zero { 0 } else { 1 }).collect())
    }

    #[test]
    fn test_keeps_class_ratio() {
        let y = labels(40, 30);
        let splits = StratifiedKFold::new(2).with_random_state(42).split(&y).unwrap();

        assert_partition(&splits, 40);
        for split in &splits {
            let positives = split.test_indices.iter().filter(|&&i| y[i] == 1).count();
            assert_eq!(positives, 5);
            assert_eq!(split.test_indices.len(), 20);
        }
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let y = labels(20, 12);
        let cv = StratifiedKFold::new(4).with_random_state(42);
        let a = cv.split(&y).unwrap();
        let b = cv.split(&y).unwrap();
        assert_eq!(a[0].test_indices, b[0].test_indices);
        assert_partition(&a, 20);
    }

    #[test]
    fn test_unshuffled_deals_in_row_order() {
        let y = labels(6, 3);
        let splits = StratifiedKFold::new(3).with_shuffle(false).split(&y).unwrap();
        assert_eq!(splits[0].test_indices, vec![0, 3]);
        assert_eq!(splits[2].test_indices, vec![2, 5]);
    }

    #[test]
    fn test_too_few_samples() {
        assert!(StratifiedKFold::new(5).split(&labels(3, 1)).is_err());
        assert!(StratifiedKFold::new(1).split(&labels(3, 1)).is_err());
    }
}
