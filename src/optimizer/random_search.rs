//! Randomized hyperparameter search

use super::search_space::{format_params, SearchSpace, TrialParams};
use crate::error::{PipelineError, Result};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Whether larger or smaller objective values are better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizeDirection {
    Minimize,
    Maximize,
}

/// Uniform sampler over a [`SearchSpace`]
#[derive(Debug)]
pub struct RandomSampler {
    rng: Xoshiro256PlusPlus,
}

impl RandomSampler {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => Xoshiro256PlusPlus::seed_from_u64(s),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        Self { rng }
    }

    pub fn sample(&mut self, search_space: &SearchSpace) -> TrialParams {
        search_space.sample(&mut self.rng)
    }
}

/// Result of a single trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_id: usize,
    pub params: TrialParams,
    /// Objective value; `None` when the trial failed
    pub value: Option<f64>,
    pub duration_secs: f64,
}

/// All trials of one search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub trials: Vec<TrialResult>,
    pub best_trial_idx: Option<usize>,
    pub total_duration_secs: f64,
    pub direction: OptimizeDirection,
}

impl Study {
    pub fn new(direction: OptimizeDirection) -> Self {
        Self {
            trials: Vec::new(),
            best_trial_idx: None,
            total_duration_secs: 0.0,
            direction,
        }
    }

    pub fn best_trial(&self) -> Option<&TrialResult> {
        self.best_trial_idx.map(|idx| &self.trials[idx])
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().and_then(|t| t.value)
    }

    pub fn best_params(&self) -> Option<&TrialParams> {
        self.best_trial().map(|t| &t.params)
    }

    pub fn n_failed(&self) -> usize {
        self.trials.iter().filter(|t| t.value.is_none()).count()
    }

    /// Record a trial; the earliest trial wins ties
    pub fn add_trial(&mut self, result: TrialResult) {
        let idx = self.trials.len();

        if let Some(value) = result.value {
            let is_better = match self.best_value() {
                None => true,
                Some(best) => match self.direction {
                    OptimizeDirection::Minimize => value < best,
                    OptimizeDirection::Maximize => value > best,
                },
            };
            if is_better {
                self.best_trial_idx = Some(idx);
            }
        }

        self.trials.push(result);
    }
}

/// Draws `n_iter` configurations and keeps the best-scoring one
pub struct RandomSearch {
    search_space: SearchSpace,
    sampler: RandomSampler,
    n_iter: usize,
    direction: OptimizeDirection,
}

impl RandomSearch {
    pub fn new(search_space: SearchSpace, n_iter: usize, random_state: Option<u64>) -> Self {
        Self {
            search_space,
            sampler: RandomSampler::new(random_state),
            n_iter,
            direction: OptimizeDirection::Maximize,
        }
    }

    pub fn with_direction(mut self, direction: OptimizeDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Evaluate the objective on every sampled configuration.
    ///
    /// All configurations are drawn before any is evaluated, so the sequence
    /// depends only on the seed. A failing trial is logged and skipped; the
    /// search fails only if every trial does.
    pub fn optimize<F>(&mut self, mut objective: F) -> Result<Study>
    where
        F: FnMut(&TrialParams) -> Result<f64>,
    {
        if self.n_iter == 0 {
            return Err(PipelineError::ValidationError("n_iter must be at least 1".to_string()));
        }
        self.search_space.validate()?;

        let start = Instant::now();
        let candidates: Vec<TrialParams> = (0..self.n_iter)
            .map(|_| self.sampler.sample(&self.search_space))
            .collect();

        let mut study = Study::new(self.direction);
        let mut last_error = None;

        for (trial_id, params) in candidates.into_iter().enumerate() {
            let trial_start = Instant::now();
            let value = match objective(&params) {
                Ok(value) if value.is_finite() => {
                    info!(trial = trial_id, score = value, params = %format_params(&params), "Trial finished");
                    Some(value)
                }
                Ok(value) => {
                    warn!(trial = trial_id, score = value, "Trial produced a non-finite score");
                    None
                }
                Err(e) => {
                    warn!(trial = trial_id, error = %e, params = %format_params(&params), "Trial failed");
                    last_error = Some(e);
                    None
                }
            };

            study.add_trial(TrialResult {
                trial_id,
                params,
                value,
                duration_secs: trial_start.elapsed().as_secs_f64(),
            });
        }

        study.total_duration_secs = start.elapsed().as_secs_f64();

        if study.best_trial_idx.is_none() {
            let message = format!("All {} trials failed", study.trials.len());
            return Err(match last_error {
                Some(e) => PipelineError::training(message, e),
                None => PipelineError::TrainingError { message, source: None },
            });
        }

        Ok(study)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> SearchSpace {
        SearchSpace::new().float("x", -1.0, 1.0).int("n", 1, 10)
    }

    #[test]
    fn test_maximize_picks_best() {
        let mut search = RandomSearch::new(space(), 20, Some(42));
        let study = search
            .optimize(|p| {
                let x = p["x"].as_float().unwrap();
                Ok(-(x * x))
            })
            .unwrap();

        assert_eq!(study.trials.len(), 20);
        let best = study.best_value().unwrap();
        assert!(study.trials.iter().all(|t| t.value.unwrap() <= best));
    }

    #[test]
    fn test_same_seed_same_candidates() {
        let collect = |seed| {
            let mut seen = Vec::new();
            RandomSearch::new(space(), 5, Some(seed))
                .optimize(|p| {
                    seen.push(p.clone());
                    Ok(0.0)
                })
                .unwrap();
            seen
        };
        assert_eq!(collect(42), collect(42));
    }

    #[test]
    fn test_failed_trials_are_skipped() {
        let mut calls = 0;
        let mut search = RandomSearch::new(space(), 6, Some(1));
        let study = search
            .optimize(|_| {
                calls += 1;
                if calls % 2 == 0 {
                    Err(PipelineError::ModelNotFitted)
                } else {
                    Ok(calls as f64)
                }
            })
            .unwrap();

        assert_eq!(study.trials.len(), 6);
        assert_eq!(study.n_failed(), 3);
        assert_eq!(study.best_trial_idx, Some(4));
        assert_eq!(study.best_value(), Some(5.0));
    }

    #[test]
    fn test_all_failed_is_training_error() {
        let mut search = RandomSearch::new(space(), 3, Some(1));
        let err = search.optimize(|_| Err(PipelineError::ModelNotFitted)).unwrap_err();
        assert!(err.is_training());
    }

    #[test]
    fn test_minimize() {
        let mut study = Study::new(OptimizeDirection::Minimize);
        for (i, v) in [3.0, 1.0, 2.0, 1.0].into_iter().enumerate() {
            study.add_trial(TrialResult { trial_id: i, params: TrialParams::new(), value: Some(v), duration_secs: 0.0 });
        }
        assert_eq!(study.best_trial_idx, Some(1));
    }
}
