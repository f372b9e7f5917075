//! Hyperparameter search
//!
//! A [`SearchSpace`] describes the distributions, [`RandomSearch`] samples
//! them with a seeded RNG and keeps the best trial in a [`Study`].

mod random_search;
mod search_space;

pub use random_search::{OptimizeDirection, RandomSampler, RandomSearch, Study, TrialResult};
pub use search_space::{format_params, Parameter, ParameterType, ParameterValue, SearchSpace, TrialParams};
