//! Search space definition for hyperparameters

use crate::error::{PipelineError, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Type of parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Continuous float drawn uniformly from `[low, high)`
    Float { low: f64, high: f64 },
    /// Integer drawn uniformly from `[low, high]`
    Int { low: i64, high: i64 },
    /// One of a fixed set of labels
    Categorical { choices: Vec<String> },
}

/// A single hyperparameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float { low, high },
        }
    }

    /// Integer parameter with both bounds inclusive
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int { low, high },
        }
    }

    pub fn categorical<S: Into<String>>(name: impl Into<String>, choices: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Categorical {
                choices: choices.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ok = match &self.param_type {
            ParameterType::Float { low, high } => low.is_finite() && high.is_finite() && low < high,
            ParameterType::Int { low, high } => low <= high,
            ParameterType::Categorical { choices } => !choices.is_empty(),
        };
        if ok {
            Ok(())
        } else {
            Err(PipelineError::ValidationError(format!(
                "Parameter '{}' has an empty range: {:?}",
                self.name, self.param_type
            )))
        }
    }

    /// Sample a random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match &self.param_type {
            ParameterType::Float { low, high } => ParameterValue::Float(rng.gen_range(*low..*high)),
            ParameterType::Int { low, high } => ParameterValue::Int(rng.gen_range(*low..=*high)),
            ParameterType::Categorical { choices } => {
                let idx = rng.gen_range(0..choices.len());
                ParameterValue::String(choices[idx].clone())
            }
        }
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    String(String),
}

impl ParameterValue {
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{:.6}", v),
            ParameterValue::String(v) => write!(f, "{}", v),
        }
    }
}

/// Sampled configuration, keyed by parameter name
pub type TrialParams = BTreeMap<String, ParameterValue>;

/// Render params as `a=1, b=x` for log lines
pub fn format_params(params: &TrialParams) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Search space for hyperparameter optimization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self { parameters: Vec::new() }
    }

    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::float(name, low, high))
    }

    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::int(name, low, high))
    }

    pub fn categorical<S: Into<String>>(self, name: impl Into<String>, choices: impl IntoIterator<Item = S>) -> Self {
        self.add(Parameter::categorical(name, choices))
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn validate(&self) -> Result<()> {
        self.parameters.iter().try_for_each(Parameter::validate)
    }

    /// Draw one value per parameter, in declaration order
    pub fn sample(&self, rng: &mut impl Rng) -> TrialParams {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_search_space_builder() {
        let space = SearchSpace::new()
            .float("learning_rate", 0.01, 0.21)
            .int("n_estimators", 100, 499)
            .categorical("boosting_type", ["gbdt", "goss"]);

        assert_eq!(space.len(), 3);
        assert!(space.validate().is_ok());
    }

    #[test]
    fn test_samples_stay_in_bounds() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let lr = Parameter::float("lr", 0.01, 0.21);
        let depth = Parameter::int("max_depth", 5, 49);

        for _ in 0..200 {
            let v = lr.sample(&mut rng).as_float().unwrap();
            assert!((0.01..0.21).contains(&v));
            let d = depth.sample(&mut rng).as_int().unwrap();
            assert!((5..=49).contains(&d));
        }
    }

    #[test]
    fn test_categorical_sampling() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let param = Parameter::categorical("boosting_type", ["gbdt", "goss"]);
        let val = param.sample(&mut rng);
        assert!(["gbdt", "goss"].contains(&val.as_string().unwrap()));
    }

    #[test]
    fn test_empty_ranges_rejected() {
        assert!(Parameter::float("lr", 0.2, 0.2).validate().is_err());
        assert!(Parameter::int("n", 5, 4).validate().is_err());
        assert!(Parameter::categorical("c", Vec::<String>::new()).validate().is_err());
    }

    #[test]
    fn test_format_params_is_sorted() {
        let mut params = TrialParams::new();
        params.insert("num_leaves".into(), ParameterValue::Int(31));
        params.insert("boosting_type".into(), ParameterValue::String("goss".into()));
        assert_eq!(format_params(&params), "boosting_type=goss, num_leaves=31");
    }
}
