//! Hyperparameter search spaces for model tuning

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Type of parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Continuous float parameter
    Float {
        low: f64,
        high: f64,
        log_scale: bool,
    },
    /// Integer parameter, inclusive bounds
    Int { low: i64, high: i64 },
    /// Categorical parameter
    Categorical { choices: Vec<String> },
    /// Boolean parameter
    Boolean,
}

/// A single hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    /// Create a float parameter
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float {
                low,
                high,
                log_scale: false,
            },
        }
    }

    /// Create a log-scale float parameter
    pub fn log_float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float {
                low,
                high,
                log_scale: true,
            },
        }
    }

    /// Create an integer parameter
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int { low, high },
        }
    }

    /// Create a categorical parameter
    pub fn categorical(name: impl Into<String>, choices: &[&str]) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Categorical {
                choices: choices.iter().map(|c| c.to_string()).collect(),
            },
        }
    }

    /// Create a boolean parameter
    pub fn boolean(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Boolean,
        }
    }

    /// Sample a random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match &self.param_type {
            ParameterType::Float { low, high, log_scale } => {
                let val = if *log_scale {
                    let (log_low, log_high) = (low.ln(), high.ln());
                    (rng.gen::<f64>() * (log_high - log_low) + log_low).exp()
                } else {
                    rng.gen::<f64>() * (high - low) + low
                };
                ParameterValue::Float(val.clamp(*low, *high))
            }
            ParameterType::Int { low, high } => ParameterValue::Int(rng.gen_range(*low..=*high)),
            ParameterType::Categorical { choices } => {
                let idx = rng.gen_range(0..choices.len());
                ParameterValue::String(choices[idx].clone())
            }
            ParameterType::Boolean => ParameterValue::Bool(rng.gen()),
        }
    }
}

/// Hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) => Some(v.round() as i64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(v) => write!(f, "{}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::String(v) => f.write_str(v),
        }
    }
}

/// Named hyperparameter values, ordered by name
pub type HyperParams = BTreeMap<String, ParameterValue>;

/// Search space for hyperparameter tuning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    /// Create a new empty search space
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the search space
    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::float(name, low, high))
    }

    pub fn log_float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::log_float(name, low, high))
    }

    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::int(name, low, high))
    }

    pub fn categorical(self, name: impl Into<String>, choices: &[&str]) -> Self {
        self.add(Parameter::categorical(name, choices))
    }

    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.add(Parameter::boolean(name))
    }

    /// Get all parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Sample a random configuration, parameters drawn in declaration order
    pub fn sample(&self, rng: &mut impl Rng) -> HyperParams {
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
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_search_space_builder() {
        let space = SearchSpace::new()
            .float("learning_rate", 0.001, 0.1)
            .int("n_estimators", 10, 1000)
            .categorical("criterion", &["gini", "entropy"])
            .boolean("bootstrap");

        assert_eq!(space.len(), 4);
    }

    #[test]
    fn test_log_scale_sampling_stays_in_range() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let param = Parameter::log_float("c", 0.0001, 0.1);
        for _ in 0..100 {
            let v = param.sample(&mut rng).as_float().unwrap();
            assert!((0.0001..=0.1).contains(&v));
        }
    }

    #[test]
    fn test_sampling_is_seeded() {
        let space = SearchSpace::new().int("k", 1, 30).categorical("w", &["a", "b"]);
        let a = space.sample(&mut Xoshiro256PlusPlus::seed_from_u64(5));
        let b = space.sample(&mut Xoshiro256PlusPlus::seed_from_u64(5));
        assert_eq!(a, b);
    }

    #[test]
    fn test_untagged_serialization() {
        let mut params = HyperParams::new();
        params.insert("max_depth".to_string(), ParameterValue::Int(4));
        params.insert("criterion".to_string(), ParameterValue::String("gini".to_string()));
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"criterion":"gini","max_depth":4}"#);

        let back: HyperParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
