//! Candidate model catalog
//!
//! Maps the short model ids used in `models_to_compare` onto estimator
//! builders, default hyperparameters and tuning search spaces.

use super::classifier::TrainedClassifier;
use super::decision_tree::{Criterion, DecisionTree};
use super::dummy::DummyClassifier;
use super::knn::{KNNClassifier, WeightScheme};
use super::linear_models::{LogisticRegression, RidgeClassifier};
use super::naive_bayes::GaussianNaiveBayes;
use super::random_forest::{MaxFeatures, RandomForest};
use super::search_space::{HyperParams, ParameterValue, SearchSpace};
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Model family available to the comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    LogisticRegression,
    RidgeClassifier,
    KNN,
    NaiveBayes,
    DecisionTree,
    RandomForest,
    ExtraTrees,
    Dummy,
}

impl ModelKind {
    pub const ALL: [ModelKind; 8] = [
        ModelKind::LogisticRegression,
        ModelKind::RidgeClassifier,
        ModelKind::KNN,
        ModelKind::NaiveBayes,
        ModelKind::DecisionTree,
        ModelKind::RandomForest,
        ModelKind::ExtraTrees,
        ModelKind::Dummy,
    ];

    /// Short id used in configuration and run tags
    pub fn id(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "lr",
            ModelKind::RidgeClassifier => "ridge",
            ModelKind::KNN => "knn",
            ModelKind::NaiveBayes => "nb",
            ModelKind::DecisionTree => "dt",
            ModelKind::RandomForest => "rf",
            ModelKind::ExtraTrees => "et",
            ModelKind::Dummy => "dummy",
        }
    }

    /// Human-readable name, used as the run name
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "Logistic Regression",
            ModelKind::RidgeClassifier => "Ridge Classifier",
            ModelKind::KNN => "K Neighbors Classifier",
            ModelKind::NaiveBayes => "Naive Bayes",
            ModelKind::DecisionTree => "Decision Tree Classifier",
            ModelKind::RandomForest => "Random Forest Classifier",
            ModelKind::ExtraTrees => "Extra Trees Classifier",
            ModelKind::Dummy => "Dummy Classifier",
        }
    }

    /// Default hyperparameters
    pub fn default_params(&self) -> HyperParams {
        let mut p = HyperParams::new();
        let mut set = |k: &str, v: ParameterValue| {
            p.insert(k.to_string(), v);
        };
        match self {
            ModelKind::LogisticRegression => {
                set("C", ParameterValue::Float(1.0));
                set("max_iter", ParameterValue::Int(1000));
            }
            ModelKind::RidgeClassifier => set("alpha", ParameterValue::Float(1.0)),
            ModelKind::KNN => {
                set("n_neighbors", ParameterValue::Int(5));
                set("weights", ParameterValue::String("uniform".to_string()));
            }
            ModelKind::NaiveBayes => set("var_smoothing", ParameterValue::Float(1e-9)),
            ModelKind::DecisionTree => {
                set("criterion", ParameterValue::String("gini".to_string()));
                set("min_samples_leaf", ParameterValue::Int(1));
            }
            ModelKind::RandomForest | ModelKind::ExtraTrees => {
                set("n_estimators", ParameterValue::Int(100));
                set("criterion", ParameterValue::String("gini".to_string()));
                set("min_samples_leaf", ParameterValue::Int(1));
                set("max_features", ParameterValue::String("sqrt".to_string()));
                set(
                    "bootstrap",
                    ParameterValue::Bool(*self == ModelKind::RandomForest),
                );
            }
            ModelKind::Dummy => set("strategy", ParameterValue::String("prior".to_string())),
        }
        p
    }

    /// Random-search space used by tuning
    pub fn search_space(&self) -> SearchSpace {
        match self {
            ModelKind::LogisticRegression => SearchSpace::new().log_float("C", 0.001, 10.0),
            ModelKind::RidgeClassifier => SearchSpace::new().log_float("alpha", 0.001, 10.0),
            ModelKind::KNN => SearchSpace::new()
                .int("n_neighbors", 1, 30)
                .categorical("weights", &["uniform", "distance"]),
            ModelKind::NaiveBayes => SearchSpace::new().log_float("var_smoothing", 1e-9, 1.0),
            ModelKind::DecisionTree => SearchSpace::new()
                .int("max_depth", 1, 16)
                .int("min_samples_leaf", 1, 10)
                .categorical("criterion", &["gini", "entropy"]),
            ModelKind::RandomForest | ModelKind::ExtraTrees => SearchSpace::new()
                .int("n_estimators", 10, 300)
                .int("max_depth", 1, 16)
                .int("min_samples_leaf", 1, 10)
                .categorical("criterion", &["gini", "entropy"])
                .categorical("max_features", &["sqrt", "log2", "all"]),
            ModelKind::Dummy => SearchSpace::new(),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ModelKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let id = s.trim().to_lowercase();
        ModelKind::ALL
            .iter()
            .copied()
            .find(|k| k.id() == id)
            .ok_or_else(|| PipelineError::UnknownModel(s.to_string()))
    }
}

/// A model family plus concrete hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorSpec {
    pub kind: ModelKind,
    pub params: HyperParams,
}

impl EstimatorSpec {
    /// Spec with the catalog defaults
    pub fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            params: kind.default_params(),
        }
    }

    /// Override some hyperparameters, keeping the rest
    pub fn with_params(mut self, overrides: HyperParams) -> Self {
        self.params.extend(overrides);
        self
    }

    fn float(&self, name: &str) -> Result<Option<f64>> {
        self.params
            .get(name)
            .map(|v| v.as_float().ok_or_else(|| self.invalid(name, v, "expected a number")))
            .transpose()
    }

    fn int(&self, name: &str) -> Result<Option<usize>> {
        self.params
            .get(name)
            .map(|v| match v.as_int() {
                Some(i) if i >= 0 => Ok(i as usize),
                _ => Err(self.invalid(name, v, "expected a non-negative integer")),
            })
            .transpose()
    }

    fn text(&self, name: &str) -> Result<Option<&str>> {
        self.params
            .get(name)
            .map(|v| v.as_string().ok_or_else(|| self.invalid(name, v, "expected a string")))
            .transpose()
    }

    fn flag(&self, name: &str) -> Result<Option<bool>> {
        self.params
            .get(name)
            .map(|v| v.as_bool().ok_or_else(|| self.invalid(name, v, "expected a boolean")))
            .transpose()
    }

    fn invalid(&self, name: &str, value: &ParameterValue, reason: &str) -> PipelineError {
        PipelineError::InvalidParameter {
            name: format!("{}.{}", self.kind.id(), name),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn criterion(&self) -> Result<Criterion> {
        match self.text("criterion")? {
            None | Some("gini") => Ok(Criterion::Gini),
            Some("entropy") => Ok(Criterion::Entropy),
            Some(other) => Err(self.invalid(
                "criterion",
                &ParameterValue::String(other.to_string()),
                "expected gini or entropy",
            )),
        }
    }

    /// Build an unfitted classifier seeded with `seed`
    pub fn build(&self, seed: u64) -> Result<TrainedClassifier> {
        let model = match self.kind {
            ModelKind::LogisticRegression => {
                let mut m = LogisticRegression::new();
                if let Some(c) = self.float("C")? {
                    m = m.with_c(c);
                }
                if let Some(max_iter) = self.int("max_iter")? {
                    m = m.with_max_iter(max_iter);
                }
                TrainedClassifier::LogisticRegression(m)
            }
            ModelKind::RidgeClassifier => TrainedClassifier::RidgeClassifier(RidgeClassifier::new(
                self.float("alpha")?.unwrap_or(1.0),
            )),
            ModelKind::KNN => {
                let weights = match self.text("weights")? {
                    None | Some("uniform") => WeightScheme::Uniform,
                    Some("distance") => WeightScheme::Distance,
                    Some(other) => {
                        return Err(self.invalid(
                            "weights",
                            &ParameterValue::String(other.to_string()),
                            "expected uniform or distance",
                        ))
                    }
                };
                let k = self.int("n_neighbors")?.unwrap_or(5);
                TrainedClassifier::KNNClassifier(KNNClassifier::with_k(k).with_weights(weights))
            }
            ModelKind::NaiveBayes => TrainedClassifier::GaussianNaiveBayes(
                GaussianNaiveBayes::new()
                    .with_var_smoothing(self.float("var_smoothing")?.unwrap_or(1e-9)),
            ),
            ModelKind::DecisionTree => TrainedClassifier::DecisionTree(
                DecisionTree::new()
                    .with_max_depth(self.int("max_depth")?)
                    .with_min_samples_leaf(self.int("min_samples_leaf")?.unwrap_or(1))
                    .with_criterion(self.criterion()?)
                    .with_random_state(seed),
            ),
            ModelKind::RandomForest | ModelKind::ExtraTrees => {
                let n_estimators = self.int("n_estimators")?.unwrap_or(100);
                let mut m = if self.kind == ModelKind::ExtraTrees {
                    RandomForest::extra_trees(n_estimators)
                } else {
                    RandomForest::new(n_estimators)
                };
                let max_features = match self.text("max_features")? {
                    None | Some("sqrt") => MaxFeatures::Sqrt,
                    Some("log2") => MaxFeatures::Log2,
                    Some("all") => MaxFeatures::All,
                    Some(other) => {
                        return Err(self.invalid(
                            "max_features",
                            &ParameterValue::String(other.to_string()),
                            "expected sqrt, log2 or all",
                        ))
                    }
                };
                if let Some(bootstrap) = self.flag("bootstrap")? {
                    m.bootstrap = bootstrap;
                }
                TrainedClassifier::RandomForest(
                    m.with_max_depth(self.int("max_depth")?)
                        .with_min_samples_leaf(self.int("min_samples_leaf")?.unwrap_or(1))
                        .with_criterion(self.criterion()?)
                        .with_max_features(max_features)
                        .with_random_state(seed),
                )
            }
            ModelKind::Dummy => TrainedClassifier::Dummy(DummyClassifier::new()),
        };
        Ok(model)
    }

    /// Hyperparameters as string pairs for run logging
    pub fn param_strings(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::classifier::Classifier;
    use ndarray::array;

    #[test]
    fn test_ids_round_trip() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.id().parse::<ModelKind>().unwrap(), kind);
        }
        assert_eq!(" RF ".parse::<ModelKind>().unwrap(), ModelKind::RandomForest);
        assert!(matches!(
            "xgboost".parse::<ModelKind>(),
            Err(PipelineError::UnknownModel(ref id)) if id == "xgboost"
        ));
    }

    #[test]
    fn test_every_kind_builds_and_fits() {
        let x = array![[0.0, 1.0], [0.2, 0.8], [1.0, 0.0], [0.9, 0.1]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        for kind in ModelKind::ALL {
            let mut model = EstimatorSpec::new(kind).build(42).unwrap();
            model.fit(&x, &y).unwrap();
            let p = model.predict_proba(&x).unwrap();
            assert_eq!(p.len(), 4, "{} output length", kind);
            assert!(p.iter().all(|v| (0.0..=1.0).contains(v)), "{} probabilities", kind);
        }
    }

    #[test]
    fn test_sampled_params_build() {
        use rand::SeedableRng;
        let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(1);
        for kind in ModelKind::ALL {
            let sampled = kind.search_space().sample(&mut rng);
            assert!(EstimatorSpec::new(kind).with_params(sampled).build(0).is_ok());
        }
    }

    #[test]
    fn test_bad_param_type() {
        let mut overrides = HyperParams::new();
        overrides.insert("max_depth".to_string(), ParameterValue::String("deep".to_string()));
        let err = EstimatorSpec::new(ModelKind::DecisionTree)
            .with_params(overrides)
            .build(0)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { .. }));
    }
}
