//! Prior-predicting baseline classifier

use super::classifier::{check_fit_input, positive_rate, Classifier};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Ignores the features and predicts the training prior.
/// Hard predictions are the majority class, ties going to the negative class.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DummyClassifier {
    prior: Option<f64>,
}

impl DummyClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prior(&self) -> Option<f64> {
        self.prior
    }
}

impl Classifier for DummyClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.prior = Some(positive_rate(y));
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let prior = self.prior.ok_or(PipelineError::ModelNotFitted)?;
        Ok(Array1::from_elem(x.nrows(), prior))
    }

    fn is_finite(&self) -> bool {
        self.prior.map_or(true, f64::is_finite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_predicts_majority() {
        let mut d = DummyClassifier::new();
        d.fit(&array![[0.0], [0.0], [0.0]], &array![1.0, 0.0, 1.0]).unwrap();
        assert!((d.prior().unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(d.predict(&array![[5.0], [9.0]]).unwrap().to_vec(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_tie_goes_negative() {
        let mut d = DummyClassifier::new();
        d.fit(&array![[0.0], [0.0]], &array![1.0, 0.0]).unwrap();
        assert_eq!(d.predict(&array![[1.0]]).unwrap().to_vec(), vec![0.0]);
    }
}
