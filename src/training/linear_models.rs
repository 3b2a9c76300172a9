//! Linear classifiers: logistic regression and ridge classifier

use super::classifier::{check_fit_input, check_n_features, Classifier};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
    z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

/// L2-regularized logistic regression fitted by batch gradient descent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: f64,
    /// Inverse regularization strength
    pub c: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            c: 1.0,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
        }
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_samples = x.nrows() as f64;

        let mut weights = Array1::zeros(x.ncols());
        let mut bias = 0.0;
        let alpha = 1.0 / (self.c.max(1e-12) * n_samples);

        for _ in 0..self.max_iter {
            let predictions = sigmoid(&(x.dot(&weights) + bias));
            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples) + (alpha * &weights);
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }

            // L2 term taken implicitly so the step stays bounded for any C
            let data_grad = &dw - &(alpha * &weights);
            let shrink = 1.0 + self.learning_rate * alpha;
            weights = (weights - self.learning_rate * data_grad) / shrink;
            bias -= self.learning_rate * db;
        }

        if !bias.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            return Err(PipelineError::TrainingError(format!(
                "logistic regression diverged (C = {})",
                self.c
            )));
        }
        self.coefficients = Some(weights);
        self.intercept = bias;
        Ok(())
    }

    fn is_finite(&self) -> bool {
        self.intercept.is_finite()
            && self.coefficients.as_ref().map_or(true, |c| c.iter().all(|v| v.is_finite()))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        check_n_features(coefficients.len(), x)?;
        Ok(sigmoid(&(x.dot(coefficients) + self.intercept)))
    }
}

/// Ridge regression on `{-1, +1}` targets, thresholded at zero
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeClassifier {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: f64,
    /// L2 regularization strength
    pub alpha: f64,
}

impl Default for RidgeClassifier {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeClassifier {
    pub fn new(alpha: f64) -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            alpha,
        }
    }

    /// Signed distance to the decision boundary
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        check_n_features(coefficients.len(), x)?;
        Ok(x.dot(coefficients) + self.intercept)
    }
}

impl Classifier for RidgeClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_features = x.ncols();

        let targets = y.mapv(|v| if v > 0.5 { 1.0 } else { -1.0 });
        let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_features));
        let y_mean = targets.mean().unwrap_or(0.0);

        let xc = x - &x_mean;
        let yc = &targets - y_mean;

        let mut gram = xc.t().dot(&xc);
        for i in 0..n_features {
            gram[[i, i]] += self.alpha.max(1e-10);
        }
        let rhs = xc.t().dot(&yc);
        let weights = solve_linear_system(gram, rhs)?;

        self.intercept = y_mean - x_mean.dot(&weights);
        self.coefficients = Some(weights);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(sigmoid(&self.decision_function(x)?))
    }

    fn is_finite(&self) -> bool {
        self.intercept.is_finite()
            && self.coefficients.as_ref().map_or(true, |c| c.iter().all(|v| v.is_finite()))
    }
}

/// Gaussian elimination with partial pivoting
fn solve_linear_system(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| {
                a[[i, col]]
                    .abs()
                    .partial_cmp(&a[[j, col]].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[[pivot, col]].abs() < 1e-12 {
            return Err(PipelineError::TrainingError(
                "singular system in ridge solve".to_string(),
            ));
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut solution = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[[row, k]] * solution[k]).sum();
        solution[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [-2.0, 0.1],
            [-1.5, -0.2],
            [-1.0, 0.3],
            [1.0, 0.0],
            [1.5, -0.1],
            [2.0, 0.2]
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_logistic_regression_separates() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_logistic_regression_single_class() {
        let x = array![[0.5], [1.0]];
        let y = array![1.0, 1.0];
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert!(model.predict_proba(&x).unwrap().iter().all(|&p| p > 0.5));
    }

    #[test]
    fn test_logistic_regression_strong_penalty_stays_finite() {
        let x = array![[-1.0, 1.0, 0.0, 1.0], [1.0, -1.0, 1.0, 0.0]];
        let y = array![1.0, 0.0];
        for c in [0.001, 0.0025, 0.01] {
            let mut model = LogisticRegression::new().with_c(c);
            model.fit(&x, &y).unwrap();
            assert!(model.is_finite(), "C = {}", c);
            let p = model.predict_proba(&x).unwrap();
            assert!(p.iter().all(|v| v.is_finite() && (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_non_finite_coefficients_detected() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert!(model.is_finite());
        model.intercept = f64::NAN;
        assert!(!model.is_finite());
    }

    #[test]
    fn test_ridge_classifier_separates() {
        let (x, y) = separable();
        let mut model = RidgeClassifier::new(1.0);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_not_fitted() {
        let model = RidgeClassifier::default();
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(PipelineError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_solve_linear_system() {
        let a = array![[2.0, 1.0], [1.0, 3.0]];
        let b = array![3.0, 5.0];
        let x = solve_linear_system(a, b).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }
}
