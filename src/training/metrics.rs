//! Binary classification metrics

use crate::error::PipelineError;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Metric names understood by the comparison, tuning and run selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    Accuracy,
    Auc,
    Recall,
    Precision,
    F1,
    Kappa,
    Mcc,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Accuracy,
        Metric::Auc,
        Metric::Recall,
        Metric::Precision,
        Metric::F1,
        Metric::Kappa,
        Metric::Mcc,
    ];

    /// Name used as the metric key in tracking runs
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Accuracy => "Accuracy",
            Metric::Auc => "AUC",
            Metric::Recall => "Recall",
            Metric::Precision => "Prec.",
            Metric::F1 => "F1",
            Metric::Kappa => "Kappa",
            Metric::Mcc => "MCC",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accuracy" | "acc" => Ok(Metric::Accuracy),
            "auc" | "roc_auc" => Ok(Metric::Auc),
            "recall" => Ok(Metric::Recall),
            "prec." | "prec" | "precision" => Ok(Metric::Precision),
            "f1" | "f1_score" => Ok(Metric::F1),
            "kappa" => Ok(Metric::Kappa),
            "mcc" => Ok(Metric::Mcc),
            _ => Err(PipelineError::UnknownMetric(s.to_string())),
        }
    }
}

/// Confusion counts with class `1` as positive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl Confusion {
    pub fn from_predictions(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let mut c = Self::default();
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            match (*t > 0.5, *p > 0.5) {
                (true, true) => c.tp += 1,
                (false, true) => c.fp += 1,
                (false, false) => c.tn += 1,
                (true, false) => c.fn_ += 1,
            }
        }
        c
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    /// Zero when nothing was predicted positive
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// Zero when there are no positive samples
    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }

    pub fn kappa(&self) -> f64 {
        let n = self.total() as f64;
        if n == 0.0 {
            return 0.0;
        }
        let po = self.accuracy();
        let pred_pos = (self.tp + self.fp) as f64 / n;
        let true_pos = (self.tp + self.fn_) as f64 / n;
        let pe = pred_pos * true_pos + (1.0 - pred_pos) * (1.0 - true_pos);
        if (1.0 - pe).abs() < 1e-12 {
            0.0
        } else {
            (po - pe) / (1.0 - pe)
        }
    }

    pub fn mcc(&self) -> f64 {
        let (tp, fp, tn, fn_) = (self.tp as f64, self.fp as f64, self.tn as f64, self.fn_ as f64);
        let denom = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
        if denom == 0.0 {
            0.0
        } else {
            (tp * tn - fp * fn_) / denom
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Area under the ROC curve via the rank-sum statistic.
/// Zero when `y_true` holds a single class.
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> f64 {
    let n_pos = y_true.iter().filter(|&&t| t > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(std::cmp::Ordering::Equal));

    // average ranks over ties
    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(t, _)| **t > 0.5)
        .map(|(_, r)| r)
        .sum();

    let n_pos_f = n_pos as f64;
    (pos_rank_sum - n_pos_f * (n_pos_f + 1.0) / 2.0) / (n_pos_f * n_neg as f64)
}

/// Scores reported for a classifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationScores {
    pub accuracy: f64,
    pub auc: f64,
    pub recall: f64,
    pub precision: f64,
    pub f1: f64,
    pub kappa: f64,
    pub mcc: f64,
}

impl ClassificationScores {
    /// Compute every metric from hard predictions and positive-class scores
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>, y_score: &Array1<f64>) -> Self {
        let c = Confusion::from_predictions(y_true, y_pred);
        Self {
            accuracy: c.accuracy(),
            auc: roc_auc(y_true, y_score),
            recall: c.recall(),
            precision: c.precision(),
            f1: c.f1(),
            kappa: c.kappa(),
            mcc: c.mcc(),
        }
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Accuracy => self.accuracy,
            Metric::Auc => self.auc,
            Metric::Recall => self.recall,
            Metric::Precision => self.precision,
            Metric::F1 => self.f1,
            Metric::Kappa => self.kappa,
            Metric::Mcc => self.mcc,
        }
    }

    /// Element-wise mean over folds
    pub fn mean(scores: &[Self]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        let n = scores.len() as f64;
        let avg = |f: fn(&Self) -> f64| scores.iter().map(f).sum::<f64>() / n;
        Self {
            accuracy: avg(|s| s.accuracy),
            auc: avg(|s| s.auc),
            recall: avg(|s| s.recall),
            precision: avg(|s| s.precision),
            f1: avg(|s| s.f1),
            kappa: avg(|s| s.kappa),
            mcc: avg(|s| s.mcc),
        }
    }

    /// Metric map keyed by tracking names
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        Metric::ALL
            .iter()
            .map(|m| (m.name().to_string(), self.get(*m)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_confusion_metrics() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        let c = Confusion::from_predictions(&y_true, &y_pred);

        assert_eq!(c, Confusion { tp: 3, fp: 1, tn: 3, fn_: 1 });
        assert!((c.accuracy() - 0.75).abs() < 1e-12);
        assert!((c.precision() - 0.75).abs() < 1e-12);
        assert!((c.recall() - 0.75).abs() < 1e-12);
        assert!((c.f1() - 0.75).abs() < 1e-12);
        assert!((c.kappa() - 0.5).abs() < 1e-12);
        assert!((c.mcc() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_is_zero() {
        let c = Confusion::from_predictions(&array![0.0, 0.0], &array![0.0, 0.0]);
        assert_eq!(c.precision(), 0.0);
        assert_eq!(c.recall(), 0.0);
        assert_eq!(c.f1(), 0.0);
        assert_eq!(c.mcc(), 0.0);
    }

    #[test]
    fn test_auc() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        assert!((roc_auc(&y, &array![0.1, 0.4, 0.35, 0.8]) - 0.75).abs() < 1e-12);
        assert!((roc_auc(&y, &array![0.5, 0.5, 0.5, 0.5]) - 0.5).abs() < 1e-12);
        assert_eq!(roc_auc(&array![1.0, 1.0], &array![0.2, 0.9]), 0.0);
    }

    #[test]
    fn test_metric_names_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(metric.name().parse::<Metric>().unwrap(), metric);
        }
        assert_eq!("precision".parse::<Metric>().unwrap(), Metric::Precision);
        assert!("rmse".parse::<Metric>().is_err());
    }

    #[test]
    fn test_mean_scores() {
        let a = ClassificationScores { accuracy: 1.0, ..Default::default() };
        let b = ClassificationScores { accuracy: 0.5, f1: 0.2, ..Default::default() };
        let m = ClassificationScores::mean(&[a, b]);
        assert!((m.accuracy - 0.75).abs() < 1e-12);
        assert!((m.f1 - 0.1).abs() < 1e-12);
        assert_eq!(m.to_map().len(), 7);
    }
}
