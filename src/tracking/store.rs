//! Tracking records and the storage backend trait

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Run is currently running
    Running,
    Scheduled,
    /// Run completed successfully
    Finished,
    /// Run failed
    Failed,
    /// Run was killed
    Killed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Scheduled => "SCHEDULED",
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
            RunStatus::Killed => "KILLED",
        }
    }
}

/// A single logged metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub key: String,
    pub value: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub step: i64,
}

/// A run within an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// 32 hex chars, never changes once created
    pub run_id: String,
    pub experiment_id: String,
    pub run_name: String,
    pub status: RunStatus,
    /// Milliseconds since the Unix epoch
    pub start_time: i64,
    pub end_time: Option<i64>,
    /// Root under which the run's artifacts live
    pub artifact_uri: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Latest value per metric key
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub metric_history: Vec<MetricPoint>,
    /// Artifact paths relative to `artifact_uri`
    #[serde(default)]
    pub artifacts: Vec<String>,
}

impl RunRecord {
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Apply a batch of metric points: history grows, latest values merge
    pub fn record_metrics(&mut self, points: &[MetricPoint]) {
        for point in points {
            self.metrics.insert(point.key.clone(), point.value);
            self.metric_history.push(point.clone());
        }
    }
}

/// A named group of runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub experiment_id: String,
    pub name: String,
    pub artifact_location: String,
    #[serde(default)]
    pub creation_time: Option<i64>,
}

/// Storage backend trait
pub trait TrackingStore: Send + Sync {
    /// Human-readable location of the store
    fn endpoint(&self) -> String;

    fn get_experiment_by_name(&self, name: &str) -> Result<Option<ExperimentRecord>>;

    /// Create an experiment and return its id
    fn create_experiment(&self, name: &str) -> Result<String>;

    fn create_run(
        &self,
        experiment_id: &str,
        run_name: &str,
        start_time: i64,
        tags: &BTreeMap<String, String>,
    ) -> Result<RunRecord>;

    /// Append metrics and set params and tags on an existing run
    fn log_batch(
        &self,
        run_id: &str,
        metrics: &[MetricPoint],
        params: &BTreeMap<String, String>,
        tags: &BTreeMap<String, String>,
    ) -> Result<()>;

    fn set_terminated(&self, run_id: &str, status: RunStatus, end_time: i64) -> Result<()>;

    fn get_run(&self, run_id: &str) -> Result<RunRecord>;

    /// Every run of the given experiments, in no particular order
    fn search_runs(&self, experiment_ids: &[String]) -> Result<Vec<RunRecord>>;

    fn put_artifact(&self, run: &RunRecord, path: &str, bytes: &[u8]) -> Result<()>;

    fn get_artifact(&self, run: &RunRecord, path: &str) -> Result<Vec<u8>>;
}

/// Sort runs by `metric` descending. Runs without the metric go last; ties
/// go to the most recent run, then to the run id.
pub fn sort_runs_by_metric(runs: &mut [RunRecord], metric: &str) {
    runs.sort_by(|a, b| {
        let by_metric = match (a.metric(metric), b.metric(metric)) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_metric
            .then_with(|| b.start_time.cmp(&a.start_time))
            .then_with(|| a.run_id.cmp(&b.run_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(id: &str, start: i64, accuracy: Option<f64>) -> RunRecord {
        let mut metrics = BTreeMap::new();
        if let Some(a) = accuracy {
            metrics.insert("Accuracy".to_string(), a);
        }
        RunRecord {
            run_id: id.to_string(),
            experiment_id: "1".to_string(),
            run_name: id.to_string(),
            status: RunStatus::Finished,
            start_time: start,
            end_time: None,
            artifact_uri: String::new(),
            params: BTreeMap::new(),
            tags: BTreeMap::new(),
            metrics,
            metric_history: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    #[test]
    fn test_sort_missing_last_and_ties_by_recency() {
        let mut runs = vec![
            run("a", 1, None),
            run("b", 2, Some(0.7)),
            run("c", 3, Some(0.9)),
            run("d", 4, Some(0.9)),
        ];
        sort_runs_by_metric(&mut runs, "Accuracy");
        let order: Vec<&str> = runs.iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(order, vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn test_record_metrics_merges() {
        let mut r = run("a", 0, Some(0.5));
        r.record_metrics(&[MetricPoint {
            key: "final_f1".to_string(),
            value: 0.4,
            timestamp: 1,
            step: 0,
        }]);
        assert_eq!(r.metric("Accuracy"), Some(0.5));
        assert_eq!(r.metric("final_f1"), Some(0.4));
        assert_eq!(r.metric_history.len(), 1);
    }

    #[test]
    fn test_status_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&RunStatus::Finished).unwrap(), "\"FINISHED\"");
    }
}
