//! High-level tracking client

use super::config::TrackingDestination;
use super::local::LocalStore;
use super::remote::RemoteStore;
use super::store::{sort_runs_by_metric, MetricPoint, RunRecord, RunStatus, TrackingStore};
use crate::error::{PipelineError, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

const RUNS_SCHEME: &str = "runs:/";

/// `runs:/<run_id>/<path>` model address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelUri {
    pub run_id: String,
    pub path: String,
}

impl ModelUri {
    pub fn for_run(run_id: &str, path: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            path: path.trim_matches('/').to_string(),
        }
    }
}

impl fmt::Display for ModelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", RUNS_SCHEME, self.run_id, self.path)
    }
}

impl FromStr for ModelUri {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix(RUNS_SCHEME)
            .ok_or_else(|| PipelineError::InvalidModelUri(s.to_string()))?;
        match rest.trim_start_matches('/').split_once('/') {
            Some((run_id, path)) if !run_id.is_empty() && !path.trim_matches('/').is_empty() => {
                Ok(ModelUri::for_run(run_id, path))
            }
            _ => Err(PipelineError::InvalidModelUri(s.to_string())),
        }
    }
}

/// Tracking client over a shared store. Cloning is cheap.
#[derive(Clone)]
pub struct TrackingClient {
    store: Arc<dyn TrackingStore>,
}

impl fmt::Debug for TrackingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingClient")
            .field("endpoint", &self.store.endpoint())
            .finish()
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl TrackingClient {
    /// Connect to the configured destination
    pub fn new(destination: &TrackingDestination) -> Result<Self> {
        let client = match destination {
            TrackingDestination::Local { root } => Self::from_store(LocalStore::new(root.clone())?),
            TrackingDestination::Remote { uri, credentials } => {
                Self::from_store(RemoteStore::new(uri, credentials.clone())?)
            }
        };
        info!(endpoint = %client.endpoint(), "tracking client ready");
        Ok(client)
    }

    pub fn from_store(store: impl TrackingStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn endpoint(&self) -> String {
        self.store.endpoint()
    }

    /// Experiment id for `name`, created on first use
    pub fn get_or_create_experiment(&self, name: &str) -> Result<String> {
        if let Some(experiment) = self.store.get_experiment_by_name(name)? {
            return Ok(experiment.experiment_id);
        }
        let id = self.store.create_experiment(name)?;
        info!(experiment = name, experiment_id = %id, "created experiment");
        Ok(id)
    }

    pub fn experiment_id(&self, name: &str) -> Result<Option<String>> {
        Ok(self.store.get_experiment_by_name(name)?.map(|e| e.experiment_id))
    }

    pub fn start_run(
        &self,
        experiment_id: &str,
        run_name: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<RunRecord> {
        let run = self.store.create_run(experiment_id, run_name, now_millis(), tags)?;
        debug!(run_id = %run.run_id, run_name, "run started");
        Ok(run)
    }

    pub fn log_params(&self, run_id: &str, params: &BTreeMap<String, String>) -> Result<()> {
        self.store.log_batch(run_id, &[], params, &BTreeMap::new())
    }

    pub fn set_tags(&self, run_id: &str, tags: &BTreeMap<String, String>) -> Result<()> {
        self.store.log_batch(run_id, &[], &BTreeMap::new(), tags)
    }

    /// Append metric values to a run. Existing keys get a new history point.
    pub fn log_metrics(
        &self,
        run_id: &str,
        metrics: &BTreeMap<String, f64>,
        step: i64,
    ) -> Result<()> {
        let timestamp = now_millis();
        let points: Vec<MetricPoint> = metrics
            .iter()
            .map(|(key, value)| MetricPoint {
                key: key.clone(),
                value: *value,
                timestamp,
                step,
            })
            .collect();
        self.store.log_batch(run_id, &points, &BTreeMap::new(), &BTreeMap::new())
    }

    pub fn log_artifact(&self, run_id: &str, path: &str, bytes: &[u8]) -> Result<()> {
        let run = self.store.get_run(run_id)?;
        self.store.put_artifact(&run, path, bytes)
    }

    pub fn load_artifact(&self, run_id: &str, path: &str) -> Result<Vec<u8>> {
        let run = self.store.get_run(run_id)?;
        self.store.get_artifact(&run, path)
    }

    pub fn end_run(&self, run_id: &str, status: RunStatus) -> Result<()> {
        self.store.set_terminated(run_id, status, now_millis())
    }

    pub fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        self.store.get_run(run_id)
    }

    /// Runs of the experiments, best `order_by` metric first when given
    pub fn search_runs(
        &self,
        experiment_ids: &[String],
        order_by: Option<&str>,
        max_results: Option<usize>,
    ) -> Result<Vec<RunRecord>> {
        let mut runs = self.store.search_runs(experiment_ids)?;
        match order_by {
            Some(metric) => sort_runs_by_metric(&mut runs, metric),
            None => runs.sort_by(|a, b| b.start_time.cmp(&a.start_time)),
        }
        if let Some(max) = max_results {
            runs.truncate(max);
        }
        Ok(runs)
    }

    /// Best run of the named experiment by `metric` descending
    pub fn best_run(&self, experiment_name: &str, metric: &str) -> Result<RunRecord> {
        let experiment_id = self
            .experiment_id(experiment_name)?
            .ok_or_else(|| PipelineError::NoRuns(experiment_name.to_string()))?;
        self.search_runs(&[experiment_id], Some(metric), Some(1))?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::NoRuns(experiment_name.to_string()))
    }
}
