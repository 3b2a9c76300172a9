//! Local file system tracking store
//!
//! Layout:
//!
//! ```text
//! <root>/<experiment_id>/meta.json
//! <root>/<experiment_id>/<run_id>/run.json
//! <root>/<experiment_id>/<run_id>/artifacts/<path>
//! ```

use super::store::{ExperimentRecord, MetricPoint, RunRecord, RunStatus, TrackingStore};
use crate::error::{PipelineError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

const META_FILE: &str = "meta.json";
const RUN_FILE: &str = "run.json";
const ARTIFACTS_DIR: &str = "artifacts";

/// JSON-file backed store
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn experiments(&self) -> Result<Vec<ExperimentRecord>> {
        let mut experiments = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let meta = entry?.path().join(META_FILE);
            if meta.is_file() {
                experiments.push(serde_json::from_slice(&fs::read(&meta)?)?);
            }
        }
        Ok(experiments)
    }

    fn run_dir(&self, run_id: &str) -> Result<PathBuf> {
        if run_id.is_empty() || !run_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PipelineError::RunNotFound(run_id.to_string()));
        }
        for experiment in self.experiments()? {
            let dir = self.root.join(&experiment.experiment_id).join(run_id);
            if dir.join(RUN_FILE).is_file() {
                return Ok(dir);
            }
        }
        Err(PipelineError::RunNotFound(run_id.to_string()))
    }

    fn read_run(&self, run_id: &str) -> Result<(PathBuf, RunRecord)> {
        let dir = self.run_dir(run_id)?;
        let run = serde_json::from_slice(&fs::read(dir.join(RUN_FILE))?)?;
        Ok((dir, run))
    }

    fn update_run<F>(&self, run_id: &str, update: F) -> Result<()>
    where
        F: FnOnce(&mut RunRecord) -> Result<()>,
    {
        let (dir, mut run) = self.read_run(run_id)?;
        update(&mut run)?;
        write_atomic(&dir.join(RUN_FILE), &run)
    }
}

/// Write JSON through a temp file and rename it into place
fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reject absolute paths and `..` so artifacts stay inside the run
fn check_artifact_path(path: &str) -> Result<()> {
    let p = Path::new(path);
    let ok = !path.is_empty() && p.components().all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(())
    } else {
        Err(PipelineError::TrackingError(format!("invalid artifact path '{}'", path)))
    }
}

impl TrackingStore for LocalStore {
    fn endpoint(&self) -> String {
        format!("file:{}", self.root.display())
    }

    fn get_experiment_by_name(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        Ok(self.experiments()?.into_iter().find(|e| e.name == name))
    }

    fn create_experiment(&self, name: &str) -> Result<String> {
        let experiments = self.experiments()?;
        if experiments.iter().any(|e| e.name == name) {
            return Err(PipelineError::TrackingError(format!(
                "experiment '{}' already exists",
                name
            )));
        }
        let next_id = experiments
            .iter()
            .filter_map(|e| e.experiment_id.parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1)
            .to_string();

        let dir = self.root.join(&next_id);
        fs::create_dir_all(&dir)?;
        let record = ExperimentRecord {
            experiment_id: next_id.clone(),
            name: name.to_string(),
            artifact_location: dir.display().to_string(),
            creation_time: Some(chrono::Utc::now().timestamp_millis()),
        };
        write_atomic(&dir.join(META_FILE), &record)?;
        debug!(experiment_id = %next_id, name, "experiment created");
        Ok(next_id)
    }

    fn create_run(
        &self,
        experiment_id: &str,
        run_name: &str,
        start_time: i64,
        tags: &BTreeMap<String, String>,
    ) -> Result<RunRecord> {
        let exp_dir = self.root.join(experiment_id);
        if !exp_dir.join(META_FILE).is_file() {
            return Err(PipelineError::TrackingError(format!(
                "experiment '{}' does not exist",
                experiment_id
            )));
        }

        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let run_dir = exp_dir.join(&run_id);
        fs::create_dir_all(run_dir.join(ARTIFACTS_DIR))?;

        let run = RunRecord {
            run_id: run_id.clone(),
            experiment_id: experiment_id.to_string(),
            run_name: run_name.to_string(),
            status: RunStatus::Running,
            start_time,
            end_time: None,
            artifact_uri: run_dir.join(ARTIFACTS_DIR).display().to_string(),
            params: BTreeMap::new(),
            tags: tags.clone(),
            metrics: BTreeMap::new(),
            metric_history: Vec::new(),
            artifacts: Vec::new(),
        };
        write_atomic(&run_dir.join(RUN_FILE), &run)?;
        Ok(run)
    }

    fn log_batch(
        &self,
        run_id: &str,
        metrics: &[MetricPoint],
        params: &BTreeMap<String, String>,
        tags: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.update_run(run_id, |run| {
            for (key, value) in params {
                match run.params.get(key) {
                    Some(existing) if existing != value => {
                        return Err(PipelineError::TrackingError(format!(
                            "param '{}' already logged with value '{}'",
                            key, existing
                        )));
                    }
                    _ => {
                        run.params.insert(key.clone(), value.clone());
                    }
                }
            }
            run.tags.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
            run.record_metrics(metrics);
            Ok(())
        })
    }

    fn set_terminated(&self, run_id: &str, status: RunStatus, end_time: i64) -> Result<()> {
        self.update_run(run_id, |run| {
            run.status = status;
            run.end_time = Some(end_time);
            Ok(())
        })
    }

    fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        Ok(self.read_run(run_id)?.1)
    }

    fn search_runs(&self, experiment_ids: &[String]) -> Result<Vec<RunRecord>> {
        let mut runs = Vec::new();
        for experiment_id in experiment_ids {
            let dir = self.root.join(experiment_id);
            if !dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&dir)? {
                let run_file = entry?.path().join(RUN_FILE);
                if run_file.is_file() {
                    runs.push(serde_json::from_slice(&fs::read(&run_file)?)?);
                }
            }
        }
        Ok(runs)
    }

    fn put_artifact(&self, run: &RunRecord, path: &str, bytes: &[u8]) -> Result<()> {
        check_artifact_path(path)?;
        let dir = self.run_dir(&run.run_id)?;
        let target = dir.join(ARTIFACTS_DIR).join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;

        self.update_run(&run.run_id, |record| {
            if !record.artifacts.iter().any(|a| a == path) {
                record.artifacts.push(path.to_string());
            }
            Ok(())
        })
    }

    fn get_artifact(&self, run: &RunRecord, path: &str) -> Result<Vec<u8>> {
        check_artifact_path(path)?;
        let target = self.run_dir(&run.run_id)?.join(ARTIFACTS_DIR).join(path);
        if !target.is_file() {
            return Err(PipelineError::TrackingError(format!(
                "artifact '{}' not found in run {}",
                path, run.run_id
            )));
        }
        Ok(fs::read(target)?)
    }
}
