//! MLflow REST API 2.0 tracking store
//!
//! Talks to any MLflow-compatible server (DagsHub included) over blocking
//! HTTP. Artifacts go through the server's `mlflow-artifacts` proxy.

use super::config::Credentials;
use super::store::{ExperimentRecord, MetricPoint, RunRecord, RunStatus, TrackingStore};
use crate::error::{PipelineError, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

const API_PREFIX: &str = "api/2.0/mlflow";
const ARTIFACT_PREFIX: &str = "api/2.0/mlflow-artifacts/artifacts";
const ARTIFACT_SCHEME: &str = "mlflow-artifacts:";
const SEARCH_PAGE_SIZE: usize = 1000;

/// int64 fields may arrive as JSON numbers or strings
fn lenient_i64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Text(String),
    }
    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Int(v)) => Some(v),
        Some(Raw::Text(s)) => s.parse().ok(),
        None => None,
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct KeyValue {
    key: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ApiMetric {
    key: String,
    value: f64,
    #[serde(default, deserialize_with = "lenient_i64")]
    timestamp: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    step: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ApiRunInfo {
    run_id: String,
    experiment_id: String,
    #[serde(default)]
    run_name: Option<String>,
    status: RunStatus,
    #[serde(default, deserialize_with = "lenient_i64")]
    start_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    end_time: Option<i64>,
    #[serde(default)]
    artifact_uri: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiRunData {
    #[serde(default)]
    metrics: Vec<ApiMetric>,
    #[serde(default)]
    params: Vec<KeyValue>,
    #[serde(default)]
    tags: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct ApiRun {
    info: ApiRunInfo,
    #[serde(default)]
    data: ApiRunData,
}

impl From<ApiRun> for RunRecord {
    fn from(run: ApiRun) -> Self {
        let metric_history: Vec<MetricPoint> = run
            .data
            .metrics
            .into_iter()
            .map(|m| MetricPoint {
                key: m.key,
                value: m.value,
                timestamp: m.timestamp.unwrap_or(0),
                step: m.step.unwrap_or(0),
            })
            .collect();
        let metrics: BTreeMap<String, f64> =
            metric_history.iter().map(|m| (m.key.clone(), m.value)).collect();
        let to_map = |kvs: Vec<KeyValue>| -> BTreeMap<String, String> {
            kvs.into_iter().map(|kv| (kv.key, kv.value)).collect()
        };

        let tags = to_map(run.data.tags);
        let run_name = run
            .info
            .run_name
            .or_else(|| tags.get("mlflow.runName").cloned())
            .unwrap_or_default();

        RunRecord {
            run_id: run.info.run_id,
            experiment_id: run.info.experiment_id,
            run_name,
            status: run.info.status,
            start_time: run.info.start_time.unwrap_or(0),
            end_time: run.info.end_time,
            artifact_uri: run.info.artifact_uri,
            params: to_map(run.data.params),
            tags,
            metrics,
            metric_history,
            artifacts: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiExperiment {
    experiment_id: String,
    name: String,
    #[serde(default)]
    artifact_location: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    creation_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GetExperimentResponse {
    experiment: ApiExperiment,
}

#[derive(Debug, Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    run: ApiRun,
}

#[derive(Debug, Default, Deserialize)]
struct SearchRunsResponse {
    #[serde(default)]
    runs: Vec<ApiRun>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

/// HTTP client for an MLflow tracking server
pub struct RemoteStore {
    base_url: String,
    credentials: Option<Credentials>,
    client: Client,
}

impl RemoteStore {
    pub fn new(uri: &str, credentials: Option<Credentials>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            base_url: uri.trim_end_matches('/').to_string(),
            credentials,
            client,
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, method)
    }

    /// Proxy URL for an artifact of a run stored under `mlflow-artifacts:/`
    fn artifact_url(&self, artifact_uri: &str, path: &str) -> Result<String> {
        let relative = artifact_uri
            .strip_prefix(ARTIFACT_SCHEME)
            .map(|rest| rest.trim_start_matches('/'))
            .ok_or_else(|| {
                PipelineError::TrackingError(format!(
                    "unsupported artifact location '{}', expected {}/...",
                    artifact_uri, ARTIFACT_SCHEME
                ))
            })?;
        Ok(format!(
            "{}/{}/{}/{}",
            self.base_url,
            ARTIFACT_PREFIX,
            relative.trim_end_matches('/'),
            path.trim_start_matches('/')
        ))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(c) => request.basic_auth(&c.username, Some(&c.password)),
            None => request,
        }
    }

    fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let api: ApiError = serde_json::from_str(&body).unwrap_or_default();
        let detail = if api.message.is_empty() { body } else { api.message };
        Err(PipelineError::TrackingError(format!(
            "HTTP {} {}: {}",
            status.as_u16(),
            api.error_code,
            detail.trim()
        )))
    }

    fn get<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> Result<T> {
        let request = self.client.get(self.api_url(method)).query(query);
        let response = Self::check(self.authorize(request).send()?)?;
        Ok(response.json()?)
    }

    fn post<T: DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T> {
        debug!(method, "tracking request");
        let request = self.client.post(self.api_url(method)).json(&body);
        let response = Self::check(self.authorize(request).send()?)?;
        let text = response.text()?;
        // some endpoints answer with an empty body
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        Ok(serde_json::from_str(text)?)
    }
}

fn key_values(map: &BTreeMap<String, String>) -> Vec<KeyValue> {
    map.iter()
        .map(|(k, v)| KeyValue {
            key: k.clone(),
            value: v.clone(),
        })
        .collect()
}

impl TrackingStore for RemoteStore {
    fn endpoint(&self) -> String {
        self.base_url.clone()
    }

    fn get_experiment_by_name(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        let request = self
            .client
            .get(self.api_url("experiments/get-by-name"))
            .query(&[("experiment_name", name)]);
        let response = self.authorize(request).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: GetExperimentResponse = Self::check(response)?.json()?;
        let e = body.experiment;
        Ok(Some(ExperimentRecord {
            experiment_id: e.experiment_id,
            name: e.name,
            artifact_location: e.artifact_location,
            creation_time: e.creation_time,
        }))
    }

    fn create_experiment(&self, name: &str) -> Result<String> {
        let body: CreateExperimentResponse =
            self.post("experiments/create", json!({ "name": name }))?;
        Ok(body.experiment_id)
    }

    fn create_run(
        &self,
        experiment_id: &str,
        run_name: &str,
        start_time: i64,
        tags: &BTreeMap<String, String>,
    ) -> Result<RunRecord> {
        let body: RunResponse = self.post(
            "runs/create",
            json!({
                "experiment_id": experiment_id,
                "run_name": run_name,
                "start_time": start_time,
                "tags": key_values(tags),
            }),
        )?;
        Ok(body.run.into())
    }

    fn log_batch(
        &self,
        run_id: &str,
        metrics: &[MetricPoint],
        params: &BTreeMap<String, String>,
        tags: &BTreeMap<String, String>,
    ) -> Result<()> {
        let _: serde_json::Value = self.post(
            "runs/log-batch",
            json!({
                "run_id": run_id,
                "metrics": metrics,
                "params": key_values(params),
                "tags": key_values(tags),
            }),
        )?;
        Ok(())
    }

    fn set_terminated(&self, run_id: &str, status: RunStatus, end_time: i64) -> Result<()> {
        let _: serde_json::Value = self.post(
            "runs/update",
            json!({ "run_id": run_id, "status": status.as_str(), "end_time": end_time }),
        )?;
        Ok(())
    }

    fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        let body: RunResponse = self
            .get("runs/get", &[("run_id", run_id)])
            .map_err(|e| match e {
                PipelineError::TrackingError(msg) if msg.contains("RESOURCE_DOES_NOT_EXIST") => {
                    PipelineError::RunNotFound(run_id.to_string())
                }
                other => other,
            })?;
        Ok(body.run.into())
    }

    fn search_runs(&self, experiment_ids: &[String]) -> Result<Vec<RunRecord>> {
        let mut runs = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut body = json!({
                "experiment_ids": experiment_ids,
                "max_results": SEARCH_PAGE_SIZE,
            });
            if let Some(token) = &page_token {
                body["page_token"] = json!(token);
            }
            let page: SearchRunsResponse = self.post("runs/search", body)?;
            runs.extend(page.runs.into_iter().map(RunRecord::from));
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(runs)
    }

    fn put_artifact(&self, run: &RunRecord, path: &str, bytes: &[u8]) -> Result<()> {
        let url = self.artifact_url(&run.artifact_uri, path)?;
        debug!(run_id = %run.run_id, path, "uploading artifact");
        let request = self.client.put(url).body(bytes.to_vec());
        Self::check(self.authorize(request).send()?)?;
        Ok(())
    }

    fn get_artifact(&self, run: &RunRecord, path: &str) -> Result<Vec<u8>> {
        let url = self.artifact_url(&run.artifact_uri, path)?;
        let response = Self::check(self.authorize(self.client.get(url)).send()?)?;
        Ok(response.bytes()?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let store = RemoteStore::new("https://dagshub.com/acme/churn.mlflow/", None).unwrap();
        assert_eq!(
            store.api_url("runs/get"),
            "https://dagshub.com/acme/churn.mlflow/api/2.0/mlflow/runs/get"
        );
        assert_eq!(
            store
                .artifact_url("mlflow-artifacts:/3/abc/artifacts", "model/model.json")
                .unwrap(),
            concat!(
                "https://dagshub.com/acme/churn.mlflow/api/2.0/mlflow-artifacts/",
                "artifacts/3/abc/artifacts/model/model.json"
            )
        );
        assert!(store.artifact_url("s3://bucket/3/abc", "model").is_err());
    }

    #[test]
    fn test_parse_run_with_string_int64() {
        let body = r#"{"run":{"info":{"run_id":"abc","experiment_id":"7","status":"FINISHED",
            "start_time":"1700000000000","artifact_uri":"mlflow-artifacts:/7/abc/artifacts"},
            "data":{"metrics":[{"key":"Accuracy","value":0.81,"timestamp":"1","step":"0"}],
            "params":[{"key":"seed","value":"42"}],
            "tags":[{"key":"mlflow.runName","value":"Decision Tree Classifier"}]}}}"#;
        let parsed: RunResponse = serde_json::from_str(body).unwrap();
        let run: RunRecord = parsed.run.into();
        assert_eq!(run.start_time, 1_700_000_000_000);
        assert_eq!(run.metric("Accuracy"), Some(0.81));
        assert_eq!(run.param("seed"), Some("42"));
        assert_eq!(run.run_name, "Decision Tree Classifier");
    }

    #[test]
    fn test_empty_search_page() {
        let page: SearchRunsResponse = serde_json::from_str("{}").unwrap();
        assert!(page.runs.is_empty());
        assert!(page.next_page_token.is_none());
    }
}
