//! Experiment tracking
//!
//! Runs are recorded either in a local JSON file store or on an
//! MLflow-compatible server. The destination is an explicit
//! [`TrackingDestination`] derived from the pipeline configuration.

mod config;
mod store;
mod local;
mod remote;
mod client;

pub use config::{Credentials, TrackingDestination, PASSWORD_VAR, USERNAME_VAR};
pub use store::{
    sort_runs_by_metric, ExperimentRecord, MetricPoint, RunRecord, RunStatus, TrackingStore,
};
pub use local::LocalStore;
pub use remote::RemoteStore;
pub use client::{ModelUri, TrackingClient};
