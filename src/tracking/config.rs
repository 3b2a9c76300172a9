//! Tracking destination resolution
//!
//! The destination is computed from [`PipelineParams`] alone. Nothing here
//! writes to the process environment, and local mode never reads it.

use crate::config::PipelineParams;
use crate::error::{PipelineError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable holding the remote tracking user name
pub const USERNAME_VAR: &str = "MLFLOW_TRACKING_USERNAME";

/// Environment variable holding the remote tracking password or token
pub const PASSWORD_VAR: &str = "MLFLOW_TRACKING_PASSWORD";

/// Basic-auth credentials for the remote tracking server
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where runs are recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingDestination {
    /// File store rooted at a local directory
    Local { root: PathBuf },
    /// MLflow-compatible tracking server
    Remote {
        uri: String,
        credentials: Option<Credentials>,
    },
}

impl TrackingDestination {
    /// Resolve the destination, reading credentials from the process
    /// environment and then from `.env` in the working directory
    pub fn from_params(params: &PipelineParams) -> Result<Self> {
        Self::from_params_with(params, |key| lookup_credential(key, Path::new(".env")))
    }

    /// Resolve the destination with a custom credential lookup.
    /// `lookup` is only called in remote mode.
    pub fn from_params_with<F>(params: &PipelineParams, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !params.track_to_dagshub {
            debug!(root = %params.local_tracking_dir.display(), "tracking to local store");
            return Ok(TrackingDestination::Local {
                root: params.local_tracking_dir.clone(),
            });
        }

        let uri = params
            .dagshub_tracking_uri
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                PipelineError::ConfigError(
                    "dagshub_tracking_uri is required when track_to_dagshub is true".to_string(),
                )
            })?
            .trim_end_matches('/')
            .to_string();

        let credentials = match (lookup(USERNAME_VAR), lookup(PASSWORD_VAR)) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => {
                warn!(
                    uri = %uri,
                    "no tracking credentials found, sending unauthenticated requests"
                );
                None
            }
        };

        debug!(uri = %uri, "tracking to remote server");
        Ok(TrackingDestination::Remote { uri, credentials })
    }

    /// Tracking URI as reported to the user
    pub fn endpoint(&self) -> String {
        match self {
            TrackingDestination::Local { root } => format!("file:{}", root.display()),
            TrackingDestination::Remote { uri, .. } => uri.clone(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, TrackingDestination::Remote { .. })
    }
}

/// Process environment first, then the dotenv file. Neither is modified.
fn lookup_credential(key: &str, dotenv_path: &Path) -> Option<String> {
    if let Ok(value) = std::env::var(key) {
        return Some(value);
    }
    let iter = dotenvy::from_path_iter(dotenv_path).ok()?;
    iter.filter_map(|item| item.ok())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
}
