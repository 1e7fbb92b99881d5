//! Tracking store configuration and URI resolution

use crate::error::{ModellingError, Result};
use std::path::PathBuf;

/// Environment variable overriding the tracking store location
pub const TRACKING_URI_ENV: &str = "MLFLOW_TRACKING_URI";

/// Environment variable selecting the experiment
pub const EXPERIMENT_NAME_ENV: &str = "MLFLOW_EXPERIMENT_NAME";

/// Store used when no URI is configured
pub const DEFAULT_TRACKING_URI: &str = "file:./mlruns";

/// Experiment used when no name is configured
pub const DEFAULT_EXPERIMENT_NAME: &str = "Default";

/// Where and under which experiment runs are recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingConfig {
    /// Tracking store URI (`file:` or a bare path)
    pub tracking_uri: String,
    /// Experiment that new runs are filed under
    pub experiment_name: String,
    /// Recorded as the `mlflow.user` tag
    pub user: Option<String>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tracking_uri: DEFAULT_TRACKING_URI.to_string(),
            experiment_name: DEFAULT_EXPERIMENT_NAME.to_string(),
            user: None,
        }
    }
}

impl TrackingConfig {
    /// Build from the process environment
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            tracking_uri: get(TRACKING_URI_ENV).unwrap_or_else(|| DEFAULT_TRACKING_URI.to_string()),
            experiment_name: get(EXPERIMENT_NAME_ENV)
                .unwrap_or_else(|| DEFAULT_EXPERIMENT_NAME.to_string()),
            user: get("USER").or_else(|| get("USERNAME")),
        }
    }

    pub fn with_tracking_uri(mut self, uri: impl Into<String>) -> Self {
        self.tracking_uri = uri.into();
        self
    }

    pub fn with_experiment_name(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = name.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Local directory backing the configured store
    pub fn store_root(&self) -> Result<PathBuf> {
        resolve_tracking_uri(&self.tracking_uri)
    }
}

/// Map a tracking URI to a local store directory.
///
/// Accepts `file:<path>`, `file://<absolute path>` and bare paths. Remote
/// schemes are rejected.
pub fn resolve_tracking_uri(uri: &str) -> Result<PathBuf> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(ModellingError::ConfigError(
            "tracking URI is empty".to_string(),
        ));
    }

    if let Some(rest) = uri.strip_prefix("file:") {
        let path = match rest.strip_prefix("//") {
            // file://host/path is not supported, only an empty or localhost authority
            Some(after) if after.starts_with('/') => after,
            Some(after) => after.strip_prefix("localhost").filter(|p| p.starts_with('/')).ok_or_else(
                || ModellingError::ConfigError(format!("unsupported file URI authority in '{}'", uri)),
            )?,
            None => rest,
        };
        if path.is_empty() {
            return Err(ModellingError::ConfigError(format!(
                "tracking URI '{}' has no path",
                uri
            )));
        }
        return Ok(PathBuf::from(path));
    }

    if let Some((scheme, _)) = uri.split_once("://") {
        return Err(ModellingError::ConfigError(format!(
            "unsupported tracking URI scheme '{}' (only local file stores are supported)",
            scheme
        )));
    }

    if let Some((scheme, _)) = uri.split_once(':') {
        // Windows drive letters look like a one-character scheme
        if scheme.len() > 1 && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+') {
            return Err(ModellingError::ConfigError(format!(
                "unsupported tracking URI scheme '{}' (only local file stores are supported)",
                scheme
            )));
        }
    }

    Ok(PathBuf::from(uri))
}
