//! Configuration for scenario execution.
//!
//! The names of response-ending functions and the response mock identifier
//! are injected here instead of living in global tables, so the engine has
//! no built-in dependency on any HTTP framework's naming conventions.

use maddox_proto::MockId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Top-level configuration for Maddox scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaddoxConfig {
    /// Mock identifier for the HTTP response object.
    #[serde(default = "default_response_mock_name")]
    pub response_mock_name: String,

    /// Function names that end an HTTP response, mapped to whether they count.
    #[serde(default = "default_response_end_functions")]
    pub response_end_functions: BTreeMap<String, bool>,

    /// How long `test` waits for the finisher before failing.
    ///
    /// Unset means wait forever and leave the timeout to the test runner.
    #[serde(default)]
    pub finish_timeout_ms: Option<u64>,
}

fn default_response_mock_name() -> String {
    "HttpResponseMock".to_string()
}

fn default_response_end_functions() -> BTreeMap<String, bool> {
    [
        "download",
        "end",
        "json",
        "jsonp",
        "redirect",
        "render",
        "send",
        "sendFile",
        "sendStatus",
    ]
    .into_iter()
    .map(|name| (name.to_string(), true))
    .collect()
}

impl Default for MaddoxConfig {
    fn default() -> Self {
        Self {
            response_mock_name: default_response_mock_name(),
            response_end_functions: default_response_end_functions(),
            finish_timeout_ms: None,
        }
    }
}

impl MaddoxConfig {
    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        debug!(path = %path_ref.display(), "Loading configuration from file");
        let content = std::fs::read_to_string(path_ref)?;
        Self::from_yaml_str(&content)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        for warning in config.validate()? {
            warn!(%warning, "Configuration warning");
        }
        debug!(
            response_mock = %config.response_mock_name,
            finishers = config.response_end_functions.len(),
            timeout_ms = ?config.finish_timeout_ms,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Returns the mock identifier of the HTTP response object.
    pub fn response_mock_id(&self) -> MockId {
        MockId::new(self.response_mock_name.clone())
    }

    /// Returns true if `func` ends an HTTP response.
    pub fn is_response_finisher(&self, func: &str) -> bool {
        self.response_end_functions
            .get(func)
            .copied()
            .unwrap_or(false)
    }

    /// Returns the enabled finisher names, comma separated.
    pub fn known_finishers(&self) -> String {
        self.response_end_functions
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Returns the finish timeout, if one is configured.
    pub fn finish_timeout(&self) -> Option<Duration> {
        self.finish_timeout_ms.map(Duration::from_millis)
    }

    /// Validates the configuration.
    ///
    /// A blank response mock name is an error; everything else that looks
    /// wrong but still runs is returned as a warning.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        if self.response_mock_name.trim().is_empty() {
            return Err(ConfigError::EmptyMockName);
        }

        let mut warnings = Vec::new();

        if !self.response_end_functions.values().any(|enabled| *enabled) {
            warnings.push(ConfigWarning::NoFinishers);
        }

        for (name, enabled) in &self.response_end_functions {
            if !enabled {
                warnings.push(ConfigWarning::DisabledFinisher { name: name.clone() });
            }
        }

        if self.finish_timeout_ms == Some(0) {
            warnings.push(ConfigWarning::ZeroTimeout);
        }

        Ok(warnings)
    }
}

/// Configuration warnings that don't prevent scenarios from running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// No function can end an HTTP response, so HTTP scenarios cannot validate.
    NoFinishers,
    /// A finisher name is listed but disabled.
    DisabledFinisher { name: String },
    /// A zero timeout fails every scenario that yields before finishing.
    ZeroTimeout,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::NoFinishers => {
                write!(f, "Warning [response_end_functions]: no finisher is enabled")
            }
            ConfigWarning::DisabledFinisher { name } => {
                write!(f, "Warning [response_end_functions]: '{}' is disabled", name)
            }
            ConfigWarning::ZeroTimeout => {
                write!(f, "Warning [finish_timeout_ms]: timeout is zero")
            }
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("response_mock_name must not be empty")]
    EmptyMockName,
}
