//! Service configuration, assembled once at process start.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Configuration failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("decoding {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Computation started for each fill request.
    pub computation_name: String,
    /// How long a fill may wait for rendered output before it completes
    /// empty and the computation is stopped.
    pub fill_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            computation_name: "AndroidAutofill".into(),
            fill_timeout_ms: 30_000,
        }
    }
}

impl ServiceConfig {
    /// Load from a JSON file. Missing keys take their defaults.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Decode {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.computation_name.trim().is_empty() {
            return Err(ConfigError::Invalid("computation_name is empty".into()));
        }
        if self.fill_timeout_ms == 0 {
            return Err(ConfigError::Invalid("fill_timeout_ms must be non-zero".into()));
        }
        Ok(())
    }

    pub fn fill_timeout(&self) -> Duration {
        Duration::from_millis(self.fill_timeout_ms)
    }
}
