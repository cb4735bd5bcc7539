//! Configuration model for a CI run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{CiError, Result};

/// Root configuration for a CI run.
///
/// Every field has a default, so a partial JSON file only needs to name
/// the values it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CiConfig {
    /// Image repository that is built and pushed.
    pub image: String,
    /// Path to the Dockerfile.
    pub dockerfile: PathBuf,
    /// Build context directory.
    pub context: PathBuf,
    /// Repository slug allowed to publish.
    pub canonical_slug: String,
    /// Registry host for login; `None` means the runtime's default registry.
    pub registry: Option<String>,
    /// Container port of the web application.
    pub web_port: u16,
    /// Container port of the REST API.
    pub rest_port: u16,
    /// Expected `owner:group` of application paths.
    pub expected_owner: String,
    /// Readiness and retry timings.
    pub timings: Timings,
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            image: constants::DEFAULT_IMAGE.to_string(),
            dockerfile: PathBuf::from(constants::DEFAULT_DOCKERFILE),
            context: PathBuf::from(constants::DEFAULT_BUILD_CONTEXT),
            canonical_slug: constants::CANONICAL_REPO_SLUG.to_string(),
            registry: None,
            web_port: constants::WEB_PORT,
            rest_port: constants::REST_PORT,
            expected_owner: constants::EXPECTED_OWNER.to_string(),
            timings: Timings::default(),
        }
    }
}

impl CiConfig {
    /// Loads a configuration file, filling unspecified fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CiError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that would make a run meaningless.
    ///
    /// # Errors
    ///
    /// Returns `CiError::Config` naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(CiError::Config {
                message: "image must not be empty".into(),
            });
        }
        if !self.expected_owner.contains(':') {
            return Err(CiError::Config {
                message: format!(
                    "expected_owner must be owner:group, got {:?}",
                    self.expected_owner
                ),
            });
        }
        if self.timings.poll_interval_secs == 0 {
            return Err(CiError::Config {
                message: "poll_interval_secs must be positive".into(),
            });
        }
        if self.timings.web_attempts == 0 {
            return Err(CiError::Config {
                message: "web_attempts must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Polling, retry and wait timings, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Interval between readiness polls.
    pub poll_interval_secs: u64,
    /// Readiness bound for the smoke run.
    pub smoke_startup_timeout_secs: u64,
    /// Readiness bound for the structured suite.
    pub suite_startup_timeout_secs: u64,
    /// Per-request HTTP timeout.
    pub http_timeout_secs: u64,
    /// Attempts against the web endpoint.
    pub web_attempts: u32,
    /// Delay between web endpoint attempts.
    pub web_retry_delay_secs: u64,
    /// Wait before checking for the index directory.
    pub index_wait_secs: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval_secs: constants::POLL_INTERVAL_SECS,
            smoke_startup_timeout_secs: constants::SMOKE_STARTUP_TIMEOUT_SECS,
            suite_startup_timeout_secs: constants::SUITE_STARTUP_TIMEOUT_SECS,
            http_timeout_secs: constants::HTTP_TIMEOUT_SECS,
            web_attempts: constants::WEB_ATTEMPTS,
            web_retry_delay_secs: constants::WEB_RETRY_DELAY_SECS,
            index_wait_secs: constants::INDEX_WAIT_SECS,
        }
    }
}

impl Timings {
    /// Interval between readiness polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Per-request HTTP timeout.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Delay between web endpoint attempts.
    #[must_use]
    pub const fn web_retry_delay(&self) -> Duration {
        Duration::from_secs(self.web_retry_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_opengrok_image() {
        let cfg = CiConfig::default();
        assert_eq!(cfg.image, "opengrok/docker");
        assert_eq!(cfg.canonical_slug, "oracle/opengrok");
        assert_eq!(cfg.timings.smoke_startup_timeout_secs, 90);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ci.json");
        std::fs::write(&path, r#"{"image": "example/grok", "timings": {"web_attempts": 5}}"#)
            .expect("write");

        let cfg = CiConfig::load(&path).expect("load");
        assert_eq!(cfg.image, "example/grok");
        assert_eq!(cfg.timings.web_attempts, 5);
        assert_eq!(cfg.timings.poll_interval_secs, 3);
        assert_eq!(cfg.web_port, 8080);
    }

    #[test]
    fn load_rejects_owner_without_group() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ci.json");
        std::fs::write(&path, r#"{"expected_owner": "appuser"}"#).expect("write");
        assert!(matches!(CiConfig::load(&path), Err(CiError::Config { .. })));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = CiConfig::load(Path::new("/nonexistent/ci.json")).unwrap_err();
        assert!(matches!(err, CiError::Io { .. }));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut cfg = CiConfig::default();
        cfg.timings.poll_interval_secs = 0;
        assert!(cfg.validate().is_err());
    }
}
