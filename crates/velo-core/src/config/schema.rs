//! Configuration schema for velo.toml
//!
//! ```toml
//! [server]
//! url = "https://octopus.example.com/"
//! api_key = "API-XXXXXXXX"
//!
//! [polling]
//! interval_ms = 1000
//! in_progress_states = ["Queued", "Executing", "Cancelling"]
//!
//! [packages]
//! bootstrapper_package_id = "velo-bootstrapper"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Root configuration structure for velo.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VeloConfig {
    pub server: ServerConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub packages: PackageConfig,
}

impl VeloConfig {
    pub fn new(server: ServerConfig) -> Self {
        Self {
            server,
            polling: PollingConfig::default(),
            packages: PackageConfig::default(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.server.validate()?;
        self.polling.validate()?;
        self.packages.validate()?;
        Ok(())
    }
}

/// Connection settings for the deployment server.
///
/// The API key is never printed by `Debug`.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL, e.g. "https://octopus.example.com/"
    pub url: String,

    /// Value sent in the `X-Octopus-ApiKey` header
    pub api_key: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl ServerConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| anyhow::anyhow!("server.url '{}' is not a valid URL: {}", self.url, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!(
                "server.url '{}' must use http or https, not '{}'",
                self.url,
                parsed.scheme()
            );
        }
        if self.api_key.trim().is_empty() {
            anyhow::bail!("server.api_key must not be empty");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("server.request_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// How deployment completion is polled and how remote states are read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Remote states that mean the deployment succeeded
    #[serde(default = "default_success_states")]
    pub success_states: Vec<String>,

    /// Remote states that mean the deployment is still running
    #[serde(default = "default_in_progress_states")]
    pub in_progress_states: Vec<String>,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_success_states() -> Vec<String> {
    vec!["Success".to_string()]
}

fn default_in_progress_states() -> Vec<String> {
    vec![
        "Queued".to_string(),
        "Executing".to_string(),
        "Cancelling".to_string(),
    ]
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            success_states: default_success_states(),
            in_progress_states: default_in_progress_states(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.interval_ms == 0 {
            anyhow::bail!("polling.interval_ms must be greater than zero");
        }
        if self.success_states.is_empty() {
            anyhow::bail!("polling.success_states must list at least one state");
        }
        if let Some(state) = self
            .success_states
            .iter()
            .find(|s| self.in_progress_states.contains(s))
        {
            anyhow::bail!(
                "state '{}' cannot be both a success and an in-progress state",
                state
            );
        }
        Ok(())
    }
}

/// Coordinates of the packages bound into a release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    #[serde(default = "default_space_id")]
    pub space_id: String,

    /// Feed holding the bootstrapper package
    #[serde(default = "default_feed_id")]
    pub feed_id: String,

    #[serde(default = "default_bootstrapper_package_id")]
    pub bootstrapper_package_id: String,

    /// Step action the bootstrapper version is bound to
    #[serde(default = "default_bootstrapper_action_name")]
    pub bootstrapper_action_name: String,

    /// Maximum number of catalogue entries requested when resolving a constraint
    #[serde(default = "default_catalogue_size")]
    pub catalogue_size: u32,
}

fn default_space_id() -> String {
    "Spaces-1".to_string()
}

fn default_feed_id() -> String {
    "feeds-builtin".to_string()
}

fn default_bootstrapper_package_id() -> String {
    "velo-bootstrapper".to_string()
}

fn default_bootstrapper_action_name() -> String {
    "run velo".to_string()
}

fn default_catalogue_size() -> u32 {
    1000
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            space_id: default_space_id(),
            feed_id: default_feed_id(),
            bootstrapper_package_id: default_bootstrapper_package_id(),
            bootstrapper_action_name: default_bootstrapper_action_name(),
            catalogue_size: default_catalogue_size(),
        }
    }
}

impl PackageConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (field, value) in [
            ("packages.space_id", &self.space_id),
            ("packages.feed_id", &self.feed_id),
            ("packages.bootstrapper_package_id", &self.bootstrapper_package_id),
            ("packages.bootstrapper_action_name", &self.bootstrapper_action_name),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{} must not be empty", field);
            }
        }
        if self.catalogue_size == 0 {
            anyhow::bail!("packages.catalogue_size must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_api_key() {
        let server = ServerConfig::new("https://octopus/", "API-SECRET");
        let printed = format!("{:?}", server);
        assert!(!printed.contains("API-SECRET"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let server = ServerConfig::new("ftp://octopus/", "API-KEY");
        let err = server.validate().unwrap_err().to_string();
        assert!(err.contains("http or https"));
    }

    #[test]
    fn test_validate_rejects_blank_api_key() {
        let server = ServerConfig::new("https://octopus/", "   ");
        assert!(server.validate().is_err());
    }

    #[test]
    fn test_polling_defaults() {
        let polling = PollingConfig::default();
        assert_eq!(polling.interval(), Duration::from_secs(1));
        assert_eq!(polling.success_states, vec!["Success"]);
        assert!(polling.in_progress_states.contains(&"Executing".to_string()));
    }

    #[test]
    fn test_with_interval_saturates() {
        let polling = PollingConfig::default().with_interval(Duration::from_millis(250));
        assert_eq!(polling.interval_ms, 250);

        let polling = PollingConfig::default().with_interval(Duration::MAX);
        assert_eq!(polling.interval_ms, u64::MAX);
    }

    #[test]
    fn test_polling_rejects_overlapping_states() {
        let polling = PollingConfig {
            in_progress_states: vec!["Success".to_string()],
            ..PollingConfig::default()
        };
        let err = polling.validate().unwrap_err().to_string();
        assert!(err.contains("'Success'"));
    }

    #[test]
    fn test_package_defaults() {
        let packages = PackageConfig::default();
        assert_eq!(packages.bootstrapper_package_id, "velo-bootstrapper");
        assert_eq!(packages.bootstrapper_action_name, "run velo");
        assert!(packages.validate().is_ok());
    }
}
