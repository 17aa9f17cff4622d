//! Release settings loaded from YAML.
//!
//! Settings live under a `portKiller` section of `application.yml`, looked
//! up in the working directory first and then at
//! `~/.portreaper/application.yml`.
//!
//! ```yaml
//! portKiller:
//!   ports: [8080, 9090]
//!   onlyListening: true
//!   forceKill: true
//!   dryRun: false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::application::{
    KillPolicy, SweepOptions, DEFAULT_LISTING_TIMEOUT, DEFAULT_NAME_LOOKUP_TIMEOUT,
};
use crate::error::{Error, Result};

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "application.yml";

/// Settings of one release run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Ports to free, in order.
    #[serde(default)]
    pub ports: Vec<u16>,

    /// Only consider sockets in the listening state.
    #[serde(default = "default_true")]
    pub only_listening: bool,

    /// Force termination; also makes exhaustion a hard failure.
    #[serde(default = "default_true")]
    pub force_kill: bool,

    /// Report what would be killed without killing.
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_primary_timeout_ms")]
    pub primary_timeout_ms: u64,

    #[serde(default = "default_fallback_timeout_ms")]
    pub fallback_timeout_ms: u64,

    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_listing_timeout_ms")]
    pub listing_timeout_ms: u64,

    #[serde(default = "default_name_lookup_timeout_ms")]
    pub name_lookup_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    KillPolicy::default().max_attempts
}

fn default_primary_timeout_ms() -> u64 {
    KillPolicy::default().primary_timeout.as_millis() as u64
}

fn default_fallback_timeout_ms() -> u64 {
    KillPolicy::default().fallback_timeout.as_millis() as u64
}

fn default_settle_delay_ms() -> u64 {
    KillPolicy::default().settle_delay.as_millis() as u64
}

fn default_retry_delay_ms() -> u64 {
    KillPolicy::default().retry_delay.as_millis() as u64
}

fn default_listing_timeout_ms() -> u64 {
    DEFAULT_LISTING_TIMEOUT.as_millis() as u64
}

fn default_name_lookup_timeout_ms() -> u64 {
    DEFAULT_NAME_LOOKUP_TIMEOUT.as_millis() as u64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ports: Vec::new(),
            only_listening: true,
            force_kill: true,
            dry_run: false,
            max_attempts: default_max_attempts(),
            primary_timeout_ms: default_primary_timeout_ms(),
            fallback_timeout_ms: default_fallback_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            listing_timeout_ms: default_listing_timeout_ms(),
            name_lookup_timeout_ms: default_name_lookup_timeout_ms(),
        }
    }
}

impl Config {
    /// Reject settings the release loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.ports.contains(&0) {
            return Err(Error::Config("Port 0 is not a valid port".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(Error::Config("maxAttempts must be at least 1".to_string()));
        }

        let timeouts = [
            ("primaryTimeoutMs", self.primary_timeout_ms),
            ("fallbackTimeoutMs", self.fallback_timeout_ms),
            ("listingTimeoutMs", self.listing_timeout_ms),
            ("nameLookupTimeoutMs", self.name_lookup_timeout_ms),
        ];
        if let Some((key, _)) = timeouts.iter().find(|(_, ms)| *ms == 0) {
            return Err(Error::Config(format!("{} must be greater than 0", key)));
        }
        Ok(())
    }

    /// Termination loop bounds.
    pub fn kill_policy(&self) -> KillPolicy {
        KillPolicy {
            max_attempts: self.max_attempts,
            primary_timeout: Duration::from_millis(self.primary_timeout_ms),
            fallback_timeout: Duration::from_millis(self.fallback_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_millis(self.listing_timeout_ms)
    }

    pub fn name_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.name_lookup_timeout_ms)
    }

    pub fn sweep_options(&self) -> SweepOptions {
        SweepOptions {
            only_listening: self.only_listening,
            force_kill: self.force_kill,
            dry_run: self.dry_run,
        }
    }
}

/// Top-level layout of the YAML file.
#[derive(Debug, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(rename = "portKiller")]
    port_killer: Option<Config>,
}

/// Locates and reads the configuration file.
pub struct ConfigStore {
    /// Path to the configuration file.
    config_path: PathBuf,
}

impl ConfigStore {
    /// Config store for an explicit file.
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// `./application.yml` if it exists, else `~/.portreaper/application.yml`.
    pub fn discover() -> Result<Self> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Ok(Self::with_path(local));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
        Ok(Self::with_path(home.join(".portreaper").join(CONFIG_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load and validate the configuration.
    ///
    /// Returns defaults if the file doesn't exist.
    pub async fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        let config = Self::parse(&content)?;
        tracing::debug!(path = %self.config_path.display(), "Loaded config");
        Ok(config)
    }

    /// Parse and validate a YAML document.
    pub fn parse(content: &str) -> Result<Config> {
        let file: ConfigFile = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        let config = file
            .port_killer
            .ok_or_else(|| Error::Config("Missing portKiller section".to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render a configuration as a YAML document with its section.
    pub fn render(config: &Config) -> Result<String> {
        let file = ConfigFile {
            port_killer: Some(config.clone()),
        };
        Ok(serde_yaml::to_string(&file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::with_path(dir.path().join(CONFIG_FILE_NAME));

        let config = store.load().await.unwrap();
        assert_eq!(config, Config::default());
        assert!(config.only_listening);
        assert!(config.force_kill);
        assert!(!config.dry_run);
        assert_eq!(config.kill_policy(), KillPolicy::default());
        assert_eq!(config.sweep_options(), SweepOptions::default());
    }

    #[tokio::test]
    async fn test_load_partial_section() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "server:\n  port: 80\nportKiller:\n  ports: [8080, 9090]\n  forceKill: false\n  maxAttempts: 2\n",
        )
        .unwrap();

        let config = ConfigStore::with_path(&path).load().await.unwrap();
        assert_eq!(config.ports, vec![8080, 9090]);
        assert!(!config.force_kill);
        assert!(config.only_listening);
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.settle_delay_ms, 800);
        assert_eq!(config.listing_timeout(), Duration::from_secs(8));
    }

    #[test]
    fn test_missing_section_is_error() {
        let result = ConfigStore::parse("server:\n  port: 80\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let result = ConfigStore::parse("portKiller: [unclosed");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validation() {
        assert!(ConfigStore::parse("portKiller:\n  ports: [0]\n").is_err());
        assert!(ConfigStore::parse("portKiller:\n  maxAttempts: 0\n").is_err());
        assert!(ConfigStore::parse("portKiller:\n  ports: [65535]\n").is_ok());
    }

    #[test]
    fn test_zero_command_timeouts_rejected() {
        for key in [
            "primaryTimeoutMs",
            "fallbackTimeoutMs",
            "listingTimeoutMs",
            "nameLookupTimeoutMs",
        ] {
            let yaml = format!("portKiller:\n  {}: 0\n", key);
            let err = ConfigStore::parse(&yaml).unwrap_err();
            assert!(err.to_string().contains(key), "{}", err);
        }

        // Delays may be zero
        assert!(ConfigStore::parse("portKiller:\n  settleDelayMs: 0\n  retryDelayMs: 0\n").is_ok());
    }

    #[test]
    fn test_kill_policy_conversion() {
        let config = ConfigStore::parse(
            "portKiller:\n  primaryTimeoutMs: 1000\n  fallbackTimeoutMs: 500\n  retryDelayMs: 0\n",
        )
        .unwrap();

        let policy = config.kill_policy();
        assert_eq!(policy.primary_timeout, Duration::from_secs(1));
        assert_eq!(policy.fallback_timeout, Duration::from_millis(500));
        assert_eq!(policy.retry_delay, Duration::ZERO);
        assert_eq!(policy.max_attempts, 4);
    }

    #[test]
    fn test_render_uses_section_keys() {
        let rendered = ConfigStore::render(&Config::default()).unwrap();
        assert!(rendered.contains("portKiller:"));
        assert!(rendered.contains("onlyListening: true"));

        let parsed = ConfigStore::parse(&rendered).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
