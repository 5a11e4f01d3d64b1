//! Configuration loading and persistence.
//!
//! Reads `push.json` from the config directory, then applies
//! `BOTSTER_PUSH_*` environment overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::batch::DEFAULT_CONCURRENCY;
use crate::vapid::MAX_TOKEN_TTL;

/// File name of the config file inside [`PushConfig::config_dir`].
pub const CONFIG_FILE: &str = "push.json";

/// Default key file name inside [`PushConfig::config_dir`].
pub const KEY_FILE: &str = "vapid_keys.json";

/// Configuration for push delivery.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct PushConfig {
    /// VAPID contact URI (`mailto:` or `https:`).
    pub subject: String,
    /// Key file; `None` means `<config_dir>/vapid_keys.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,
    /// VAPID token lifetime in seconds.
    pub token_ttl_secs: u64,
    /// Message TTL sent to the push service, in seconds.
    pub message_ttl_secs: u64,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
    /// Concurrent sends in a batch.
    pub concurrency: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            subject: String::new(),
            key_path: None,
            token_ttl_secs: 12 * 60 * 60,
            message_ttl_secs: 24 * 60 * 60,
            request_timeout_secs: 30,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl PushConfig {
    /// Returns the configuration directory path.
    ///
    /// Directory selection priority:
    /// 1. `BOTSTER_CONFIG_DIR` env var: explicit override
    /// 2. Default: platform config dir (macOS: ~/Library/Application Support/botster)
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("BOTSTER_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("botster"))
    }

    /// Loads configuration from the config directory, with environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_dir()?.join(CONFIG_FILE))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reads a config file; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Persists the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        // Set restrictive permissions (owner read/write only)
        #[cfg(unix)]
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `BOTSTER_PUSH_*` overrides from `lookup`. Unparsable numbers are
    /// ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(subject) = lookup("BOTSTER_PUSH_SUBJECT") {
            self.subject = subject;
        }

        if let Some(key_path) = lookup("BOTSTER_PUSH_KEY_PATH") {
            self.key_path = Some(PathBuf::from(key_path));
        }

        override_number(&lookup, "BOTSTER_PUSH_TOKEN_TTL", &mut self.token_ttl_secs);
        override_number(&lookup, "BOTSTER_PUSH_MESSAGE_TTL", &mut self.message_ttl_secs);
        override_number(&lookup, "BOTSTER_PUSH_TIMEOUT", &mut self.request_timeout_secs);
        override_number(&lookup, "BOTSTER_PUSH_CONCURRENCY", &mut self.concurrency);
    }

    /// Reject values no send could succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.token_ttl_secs == 0 || self.token_ttl_secs > MAX_TOKEN_TTL.as_secs() {
            anyhow::bail!(
                "token_ttl_secs must be between 1 and {} (got {})",
                MAX_TOKEN_TTL.as_secs(),
                self.token_ttl_secs
            );
        }
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Key file path, defaulting to `<config_dir>/vapid_keys.json`.
    pub fn key_path(&self) -> Result<PathBuf> {
        match &self.key_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join(KEY_FILE)),
        }
    }

    /// VAPID token lifetime.
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    /// Message TTL.
    pub fn message_ttl(&self) -> Duration {
        Duration::from_secs(self.message_ttl_secs)
    }

    /// HTTP timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn override_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut T,
) {
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => log::warn!("Ignoring {}={:?}: not a valid number", name, raw),
    }
}
