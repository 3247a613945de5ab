//! Configuration loading and persistence.
//!
//! Settings live in `config.json` in the inbox-relay config directory and
//! can be overridden per process with `INBOX_*` environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use std::{fs, path::Path, path::PathBuf};

use crate::constants;
use crate::transport::to_ws_scheme;

/// Name of the config file inside [`Config::config_dir`].
const CONFIG_FILE: &str = "config.json";

/// Configuration for the inbox-relay client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// WebSocket endpoint of the chat server.
    pub ws_url: String,
    /// Base URL of the REST backend.
    pub backend_url: String,
    /// First reconnect delay in milliseconds.
    pub base_delay_ms: u64,
    /// Reconnect delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// How long notifications stay up, in milliseconds.
    pub notification_duration_ms: u64,
    /// Bearer token for REST calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// User the CLI logs in as when `--user-id` is not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ws_url: constants::DEFAULT_WS_URL.to_string(),
            backend_url: constants::DEFAULT_BACKEND_URL.to_string(),
            base_delay_ms: duration_ms(constants::DEFAULT_BASE_RECONNECT_DELAY),
            max_delay_ms: duration_ms(constants::DEFAULT_MAX_RECONNECT_DELAY),
            notification_duration_ms: duration_ms(constants::DEFAULT_NOTIFICATION_DURATION),
            api_token: None,
            user_id: None,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// `url` starts with one of `schemes` and names something after it.
fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    schemes
        .iter()
        .any(|scheme| url.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()))
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// Directory selection priority:
    /// 1. `#[cfg(test)]` (unit tests): `tmp/inbox-relay-test`
    /// 2. `INBOX_CONFIG_DIR` env var: explicit override
    /// 3. `INBOX_ENV=test`: `tmp/inbox-relay-test` (integration tests)
    /// 4. Default: platform config dir (Linux: ~/.config/inbox-relay)
    pub fn config_dir() -> Result<PathBuf> {
        let dir = {
            #[cfg(test)]
            {
                PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp/inbox-relay-test")
            }

            #[cfg(not(test))]
            {
                if let Ok(dir) = std::env::var("INBOX_CONFIG_DIR") {
                    PathBuf::from(dir)
                } else if crate::env::is_test_mode() {
                    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp/inbox-relay-test")
                } else {
                    dirs::config_dir()
                        .context("Could not determine config directory")?
                        .join("inbox-relay")
                }
            }
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        Ok(dir)
    }

    /// Path of the config file.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Loads configuration from file, with environment variable overrides.
    ///
    /// A missing file yields the defaults; an unreadable or invalid one is an
    /// error.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            log::debug!("[Config] No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Reads `path` without applying overrides.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `INBOX_*` overrides looked up through `lookup`.
    ///
    /// Numeric values that fail to parse are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("INBOX_WS_URL") {
            self.ws_url = url;
        }
        if let Some(url) = lookup("INBOX_BACKEND_URL") {
            self.backend_url = url;
        }

        // Token from env var (for CI)
        if let Some(token) = lookup("INBOX_TOKEN") {
            self.api_token = Some(token);
        }
        if let Some(user_id) = lookup("INBOX_USER_ID") {
            self.user_id = Some(user_id);
        }

        for (key, target) in [
            ("INBOX_BASE_DELAY_MS", &mut self.base_delay_ms),
            ("INBOX_MAX_DELAY_MS", &mut self.max_delay_ms),
        ] {
            if let Some(value) = lookup(key) {
                match value.parse::<u64>() {
                    Ok(ms) => *target = ms,
                    Err(_) => log::warn!("[Config] Ignoring non-numeric {}={:?}", key, value),
                }
            }
        }
    }

    /// Rewrite `http(s)://` chat endpoints to `ws(s)://` and trim a trailing
    /// slash from the backend URL.
    pub fn normalize(&mut self) {
        self.ws_url = to_ws_scheme(self.ws_url.trim());
        self.backend_url = self.backend_url.trim().trim_end_matches('/').to_string();
    }

    /// Reject settings the channel cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.ws_url.is_empty() {
            anyhow::bail!("ws_url must not be empty");
        }
        if !has_scheme(&self.ws_url, &["ws://", "wss://"]) {
            anyhow::bail!("ws_url must start with ws://, wss://, http:// or https://");
        }
        if self.backend_url.is_empty() {
            anyhow::bail!("backend_url must not be empty");
        }
        if !has_scheme(&self.backend_url, &["http://", "https://"]) {
            anyhow::bail!("backend_url must start with http:// or https://");
        }
        if self.base_delay_ms == 0 {
            anyhow::bail!("base_delay_ms must be greater than zero");
        }
        if self.max_delay_ms < self.base_delay_ms {
            anyhow::bail!(
                "max_delay_ms ({}) must not be below base_delay_ms ({})",
                self.max_delay_ms,
                self.base_delay_ms
            );
        }
        Ok(())
    }

    /// Persists the current configuration to the config directory.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Persists the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        // May hold a token: owner read/write only
        #[cfg(unix)]
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// JSON rendering with the token masked, for display.
    pub fn to_redacted_json(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.api_token.is_some() {
            shown.api_token = Some("********".to_string());
        }
        Ok(serde_json::to_string_pretty(&shown)?)
    }

    /// First reconnect delay.
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Reconnect delay cap.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Notification lifetime.
    pub fn notification_duration(&self) -> Duration {
        Duration::from_millis(self.notification_duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ws_url, "ws://localhost:8080/ws");
        assert_eq!(config.base_delay_ms, 1_000);
        assert_eq!(config.max_delay_ms, 30_000);
        assert_eq!(config.notification_duration_ms, 3_000);
        assert!(config.api_token.is_none());
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"ws_url":"wss://chat.example.com/ws","max_delay_ms":5000}"#)
            .expect("write");

        let config = Config::load_from_file(&path).expect("load");
        assert_eq!(config.ws_url, "wss://chat.example.com/ws");
        assert_eq!(config.max_delay_ms, 5_000);
        assert_eq!(config.base_delay_ms, 1_000);
        assert_eq!(config.backend_url, constants::DEFAULT_BACKEND_URL);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").expect("write");
        assert!(Config::load_from_file(&path).is_err());
    }

    #[test]
    fn test_save_round_trips_and_restricts_permissions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        let config = Config {
            api_token: Some("tok_123".to_string()),
            user_id: Some("u1".to_string()),
            ..Config::default()
        };

        config.save_to(&path).expect("save");
        assert_eq!(Config::load_from_file(&path).expect("load"), config);

        #[cfg(unix)]
        {
            let mode = fs::metadata(&path).expect("metadata").permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[
            ("INBOX_WS_URL", "wss://override.example.com/ws"),
            ("INBOX_TOKEN", "tok_env"),
            ("INBOX_USER_ID", "u9"),
            ("INBOX_BASE_DELAY_MS", "250"),
            ("INBOX_MAX_DELAY_MS", "2000"),
        ]));
        assert_eq!(config.ws_url, "wss://override.example.com/ws");
        assert_eq!(config.api_token.as_deref(), Some("tok_env"));
        assert_eq!(config.user_id.as_deref(), Some("u9"));
        assert_eq!(config.base_delay(), Duration::from_millis(250));
        assert_eq!(config.max_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_non_numeric_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[("INBOX_BASE_DELAY_MS", "soon")]));
        assert_eq!(config.base_delay_ms, 1_000);
    }

    #[test]
    fn test_normalize_rewrites_schemes() {
        let mut config = Config {
            ws_url: "https://chat.example.com/ws".to_string(),
            backend_url: "https://api.example.com/".to_string(),
            ..Config::default()
        };
        config.normalize();
        assert_eq!(config.ws_url, "wss://chat.example.com/ws");
        assert_eq!(config.backend_url, "https://api.example.com");
    }

    #[test]
    fn test_validate_rejects_bad_delays_and_urls() {
        let zero_base = Config {
            base_delay_ms: 0,
            ..Config::default()
        };
        assert!(zero_base.validate().is_err());

        let inverted = Config {
            base_delay_ms: 5_000,
            max_delay_ms: 1_000,
            ..Config::default()
        };
        assert!(inverted.validate().is_err());

        let no_url = Config {
            ws_url: String::new(),
            ..Config::default()
        };
        assert!(no_url.validate().is_err());

        for ws_url in ["chat.example.com/ws", "ftp://chat.example.com/ws", "ws://"] {
            let mut bad_scheme = Config {
                ws_url: ws_url.to_string(),
                ..Config::default()
            };
            bad_scheme.normalize();
            assert!(bad_scheme.validate().is_err(), "{ws_url} accepted");
        }

        let mut rewritten = Config {
            ws_url: "https://chat.example.com/ws".to_string(),
            ..Config::default()
        };
        rewritten.normalize();
        assert!(rewritten.validate().is_ok());

        let bad_backend = Config {
            backend_url: "api.example.com".to_string(),
            ..Config::default()
        };
        assert!(bad_backend.validate().is_err());
    }

    #[test]
    fn test_redacted_json_masks_token() {
        let config = Config {
            api_token: Some("tok_secret".to_string()),
            ..Config::default()
        };
        let json = config.to_redacted_json().expect("json");
        assert!(!json.contains("tok_secret"));
        assert!(json.contains("********"));
    }

    #[test]
    fn test_config_dir_in_tests_stays_in_repo() {
        let dir = Config::config_dir().expect("config dir");
        assert!(dir.ends_with("tmp/inbox-relay-test"));
    }
}
