//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.relaybot/config.json`) and
//! environment. Endpoints, timeouts, and the poll cooldown live here; the
//! host wiring stays in the CLI.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Relay endpoint settings.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Scheduled-message poll settings.
    #[serde(default)]
    pub poll: PollConfig,
}

/// Relay endpoint: URL, request timeout, and mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Remote endpoint receiving `{room, sender, msg}` per message.
    /// Overridden by RELAYBOT_RELAY_URL env when set.
    pub url: Option<String>,

    /// Relay request timeout in seconds (default 20; diagnostic builds
    /// typically use 3).
    #[serde(default = "default_relay_timeout_secs")]
    pub timeout_secs: u64,

    /// "production" suppresses error detail from chat; "diagnostic" surfaces
    /// raw status/error text as the reply.
    #[serde(default)]
    pub mode: RelayMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Fail silently; errors are only visible via /check-error.
    #[default]
    Production,

    /// Surface stringified errors and "no reply" notices in chat. Expects the
    /// response nested under a `test_response` wrapper.
    Diagnostic,
}

/// Poll endpoint: URL, cooldown interval, timeout, and trigger style.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollConfig {
    /// Endpoint returning queued outbound messages. Polling is disabled when
    /// unset. Overridden by RELAYBOT_POLL_URL env when set.
    pub url: Option<String>,

    /// Minimum seconds between polls (default 60).
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    /// Poll request timeout in seconds (default 10).
    #[serde(default = "default_poll_timeout_secs")]
    pub timeout_secs: u64,

    /// When true, a poll attempt also piggybacks on each inbound message
    /// (fallback for hosts without timer support). The interval gate applies
    /// either way.
    #[serde(default)]
    pub on_message: bool,
}

fn default_relay_timeout_secs() -> u64 {
    20
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_poll_timeout_secs() -> u64 {
    10
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_relay_timeout_secs(),
            mode: RelayMode::default(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            url: None,
            interval_secs: default_poll_interval_secs(),
            timeout_secs: default_poll_timeout_secs(),
            on_message: false,
        }
    }
}

impl RelayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Resolve the relay URL: env RELAYBOT_RELAY_URL overrides config.
pub fn resolve_relay_url(config: &Config) -> Option<String> {
    env_nonempty("RELAYBOT_RELAY_URL").or_else(|| {
        config
            .relay
            .url
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve the poll URL: env RELAYBOT_POLL_URL overrides config.
pub fn resolve_poll_url(config: &Config) -> Option<String> {
    env_nonempty("RELAYBOT_POLL_URL").or_else(|| {
        config
            .poll
            .url
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve config path from env or default (~/.relaybot/config.json).
pub fn default_config_path() -> PathBuf {
    std::env::var("RELAYBOT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".relaybot").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or RELAYBOT_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeouts_and_interval() {
        let c = Config::default();
        assert_eq!(c.relay.timeout_secs, 20);
        assert_eq!(c.poll.interval_secs, 60);
        assert_eq!(c.poll.timeout_secs, 10);
        assert_eq!(c.relay.mode, RelayMode::Production);
        assert!(!c.poll.on_message);
        assert!(c.relay.url.is_none());
        assert!(c.poll.url.is_none());
    }

    #[test]
    fn parses_camel_case_config() {
        let c: Config = serde_json::from_str(
            r#"{
                "relay": {"url": "http://127.0.0.1:8002/api/relay", "timeoutSecs": 3, "mode": "diagnostic"},
                "poll": {"url": "http://127.0.0.1:8002/api/poll", "intervalSecs": 30, "onMessage": true}
            }"#,
        )
        .expect("parse config");
        assert_eq!(c.relay.timeout_secs, 3);
        assert_eq!(c.relay.mode, RelayMode::Diagnostic);
        assert_eq!(c.poll.interval_secs, 30);
        assert_eq!(c.poll.timeout_secs, 10);
        assert!(c.poll.on_message);
        assert_eq!(
            resolve_poll_url(&c).as_deref(),
            Some("http://127.0.0.1:8002/api/poll")
        );
    }

    #[test]
    fn empty_object_is_all_defaults() {
        let c: Config = serde_json::from_str("{}").expect("parse empty config");
        assert_eq!(c.relay.timeout_secs, 20);
        assert!(c.relay.url.is_none());
        assert!(c.poll.url.is_none());
    }
}
