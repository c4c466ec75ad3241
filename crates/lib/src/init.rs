//! Initialize the configuration directory: create ~/.relaybot and a default config file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = r#"{
  "relay": {
    "url": "http://127.0.0.1:8002/api/relay",
    "timeoutSecs": 20,
    "mode": "production"
  },
  "poll": {
    "url": "http://127.0.0.1:8002/api/poll",
    "intervalSecs": 60,
    "timeoutSecs": 10,
    "onMessage": false
  }
}
"#;

/// Create the config directory and a default config file if they do not exist.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, DEFAULT_CONFIG)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!("config already exists at {}, skipping", config_path.display());
    }

    Ok(config_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn writes_parseable_default_config() {
        let dir = std::env::temp_dir().join(format!("relaybot-init-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.json");
        init_config_dir(&path).expect("init");
        let s = std::fs::read_to_string(&path).expect("read config");
        let config: Config = serde_json::from_str(&s).expect("parse default config");
        assert_eq!(config.poll.interval_secs, 60);
        assert!(config.relay.url.is_some());

        // second init leaves the existing file alone
        init_config_dir(&path).expect("re-init");
        std::fs::remove_dir_all(&dir).expect("cleanup");
    }
}
