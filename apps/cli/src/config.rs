//! Engine configuration.
//!
//! Read from `$XDG_CONFIG_HOME/clouddisk/config.json`, falling back to
//! `~/.config/clouddisk/config.json`. Missing keys take their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use clouddisk_change_feed::FeedConfig;
use clouddisk_protocol::constants::{
    DEFAULT_DEDUP_BLOCK_SIZE, DEFAULT_TRANSFER_CHUNK_SIZE, DOWNLOAD_TIMEOUT,
    FEED_MAX_RECONNECT_ATTEMPTS, FEED_RECONNECT_DELAY, MAX_FILE_SIZE,
};
use clouddisk_uploader::UploaderConfig;

/// Environment variable overriding the configured token.
pub const TOKEN_ENV: &str = "CLOUDDISK_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub reconnect_delay_secs: u64,
    pub max_reconnect_attempts: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: FEED_RECONNECT_DELAY.as_secs(),
            max_reconnect_attempts: FEED_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub api_base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    pub max_file_size: u64,
    pub transfer_chunk_size: usize,
    pub dedup_block_size: usize,
    pub download_timeout_secs: u64,
    pub feed: FeedSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".into(),
            auth_token: None,
            max_file_size: MAX_FILE_SIZE,
            transfer_chunk_size: DEFAULT_TRANSFER_CHUNK_SIZE,
            dedup_block_size: DEFAULT_DEDUP_BLOCK_SIZE,
            download_timeout_secs: DOWNLOAD_TIMEOUT.as_secs(),
            feed: FeedSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Loads the configuration file and applies the token override.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&config_path()?)?;
        if let Ok(token) = std::env::var(TOKEN_ENV)
            && !token.is_empty()
        {
            config.auth_token = Some(token);
        }
        Ok(config)
    }

    /// Reads `path`; a missing file yields defaults, an unparsable one
    /// yields defaults with a warning.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<Self>(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config, using defaults"
                );
                Ok(Self::default())
            }
        }
    }

    pub fn uploader(&self) -> UploaderConfig {
        UploaderConfig {
            max_file_size: self.max_file_size,
            transfer_chunk_size: self.transfer_chunk_size,
        }
    }

    pub fn feed(&self) -> FeedConfig {
        FeedConfig {
            reconnect_delay: Duration::from_secs(self.feed.reconnect_delay_secs),
            max_reconnect_attempts: self.feed.max_reconnect_attempts,
        }
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

pub fn config_path() -> anyhow::Result<PathBuf> {
    Ok(config_base_dir()?.join("clouddisk").join("config.json"))
}

fn config_base_dir() -> anyhow::Result<PathBuf> {
    if let Ok(dir) = std::env::var("XDG_CONFIG_HOME")
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("neither XDG_CONFIG_HOME nor HOME is set"))?;
    Ok(PathBuf::from(home).join(".config"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.max_file_size, 100 * 1024 * 1024);
        assert_eq!(cfg.transfer_chunk_size, 2 * 1024 * 1024);
        assert_eq!(cfg.dedup_block_size, 4 * 1024 * 1024);
        assert_eq!(cfg.feed().reconnect_delay, Duration::from_secs(3));
        assert_eq!(cfg.feed().max_reconnect_attempts, 5);
        assert!(cfg.auth_token.is_none());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EngineConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"api_base_url":"https://disk.example","feed":{"max_reconnect_attempts":2}}"#,
        )
        .unwrap();

        let cfg = EngineConfig::load_from(&path).unwrap();
        assert_eq!(cfg.api_base_url, "https://disk.example");
        assert_eq!(cfg.feed.max_reconnect_attempts, 2);
        assert_eq!(cfg.feed.reconnect_delay_secs, 3);
        assert_eq!(cfg.transfer_chunk_size, DEFAULT_TRANSFER_CHUNK_SIZE);
    }

    #[test]
    fn unparsable_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(
            EngineConfig::load_from(&path).unwrap(),
            EngineConfig::default()
        );
    }

    #[test]
    fn uploader_settings_follow_config() {
        let cfg = EngineConfig {
            max_file_size: 10,
            transfer_chunk_size: 4,
            ..EngineConfig::default()
        };
        let up = cfg.uploader();
        assert_eq!(up.max_file_size, 10);
        assert_eq!(up.transfer_chunk_size, 4);
    }
}
