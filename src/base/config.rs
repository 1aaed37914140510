//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc, time::Duration};

use serde::Deserialize;

use super::types::Res;

/// Default seconds to wait for the actor to pick a choice on the capacity prompt.
fn default_confirm_timeout_secs() -> u64 {
    60
}

/// Default seconds to wait for the platform's "message pinned" notice.
fn default_pin_notice_timeout_secs() -> u64 {
    60
}

/// Default number of times a single pin request may try to free space.
fn default_max_eviction_attempts() -> u32 {
    3
}

/// Default emoji for "remove the oldest pin".
fn default_remove_oldest_emoji() -> String {
    "recycle".to_string()
}

/// Default emoji for "cancel".
fn default_cancel_emoji() -> String {
    "x".to_string()
}

/// Configuration for the pin-bot application.
#[derive(Debug, Clone)]
pub struct Config {
    /// The shared configuration values.
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// The configuration values.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConfigInner {
    /// Slack app token (`SLACK_APP_TOKEN`).
    pub slack_app_token: String,
    /// Slack bot token (`SLACK_BOT_TOKEN`).
    pub slack_bot_token: String,
    /// Seconds to wait for a choice on the capacity prompt (`CONFIRM_TIMEOUT_SECS`).
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
    /// Seconds to wait for the platform's pin notice (`PIN_NOTICE_TIMEOUT_SECS`).
    #[serde(default = "default_pin_notice_timeout_secs")]
    pub pin_notice_timeout_secs: u64,
    /// Capacity-exceeded rounds a single pin request may go through (`MAX_EVICTION_ATTEMPTS`).
    #[serde(default = "default_max_eviction_attempts")]
    pub max_eviction_attempts: u32,
    /// Emoji name offered to remove the oldest pin (`REMOVE_OLDEST_EMOJI`).
    #[serde(default = "default_remove_oldest_emoji")]
    pub remove_oldest_emoji: String,
    /// Emoji name offered to cancel (`CANCEL_EMOJI`).
    #[serde(default = "default_cancel_emoji")]
    pub cancel_emoji: String,
    /// Channels where pinning is allowed; empty allows all (`PIN_CHANNELS`).
    #[serde(default)]
    pub pin_channels: Vec<String>,
    /// Users holding the pin privilege; empty allows all (`PIN_USERS`).
    #[serde(default)]
    pub pin_users: Vec<String>,
}

impl Config {
    /// Load the configuration from the environment and an optional TOML file.
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(
            config::Environment::default()
                .prefix("PIN_BOT")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("pin_channels")
                .with_list_parse_key("pin_users"),
        );

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Check value ranges that `serde` cannot express.
    pub fn validate(&self) -> Res<()> {
        if self.confirm_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Confirmation timeout must be at least one second."));
        }

        if self.pin_notice_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Pin notice timeout must be at least one second."));
        }

        if self.max_eviction_attempts == 0 {
            return Err(anyhow::anyhow!("Max eviction attempts must be at least 1."));
        }

        if self.remove_oldest_emoji.is_empty() || self.cancel_emoji.is_empty() {
            return Err(anyhow::anyhow!("Choice emoji must not be empty."));
        }

        if self.remove_oldest_emoji == self.cancel_emoji {
            return Err(anyhow::anyhow!("Remove-oldest and cancel emoji must differ."));
        }

        Ok(())
    }

    /// How long to wait for a choice on the capacity prompt.
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    /// How long to wait for the platform's pin notice.
    pub fn pin_notice_timeout(&self) -> Duration {
        Duration::from_secs(self.pin_notice_timeout_secs)
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ConfigInner {
        ConfigInner {
            confirm_timeout_secs: default_confirm_timeout_secs(),
            pin_notice_timeout_secs: default_pin_notice_timeout_secs(),
            max_eviction_attempts: default_max_eviction_attempts(),
            remove_oldest_emoji: default_remove_oldest_emoji(),
            cancel_emoji: default_cancel_emoji(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_validate() {
        let config = Config::from(valid());

        assert!(config.validate().is_ok());
        assert_eq!(config.confirm_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn rejects_zero_attempts() {
        let config = Config::from(ConfigInner { max_eviction_attempts: 0, ..valid() });

        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_identical_choice_emoji() {
        let config = Config::from(ConfigInner {
            cancel_emoji: "recycle".to_string(),
            ..valid()
        });

        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_from_toml_file() {
        let path = std::env::temp_dir().join(format!("pin-bot-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
slack_app_token = "xapp-test"
slack_bot_token = "xoxb-test"
confirm_timeout_secs = 30
pin_channels = ["C1", "C2"]
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.slack_bot_token, "xoxb-test");
        assert_eq!(config.confirm_timeout_secs, 30);
        assert_eq!(config.pin_notice_timeout_secs, 60);
        assert_eq!(config.pin_channels, vec!["C1".to_string(), "C2".to_string()]);
        assert_eq!(config.cancel_emoji, "x");
    }
}
