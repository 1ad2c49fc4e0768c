use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::TeledateError;

/// Top-level Teledate configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// General bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    pub telegram: Option<TelegramConfig>,
}

/// Telegram bot config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    /// Allowed Telegram user IDs. Empty = allow all.
    #[serde(default)]
    pub allowed_users: Vec<i64>,
}

/// Store config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Maximum number of distinct users the bot will onboard.
    #[serde(default = "default_user_limit")]
    pub user_limit: i64,
    /// Per-user record count ceiling before oldest-first pruning.
    #[serde(default = "default_records_limit")]
    pub records_limit: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_limit: default_user_limit(),
            records_limit: default_records_limit(),
        }
    }
}

/// Scheduler configuration — recurring reminder delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

// --- Default value functions ---

fn default_name() -> String {
    "Teledate".to_string()
}
fn default_data_dir() -> String {
    "~/.teledate".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_db_path() -> String {
    "~/.teledate/teledate.db".to_string()
}
fn default_user_limit() -> i64 {
    2
}
fn default_records_limit() -> i64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_poll_interval() -> u64 {
    60
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load config from a TOML file, falling back to defaults when missing.
pub fn load(path: &str) -> Result<Config, TeledateError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| TeledateError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| TeledateError::Config(format!("failed to parse config: {e}")))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.bot.name, "Teledate");
        assert_eq!(cfg.store.user_limit, 2);
        assert_eq!(cfg.store.records_limit, 30);
        assert!(cfg.scheduler.enabled);
        assert_eq!(cfg.scheduler.poll_interval_secs, 60);
        assert!(cfg.channel.telegram.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml_str = r#"
            [channel.telegram]
            enabled = true
            bot_token = "123:abc"

            [store]
            records_limit = 12
        "#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        let tg = cfg.channel.telegram.unwrap();
        assert!(tg.enabled);
        assert_eq!(tg.bot_token, "123:abc");
        assert!(tg.allowed_users.is_empty());
        assert_eq!(cfg.store.records_limit, 12);
        assert_eq!(cfg.store.user_limit, 2);
        assert_eq!(cfg.bot.log_level, "info");
    }

    #[test]
    fn test_shellexpand_home() {
        std::env::set_var("HOME", "/home/tester");
        assert_eq!(shellexpand("~/data/db"), "/home/tester/data/db");
        assert_eq!(shellexpand("/abs/path"), "/abs/path");
        assert_eq!(shellexpand(":memory:"), ":memory:");
    }
}
