use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};

const FILENAME: &str = "settings.yaml";

#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Discord's bot token
    pub token: String,
    /// Discord account id which owns the bot. Falls back to the application owner.
    pub owner: Option<u64>,
    /// Guilds the bot is allowed to stay in. Unset allows every guild.
    pub allowed_guilds: Option<Vec<u64>>,
    /// GeoGuessr nickname behind the auto token, hidden from leaderboards.
    pub auto_username: Option<String>,
    /// Timezone in which a new daily challenge starts
    pub timezone: String,
    /// Seconds between daily challenge checks
    pub check_interval: u64,
    /// Seconds before a GeoGuessr request is abandoned
    pub request_timeout: u64,
    /// Directory holding guild configuration and session tokens
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: String::new(),
            owner: None,
            allowed_guilds: None,
            auto_username: None,
            timezone: String::from("UTC"),
            check_interval: 60 * 60,
            request_timeout: 15,
            data_dir: PathBuf::from("data"),
            log_file: PathBuf::from("data/bot.log"),
            log_level: String::from("info"),
        }
    }
}

impl Settings {
    pub fn path() -> PathBuf {
        PathBuf::from(std::env::var("BOT_SETTINGS").unwrap_or_else(|_| FILENAME.to_string()))
    }

    pub fn new() -> Result<Self, ConfigError> {
        let settings_path = Self::path();

        Config::builder()
            .add_source(File::from(settings_path).required(false))
            // Eg.. `BOT_TOKEN=...` would set the `token` key
            .add_source(
                Environment::with_prefix("BOT")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("allowed_guilds"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("Invalid timezone `{}`: {}", self.timezone, e))
    }

    pub fn log_level(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.log_level)
            .with_context(|| format!("Invalid log level `{}`", self.log_level))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }

    pub fn is_guild_allowed(&self, guild_id: u64) -> bool {
        match &self.allowed_guilds {
            Some(allowed) => allowed.contains(&guild_id),
            None => true,
        }
    }

    pub async fn save(&self) -> Result<()> {
        crate::utils::write_yaml(&Self::path(), self)
            .await
            .context("Failed to save settings")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_guild_is_allowed_without_list() {
        let settings = Settings::default();
        assert!(settings.is_guild_allowed(42));
    }

    #[test]
    fn allow_list_restricts_guilds() {
        let settings = Settings {
            allowed_guilds: Some(vec![1, 2]),
            ..Default::default()
        };
        assert!(settings.is_guild_allowed(2));
        assert!(!settings.is_guild_allowed(3));
    }

    #[test]
    fn timezone_must_be_known() {
        let mut settings = Settings::default();
        assert_eq!(settings.timezone().unwrap(), chrono_tz::UTC);

        settings.timezone = "Europe/Amsterdam".into();
        assert_eq!(settings.timezone().unwrap(), chrono_tz::Europe::Amsterdam);

        settings.timezone = "Mars/Olympus_Mons".into();
        assert!(settings.timezone().is_err());
    }

    #[test]
    fn log_level_parses_case_insensitively() {
        let settings = Settings {
            log_level: "DEBUG".into(),
            ..Default::default()
        };
        assert_eq!(settings.log_level().unwrap(), LevelFilter::Debug);
    }
}
