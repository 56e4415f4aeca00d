use crate::{
    error::BotError,
    geoguessr::{Challenge, ChallengeOptions},
    utils,
};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

const FILENAME: &str = "guilds.yaml";

/// A daily challenge handed out to a guild.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLink {
    pub challenge: Challenge,
    /// Whether the auto account played it, which unlocks the leaderboard.
    #[serde(default)]
    pub guessed: bool,
}

impl DailyLink {
    pub fn new(challenge: Challenge) -> Self {
        Self {
            challenge,
            guessed: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuildDailyConfig {
    pub guild_id: u64,
    pub channel_id: u64,
    pub enabled: bool,
    pub last_sent_date: Option<NaiveDate>,
    #[serde(default)]
    pub options: ChallengeOptions,
    #[serde(default)]
    pub links: BTreeMap<NaiveDate, DailyLink>,
}

impl GuildDailyConfig {
    /// Whether today's challenge still needs to be posted.
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.enabled && self.last_sent_date.map_or(true, |sent| sent < today)
    }
}

/// Daily challenge configuration of every guild, not intended to be edited manually.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    #[serde(skip)]
    path: PathBuf,
    guilds: BTreeMap<u64, GuildDailyConfig>,
}

impl State {
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(FILENAME);
        let mut state: State = utils::read_yaml(&path)
            .await
            .context("Failed to load guild configuration")?
            .unwrap_or_default();
        state.path = path;
        Ok(state)
    }

    pub fn guild(&self, guild_id: u64) -> Option<&GuildDailyConfig> {
        self.guilds.get(&guild_id)
    }

    pub fn guilds(&self) -> impl Iterator<Item = &GuildDailyConfig> {
        self.guilds.values()
    }

    /// Guilds which haven't received today's challenge yet.
    pub fn due(&self, today: NaiveDate) -> Vec<u64> {
        self.guilds
            .values()
            .filter(|config| config.is_due(today))
            .map(|config| config.guild_id)
            .collect()
    }

    /// Enables the daily challenge for a guild and forgets today's link so
    /// the next send uses the new options.
    pub async fn setup(
        &mut self,
        guild_id: u64,
        channel_id: u64,
        options: ChallengeOptions,
        today: NaiveDate,
    ) -> Result<GuildDailyConfig> {
        let config = self
            .guilds
            .entry(guild_id)
            .or_insert_with(|| GuildDailyConfig {
                guild_id,
                channel_id,
                enabled: true,
                last_sent_date: None,
                options: ChallengeOptions::default(),
                links: BTreeMap::new(),
            });
        config.channel_id = channel_id;
        config.enabled = true;
        config.last_sent_date = None;
        config.options = options;
        config.links.remove(&today);
        let config = config.clone();

        self.save().await?;
        Ok(config)
    }

    pub async fn disable(&mut self, guild_id: u64) -> Result<()> {
        match self.guilds.get_mut(&guild_id) {
            Some(config) if config.enabled => config.enabled = false,
            _ => return Err(BotError::NotConfigured.into()),
        }
        self.save().await
    }

    pub async fn record_link(
        &mut self,
        guild_id: u64,
        date: NaiveDate,
        challenge: Challenge,
    ) -> Result<()> {
        self.config_mut(guild_id)?
            .links
            .insert(date, DailyLink::new(challenge));
        self.save().await
    }

    pub async fn mark_guessed(&mut self, guild_id: u64, date: NaiveDate) -> Result<()> {
        if let Some(link) = self.config_mut(guild_id)?.links.get_mut(&date) {
            link.guessed = true;
        }
        self.save().await
    }

    pub async fn mark_sent(&mut self, guild_id: u64, date: NaiveDate) -> Result<()> {
        self.config_mut(guild_id)?.last_sent_date = Some(date);
        self.save().await
    }

    fn config_mut(&mut self, guild_id: u64) -> Result<&mut GuildDailyConfig, BotError> {
        self.guilds
            .get_mut(&guild_id)
            .ok_or(BotError::NotConfigured)
    }

    pub async fn save(&self) -> Result<()> {
        utils::write_yaml(&self.path, self)
            .await
            .context("Failed to save guild configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: u64 = 10;
    const CHANNEL: u64 = 20;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[tokio::test]
    async fn setup_creates_a_single_enabled_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = State::load(dir.path()).await.unwrap();

        state
            .setup(GUILD, CHANNEL, ChallengeOptions::default(), day(1))
            .await
            .unwrap();
        state
            .setup(GUILD, CHANNEL + 1, ChallengeOptions::default(), day(1))
            .await
            .unwrap();

        let configs: Vec<_> = state.guilds().filter(|c| c.guild_id == GUILD).collect();
        assert_eq!(configs.len(), 1);
        assert!(configs[0].enabled);
        assert_eq!(configs[0].channel_id, CHANNEL + 1);
        assert_eq!(state.due(day(1)), vec![GUILD]);
    }

    #[tokio::test]
    async fn setup_replaces_todays_link_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = State::load(dir.path()).await.unwrap();
        state
            .setup(GUILD, CHANNEL, ChallengeOptions::default(), day(1))
            .await
            .unwrap();
        state
            .record_link(GUILD, day(1), Challenge::from_id("old"))
            .await
            .unwrap();
        state
            .record_link(GUILD, day(2), Challenge::from_id("today"))
            .await
            .unwrap();
        state.mark_sent(GUILD, day(2)).await.unwrap();

        state
            .setup(GUILD, CHANNEL, ChallengeOptions::default(), day(2))
            .await
            .unwrap();

        let config = state.guild(GUILD).unwrap();
        assert!(config.links.contains_key(&day(1)));
        assert!(!config.links.contains_key(&day(2)));
        assert!(config.is_due(day(2)));
    }

    #[tokio::test]
    async fn sent_guilds_are_not_due_until_tomorrow() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = State::load(dir.path()).await.unwrap();
        state
            .setup(GUILD, CHANNEL, ChallengeOptions::default(), day(1))
            .await
            .unwrap();
        state.mark_sent(GUILD, day(1)).await.unwrap();

        assert!(state.due(day(1)).is_empty());
        assert_eq!(state.due(day(2)), vec![GUILD]);
    }

    #[tokio::test]
    async fn disabled_guilds_are_never_due() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = State::load(dir.path()).await.unwrap();
        state
            .setup(GUILD, CHANNEL, ChallengeOptions::default(), day(1))
            .await
            .unwrap();
        state.disable(GUILD).await.unwrap();

        assert!(state.due(day(1)).is_empty());
        assert!(state.due(day(30)).is_empty());

        let err = state.disable(GUILD).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BotError>(),
            Some(BotError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn unknown_guilds_are_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = State::load(dir.path()).await.unwrap();

        let err = state.mark_sent(GUILD, day(1)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BotError>(),
            Some(BotError::NotConfigured)
        ));
        assert!(state.guild(GUILD).is_none());
    }

    #[tokio::test]
    async fn state_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = State::load(dir.path()).await.unwrap();
        let options = ChallengeOptions {
            map: "famous-places".into(),
            time_limit: 180,
            no_zoom: true,
            ..Default::default()
        };
        state
            .setup(GUILD, CHANNEL, options.clone(), day(1))
            .await
            .unwrap();
        state
            .record_link(GUILD, day(1), Challenge::from_id("abc"))
            .await
            .unwrap();
        state.mark_guessed(GUILD, day(1)).await.unwrap();
        state.mark_sent(GUILD, day(1)).await.unwrap();

        let reloaded = State::load(dir.path()).await.unwrap();
        let config = reloaded.guild(GUILD).unwrap();
        assert_eq!(config, state.guild(GUILD).unwrap());
        assert_eq!(config.options, options);
        assert!(config.links[&day(1)].guessed);
        assert_eq!(config.last_sent_date, Some(day(1)));
    }
}
