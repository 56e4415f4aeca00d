/// Daily challenge delivery
mod post;
/// Cancellable background work
mod task;

pub use post::{daily_embed, format_standings, DailyPost, DailyPoster, DiscordPoster};
pub use task::Task;

use crate::{
    error::BotError,
    geoguessr::{Challenge, ChallengeOptions, GeoApi, LeaderboardEntry, MapCatalog, MapInfo},
    session::{Role, SessionManager, SessionToken},
    state::{DailyLink, GuildDailyConfig, State},
};
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Serializes every operation touching the same guild's daily configuration.
#[derive(Default)]
struct GuildLocks(Mutex<HashMap<u64, Arc<Mutex<()>>>>);

impl GuildLocks {
    async fn lock(&self, guild_id: u64) -> OwnedMutexGuard<()> {
        let lock = self.0.lock().await.entry(guild_id).or_default().clone();
        lock.lock_owned().await
    }
}

/// Guilds touched by one scheduler cycle.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub sent: Vec<u64>,
    pub failed: Vec<u64>,
}

/// Creates challenges and keeps every guild's daily challenge going.
pub struct Daily {
    sessions: Arc<Mutex<SessionManager>>,
    state: Arc<Mutex<State>>,
    api: Arc<dyn GeoApi>,
    poster: Arc<dyn DailyPoster>,
    maps: RwLock<MapCatalog>,
    locks: GuildLocks,
    timezone: Tz,
    auto_username: Option<String>,
}

impl Daily {
    pub fn new(
        sessions: Arc<Mutex<SessionManager>>,
        state: Arc<Mutex<State>>,
        api: Arc<dyn GeoApi>,
        poster: Arc<dyn DailyPoster>,
        timezone: Tz,
    ) -> Self {
        Self {
            sessions,
            state,
            api,
            poster,
            maps: RwLock::new(MapCatalog::default()),
            locks: GuildLocks::default(),
            timezone,
            auto_username: None,
        }
    }

    /// Hides the auto account from leaderboards.
    pub fn with_auto_username(mut self, username: Option<String>) -> Self {
        self.auto_username = username;
        self
    }

    /// The current date in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    async fn token(&self, role: Role) -> Result<SessionToken, BotError> {
        self.sessions.lock().await.get_token(role)
    }

    async fn verified(&self, role: Role) {
        self.sessions.lock().await.mark_verified(role);
    }

    pub async fn create_challenge(&self, options: &ChallengeOptions) -> Result<Challenge> {
        let token = self.token(Role::Main).await?;

        log::info!(
            "Creating challenge on `{}` (time limit {}s, no move {}, no pan {}, no zoom {}).",
            options.map,
            options.time_limit,
            options.no_move,
            options.no_pan,
            options.no_zoom
        );
        let challenge = self.api.create_challenge(&token, options).await?;
        self.verified(Role::Main).await;

        Ok(challenge)
    }

    pub async fn setup_daily(
        &self,
        guild_id: u64,
        channel_id: u64,
        options: ChallengeOptions,
    ) -> Result<GuildDailyConfig> {
        let _guard = self.locks.lock(guild_id).await;
        let today = self.today();

        let config = self
            .state
            .lock()
            .await
            .setup(guild_id, channel_id, options, today)
            .await?;
        log::info!(
            "Daily challenge of guild {} set up in channel {}.",
            guild_id,
            channel_id
        );

        Ok(config)
    }

    pub async fn cancel_daily(&self, guild_id: u64) -> Result<()> {
        let _guard = self.locks.lock(guild_id).await;

        self.state.lock().await.disable(guild_id).await?;
        log::info!("Daily challenge of guild {} cancelled.", guild_id);

        Ok(())
    }

    /// The challenge a guild received on `date`.
    pub async fn challenge_on(&self, guild_id: u64, date: NaiveDate) -> Result<DailyLink> {
        let state = self.state.lock().await;
        let config = state.guild(guild_id).ok_or(BotError::NotConfigured)?;

        match config.links.get(&date) {
            Some(link) => Ok(link.clone()),
            None if date == self.today() => Err(BotError::NotConfigured.into()),
            None => Err(BotError::NoChallengeOn(date).into()),
        }
    }

    /// Days a guild received a challenge on, newest first.
    pub async fn recorded_days(&self, guild_id: u64) -> Vec<NaiveDate> {
        self.state
            .lock()
            .await
            .guild(guild_id)
            .map(|config| config.links.keys().rev().copied().collect())
            .unwrap_or_default()
    }

    pub async fn leaderboard(
        &self,
        guild_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<LeaderboardEntry>> {
        let _guard = self.locks.lock(guild_id).await;
        self.leaderboard_locked(guild_id, date).await
    }

    /// Caller holds the guild lock.
    async fn leaderboard_locked(
        &self,
        guild_id: u64,
        date: NaiveDate,
    ) -> Result<Vec<LeaderboardEntry>> {
        let link = self.challenge_on(guild_id, date).await?;
        let token = self.token(Role::Auto).await?;

        if !link.guessed {
            self.guess(guild_id, date, &token, &link.challenge).await?;
        }

        let mut entries = self.api.highscores(&token, &link.challenge).await?;
        self.verified(Role::Auto).await;

        if let Some(auto_username) = &self.auto_username {
            entries.retain(|entry| &entry.username != auto_username);
        }
        entries.sort_by(|a, b| b.score.cmp(&a.score));

        Ok(entries)
    }

    async fn guess(
        &self,
        guild_id: u64,
        date: NaiveDate,
        token: &SessionToken,
        challenge: &Challenge,
    ) -> Result<()> {
        log::info!(
            "Submitting placeholder guesses for guild {} ({}).",
            guild_id,
            date
        );
        self.api.submit_placeholder_guess(token, challenge).await?;
        self.verified(Role::Auto).await;
        self.state.lock().await.mark_guessed(guild_id, date).await
    }

    /// Posts today's challenge of a guild unless it already got one.
    ///
    /// Returns the posted challenge, `None` if nothing was due.
    pub async fn send_due(&self, guild_id: u64, today: NaiveDate) -> Result<Option<Challenge>> {
        let _guard = self.locks.lock(guild_id).await;

        let config = {
            let state = self.state.lock().await;
            match state.guild(guild_id) {
                Some(config) if config.is_due(today) => config.clone(),
                _ => return Ok(None),
            }
        };

        let link = match config.links.get(&today) {
            Some(link) => link.clone(),
            None => {
                let challenge = self.create_challenge(&config.options).await?;
                self.state
                    .lock()
                    .await
                    .record_link(guild_id, today, challenge.clone())
                    .await?;
                DailyLink::new(challenge)
            }
        };

        if !link.guessed {
            let token = self.token(Role::Auto).await?;
            self.guess(guild_id, today, &token, &link.challenge).await?;
        }

        let standings = match today.pred_opt() {
            Some(yesterday) if config.links.contains_key(&yesterday) => {
                match self.leaderboard_locked(guild_id, yesterday).await {
                    Ok(entries) => Some(entries),
                    Err(err) => {
                        log::warn!(
                            "Failed to get yesterday's leaderboard for guild {}: {:#}",
                            guild_id,
                            err
                        );
                        None
                    }
                }
            }
            _ => None,
        };

        let post = DailyPost {
            challenge: link.challenge.clone(),
            date: today,
            standings,
        };
        if let Err(err) = self.poster.post_daily(config.channel_id, &post).await {
            if let Some(BotError::ChannelGone(channel_id)) = err.downcast_ref::<BotError>() {
                log::warn!(
                    "Channel {} of guild {} is gone, disabling its daily challenge.",
                    channel_id,
                    guild_id
                );
                self.state.lock().await.disable(guild_id).await?;
            }
            return Err(err);
        }

        self.state.lock().await.mark_sent(guild_id, today).await?;
        log::info!("Sent daily challenge for guild {} ({}).", guild_id, today);

        Ok(Some(link.challenge))
    }

    /// Sends the challenge of every guild still waiting for today's.
    pub async fn run_cycle(&self) -> CycleReport {
        self.run_cycle_on(self.today()).await
    }

    pub async fn run_cycle_on(&self, today: NaiveDate) -> CycleReport {
        let due = self.state.lock().await.due(today);
        let mut report = CycleReport::default();

        for guild_id in due {
            match self.send_due(guild_id, today).await {
                Ok(Some(_)) => report.sent.push(guild_id),
                Ok(None) => {}
                Err(err) => {
                    log::error!(
                        "Failed to send daily challenge for guild {}: {:#}",
                        guild_id,
                        err
                    );
                    report.failed.push(guild_id);
                }
            }
        }

        report
    }

    /// Runs [`Daily::run_cycle`] every `period`, starting now.
    pub fn spawn_scheduler(self: &Arc<Self>, period: Duration) -> Task {
        let daily = Arc::clone(self);
        Task::periodic(period, move || {
            let daily = Arc::clone(&daily);
            async move {
                let report = daily.run_cycle().await;
                if !report.sent.is_empty() || !report.failed.is_empty() {
                    log::info!(
                        "Daily cycle finished: {} sent, {} failed.",
                        report.sent.len(),
                        report.failed.len()
                    );
                }
            }
        })
    }

    /// Reloads the map catalog every `period`, starting now.
    pub fn spawn_map_refresh(self: &Arc<Self>, period: Duration) -> Task {
        let daily = Arc::clone(self);
        Task::periodic(period, move || {
            let daily = Arc::clone(&daily);
            async move {
                match daily.refresh_maps().await {
                    Ok(count) => log::info!("Loaded {} maps.", count),
                    Err(err) => log::error!("Failed to load maps: {:#}", err),
                }
            }
        })
    }

    pub async fn refresh_maps(&self) -> Result<usize> {
        let token = self.token(Role::Main).await?;
        let maps = self.api.maps(&token).await?;
        self.verified(Role::Main).await;
        let popular = match self.api.popular_maps(&token).await {
            Ok(popular) => popular,
            Err(err) => {
                log::warn!("Failed to load popular maps: {:#}", err);
                Vec::new()
            }
        };

        let mut catalog = self.maps.write().await;
        catalog.replace(maps);
        catalog.extend(popular);
        Ok(catalog.len())
    }

    pub async fn resolve_map(&self, input: &str) -> Result<String, BotError> {
        self.maps
            .read()
            .await
            .resolve(input)
            .ok_or_else(|| BotError::MapNotFound(input.to_string()))
    }

    /// Name of a map, searched on GeoGuessr if the catalog doesn't know it.
    pub async fn map_name(&self, slug: &str) -> String {
        if let Some(name) = self.maps.read().await.name(slug) {
            return name.to_string();
        }

        match self.search_map_name(slug).await {
            Ok(Some(name)) => {
                self.maps.write().await.extend(vec![MapInfo {
                    slug: slug.to_string(),
                    name: name.clone(),
                    country_code: String::new(),
                }]);
                name
            }
            Ok(None) => {
                log::warn!("No map found for slug `{}`.", slug);
                slug.to_string()
            }
            Err(err) => {
                log::warn!("Failed to look up map `{}`: {:#}", slug, err);
                slug.to_string()
            }
        }
    }

    async fn search_map_name(&self, slug: &str) -> Result<Option<String>> {
        let token = self.token(Role::Main).await?;
        let name = self.api.search_map_name(&token, slug).await?;
        self.verified(Role::Main).await;
        Ok(name)
    }

    pub async fn suggest_maps(&self, partial: &str) -> Vec<(String, String)> {
        self.maps.read().await.suggest(partial)
    }
}
