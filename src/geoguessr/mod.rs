/// reqwest backed implementation of [`GeoApi`]
mod client;
/// Map lookup for command arguments
mod maps;

pub use client::GeoGuessr;
pub use maps::MapCatalog;

use crate::session::SessionToken;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const BASE_URL: &str = "https://www.geoguessr.com";

/// Where the auto account guesses (somewhere in Antarctica).
pub const PLACEHOLDER_GUESS: Coordinate = Coordinate {
    lat: -83.0,
    lng: 0.0,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

/// A playable challenge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub challenge_id: String,
    pub url: String,
}

impl Challenge {
    pub fn from_id(challenge_id: impl Into<String>) -> Self {
        let challenge_id = challenge_id.into();
        Self {
            url: format!("{}/challenge/{}", BASE_URL, challenge_id),
            challenge_id,
        }
    }

    /// The url without its scheme, used as link text.
    pub fn short_url(&self) -> &str {
        self.url
            .strip_prefix("https://")
            .unwrap_or(self.url.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeOptions {
    /// Map slug
    pub map: String,
    /// Seconds per round, 0 means no limit.
    pub time_limit: u32,
    pub no_move: bool,
    pub no_pan: bool,
    pub no_zoom: bool,
}

impl Default for ChallengeOptions {
    fn default() -> Self {
        Self {
            map: String::from("world"),
            time_limit: 0,
            no_move: false,
            no_pan: false,
            no_zoom: false,
        }
    }
}

impl ChallengeOptions {
    pub fn summary(&self, map_name: &str) -> String {
        let time_limit = match self.time_limit {
            0 => "No limit".to_string(),
            seconds => format!("{}s", seconds),
        };
        let allowed = |forbidden: bool| if forbidden { "❌" } else { "✅" };

        format!(
            "Map: {}\nTime Limit: {}\nMoving: {}\nPanning: {}\nZooming: {}",
            map_name,
            time_limit,
            allowed(self.no_move),
            allowed(self.no_pan),
            allowed(self.no_zoom)
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LeaderboardEntry {
    pub username: String,
    pub user_id: String,
    pub score: u64,
    pub distance_m: f64,
}

impl LeaderboardEntry {
    pub fn profile_url(&self) -> String {
        format!("{}/user/{}", BASE_URL, self.user_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapInfo {
    pub slug: String,
    pub name: String,
    pub country_code: String,
}

/// The parts of the GeoGuessr API the bot talks to.
#[async_trait]
pub trait GeoApi: Send + Sync {
    async fn create_challenge(
        &self,
        token: &SessionToken,
        options: &ChallengeOptions,
    ) -> Result<Challenge>;

    /// Plays every round of `challenge` with [`PLACEHOLDER_GUESS`].
    async fn submit_placeholder_guess(
        &self,
        token: &SessionToken,
        challenge: &Challenge,
    ) -> Result<()>;

    /// Only available to accounts which played the challenge.
    async fn highscores(
        &self,
        token: &SessionToken,
        challenge: &Challenge,
    ) -> Result<Vec<LeaderboardEntry>>;

    /// Official maps from the map explorer.
    async fn maps(&self, token: &SessionToken) -> Result<Vec<MapInfo>>;

    /// The most popular community maps.
    async fn popular_maps(&self, token: &SessionToken) -> Result<Vec<MapInfo>>;

    /// Looks up the name of a map by its slug, `None` if there is no such map.
    async fn search_map_name(&self, token: &SessionToken, slug: &str) -> Result<Option<String>>;
}
