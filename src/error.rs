//! Failures that end up in front of the person who ran a command.

use crate::session::Role;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    /// Token commands are reserved for the bot owner.
    #[error("caller is not the bot owner")]
    Unauthorized,
    #[error("no {0} token configured")]
    MissingToken(Role),
    /// GeoGuessr rejected the session, usually because the cookie expired.
    #[error("{0} token was rejected by geoguessr")]
    ExpiredToken(Role),
    #[error("token is empty")]
    EmptyToken,
    #[error("geoguessr request failed: {0}")]
    Upstream(String),
    #[error("geoguessr request timed out")]
    UpstreamTimeout,
    #[error("daily challenge is not set up")]
    NotConfigured,
    #[error("no daily challenge recorded for {0}")]
    NoChallengeOn(NaiveDate),
    #[error("map `{0}` not found")]
    MapNotFound(String),
    #[error("invalid date `{0}`")]
    InvalidDate(String),
    /// The daily channel was deleted or the bot lost access to it.
    #[error("channel {0} is gone")]
    ChannelGone(u64),
}

impl BotError {
    /// Short reply shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized => "You need to be the bot owner to execute this command.".into(),
            Self::MissingToken(role) => format!(
                "GeoGuessr is not configured yet (no {} session). Please contact the bot owner.",
                role
            ),
            Self::ExpiredToken(role) => format!(
                "The GeoGuessr {} session has expired. Please contact the bot owner.",
                role
            ),
            Self::EmptyToken => "The token must not be empty.".into(),
            Self::Upstream(_) => "Failed to reach GeoGuessr. Please try again later.".into(),
            Self::UpstreamTimeout => {
                "GeoGuessr took too long to respond. Please try again later.".into()
            }
            Self::NotConfigured => "Daily GeoGuessr challenge is not set up.".into(),
            Self::NoChallengeOn(_) => {
                "Daily GeoGuessr challenge for that date is not available.".into()
            }
            Self::MapNotFound(_) => "Map not found.".into(),
            Self::InvalidDate(_) => {
                "Invalid date. Use 'today', 'yesterday', or 'YYYY-MM-DD'.".into()
            }
            Self::ChannelGone(_) => "The daily challenge channel no longer exists.".into(),
        }
    }
}
