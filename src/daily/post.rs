use crate::{
    error::BotError,
    geoguessr::{Challenge, LeaderboardEntry},
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Only the top of the leaderboard fits into an embed field.
const STANDINGS_SHOWN: usize = 10;

/// Everything needed to announce a guild's daily challenge.
#[derive(Clone, Debug)]
pub struct DailyPost {
    pub challenge: Challenge,
    pub date: NaiveDate,
    /// Yesterday's leaderboard, if there was a challenge yesterday.
    pub standings: Option<Vec<LeaderboardEntry>>,
}

/// Delivers daily challenges to a channel.
#[async_trait]
pub trait DailyPoster: Send + Sync {
    async fn post_daily(&self, channel_id: u64, post: &DailyPost) -> Result<()>;
}

pub struct DiscordPoster {
    http: Arc<serenity::Http>,
}

impl DiscordPoster {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl DailyPoster for DiscordPoster {
    async fn post_daily(&self, channel_id: u64, post: &DailyPost) -> Result<()> {
        let mut embed = daily_embed(&post.challenge, post.date, true)
            .footer(serenity::CreateEmbedFooter::new(
                "Use of external help is not allowed (e.g. Google) · Good luck!",
            ));
        if let Some(standings) = &post.standings {
            embed = embed.field(
                "Yesterday's Top Players",
                format_standings(standings, "No one played yesterday."),
                false,
            );
        }

        let result = serenity::ChannelId::new(channel_id)
            .send_message(
                self.http.as_ref(),
                serenity::CreateMessage::new().embed(embed),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response)))
                if response.status_code.as_u16() == 404 =>
            {
                Err(BotError::ChannelGone(channel_id).into())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Embed announcing the challenge of `date`.
pub fn daily_embed(
    challenge: &Challenge,
    date: NaiveDate,
    is_today: bool,
) -> serenity::CreateEmbed {
    let description = if is_today {
        format!(
            "Here is the link to today's GeoGuessr challenge:\n[{}]({})",
            challenge.short_url(),
            challenge.url
        )
    } else {
        format!(
            "Here is the link to the GeoGuessr challenge on {}:\n[{}]({})",
            date.format("%A, %B %d, %Y"),
            challenge.short_url(),
            challenge.url
        )
    };

    serenity::CreateEmbed::new()
        .title("Daily GeoGuessr Challenge")
        .description(description)
        .colour(serenity::Colour::from_rgb(167, 199, 231))
        .author(
            serenity::CreateEmbedAuthor::new(date.format("%B %d %Y").to_string())
                .url(challenge.url.clone()),
        )
}

/// Renders the top of a leaderboard, one player per line.
pub fn format_standings(entries: &[LeaderboardEntry], empty: &str) -> String {
    if entries.is_empty() {
        return empty.to_string();
    }

    entries
        .iter()
        .take(STANDINGS_SHOWN)
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "{}. **[{}]({})** - {} points",
                i + 1,
                entry.username,
                entry.profile_url(),
                format_score(entry.score)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `21500` -> `21,500`
pub fn format_score(score: u64) -> String {
    let digits = score.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, score: u64) -> LeaderboardEntry {
        LeaderboardEntry {
            username: name.into(),
            user_id: format!("id-{}", name),
            score,
            distance_m: 0.0,
        }
    }

    #[test]
    fn scores_get_thousand_separators() {
        assert_eq!(format_score(0), "0");
        assert_eq!(format_score(999), "999");
        assert_eq!(format_score(1000), "1,000");
        assert_eq!(format_score(25000), "25,000");
        assert_eq!(format_score(1234567), "1,234,567");
    }

    #[test]
    fn standings_link_profiles() {
        let standings = format_standings(&[entry("alice", 21500), entry("bob", 800)], "-");
        assert_eq!(
            standings,
            "1. **[alice](https://www.geoguessr.com/user/id-alice)** - 21,500 points\n\
             2. **[bob](https://www.geoguessr.com/user/id-bob)** - 800 points"
        );
    }

    #[test]
    fn standings_show_top_ten_only() {
        let entries: Vec<_> = (0..15).map(|i| entry(&format!("p{}", i), 100)).collect();
        assert_eq!(format_standings(&entries, "-").lines().count(), STANDINGS_SHOWN);
    }

    #[test]
    fn empty_standings_use_placeholder() {
        assert_eq!(
            format_standings(&[], "No one played yesterday."),
            "No one played yesterday."
        );
    }
}
