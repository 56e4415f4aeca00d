use super::utils;
use crate::{
    daily::{daily_embed, format_standings, Daily},
    discord::{Context, Error},
    geoguessr::{Challenge, ChallengeOptions, LeaderboardEntry},
};
use anyhow::anyhow;
use chrono::NaiveDate;
use poise::serenity_prelude::{self as serenity, Mentionable};
use std::fmt::Display;

/// Seconds per round of daily challenges unless configured otherwise.
const DAILY_TIME_LIMIT: u32 = 180;

async fn autocomplete_map(ctx: Context<'_>, partial: &str) -> Vec<serenity::AutocompleteChoice> {
    ctx.data()
        .daily
        .suggest_maps(partial)
        .await
        .into_iter()
        .map(|(name, slug)| serenity::AutocompleteChoice::new(name, slug))
        .collect()
}

async fn autocomplete_day(ctx: Context<'_>, partial: &str) -> Vec<String> {
    let Some(guild_id) = ctx.guild_id() else {
        return Vec::new();
    };
    let mut days = vec!["today".to_string(), "yesterday".to_string()];
    days.extend(
        ctx.data()
            .daily
            .recorded_days(guild_id.get())
            .await
            .into_iter()
            .map(|day| day.format("%Y-%m-%d").to_string()),
    );

    days.into_iter()
        .filter(|day| day.starts_with(&partial.trim().to_lowercase()))
        .take(25)
        .collect()
}

fn challenge_reply(author: impl Display, url: &str, summary: &str) -> String {
    format!(
        "Hey {}! Here is your GeoGuessr challenge link:\n{}\n\n{}",
        author, url, summary
    )
}

/// The daily embed, with the leaderboard when it could be fetched.
fn geodaily_embed(
    challenge: &Challenge,
    date: NaiveDate,
    is_today: bool,
    standings: Option<&[LeaderboardEntry]>,
) -> serenity::CreateEmbed {
    let embed = daily_embed(challenge, date, is_today);
    match standings {
        Some(standings) => embed
            .field(
                "Top Players",
                format_standings(standings, "No one has played yet."),
                false,
            )
            .footer(serenity::CreateEmbedFooter::new("Leaderboard updated at"))
            .timestamp(serenity::Timestamp::now()),
        None => embed,
    }
}

fn guild_id(ctx: Context<'_>) -> Result<u64, Error> {
    ctx.guild_id()
        .map(|id| id.get())
        .ok_or_else(|| anyhow!("guild only command used outside of a guild"))
}

async fn challenge_options(
    daily: &Daily,
    map: Option<String>,
    time_limit: u32,
    no_move: Option<bool>,
    no_pan: Option<bool>,
    no_zoom: Option<bool>,
) -> Result<ChallengeOptions, Error> {
    let mut options = ChallengeOptions {
        time_limit,
        no_move: no_move.unwrap_or_default(),
        no_pan: no_pan.unwrap_or_default(),
        no_zoom: no_zoom.unwrap_or_default(),
        ..Default::default()
    };
    if let Some(map) = map {
        options.map = daily.resolve_map(&map).await?;
    }
    Ok(options)
}

/// Create a GeoGuessr challenge.
#[poise::command(slash_command, user_cooldown = 60)]
pub async fn geochallenge(
    ctx: Context<'_>,
    #[description = "Map name, country code or map url (default: World)"]
    #[autocomplete = "autocomplete_map"]
    map: Option<String>,
    #[rename = "time-limit"]
    #[description = "Seconds per round, 0 for no limit (default: 0)"]
    #[max = 600]
    time_limit: Option<u32>,
    #[rename = "no-moving"]
    #[description = "Forbid moving"]
    no_move: Option<bool>,
    #[rename = "no-panning"]
    #[description = "Forbid panning"]
    no_pan: Option<bool>,
    #[rename = "no-zooming"]
    #[description = "Forbid zooming"]
    no_zoom: Option<bool>,
) -> Result<(), Error> {
    ctx.defer().await?;

    let daily = &ctx.data().daily;
    let options = challenge_options(
        daily,
        map,
        time_limit.unwrap_or(0),
        no_move,
        no_pan,
        no_zoom,
    )
    .await?;
    let challenge = daily.create_challenge(&options).await?;
    let map_name = daily.map_name(&options.map).await;

    ctx.say(challenge_reply(
        ctx.author().mention(),
        &challenge.url,
        &options.summary(&map_name),
    ))
    .await?;
    Ok(())
}

/// Show the daily challenge and its leaderboard.
#[poise::command(slash_command, guild_only, user_cooldown = 20)]
pub async fn geodaily(
    ctx: Context<'_>,
    #[description = "today, yesterday or YYYY-MM-DD (default: today)"]
    #[autocomplete = "autocomplete_day"]
    date: Option<String>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let daily = &ctx.data().daily;
    let today = daily.today();
    let date = utils::parse_day(date.as_deref().unwrap_or("today"), today)?;

    ctx.defer().await?;
    let link = daily.challenge_on(guild_id, date).await?;
    let standings = match daily.leaderboard(guild_id, date).await {
        Ok(standings) => Some(standings),
        Err(err) => {
            log::warn!(
                "Failed to get the leaderboard of guild {} ({}): {:#}",
                guild_id,
                date,
                err
            );
            None
        }
    };

    let embed = geodaily_embed(&link.challenge, date, date == today, standings.as_deref());
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Post a GeoGuessr challenge to a channel every day.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    default_member_permissions = "MANAGE_GUILD"
)]
pub async fn setupgeodaily(
    ctx: Context<'_>,
    #[description = "Channel for the daily challenge (default: this channel)"]
    #[channel_types("Text", "News")]
    channel: Option<serenity::GuildChannel>,
    #[description = "Map name, country code or map url (default: World)"]
    #[autocomplete = "autocomplete_map"]
    map: Option<String>,
    #[rename = "time-limit"]
    #[description = "Seconds per round, 0 for no limit (default: 180)"]
    #[max = 600]
    time_limit: Option<u32>,
    #[rename = "no-moving"]
    #[description = "Forbid moving"]
    no_move: Option<bool>,
    #[rename = "no-panning"]
    #[description = "Forbid panning"]
    no_pan: Option<bool>,
    #[rename = "no-zooming"]
    #[description = "Forbid zooming"]
    no_zoom: Option<bool>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let channel_id = channel.map_or_else(|| ctx.channel_id(), |channel| channel.id);

    ctx.defer().await?;
    let daily = &ctx.data().daily;
    let options = challenge_options(
        daily,
        map,
        time_limit.unwrap_or(DAILY_TIME_LIMIT),
        no_move,
        no_pan,
        no_zoom,
    )
    .await?;
    daily
        .setup_daily(guild_id, channel_id.get(), options.clone())
        .await?;

    let map_name = daily.map_name(&options.map).await;
    ctx.say(format!(
        "Daily GeoGuessr challenge set up in <#{}>.\n\n{}",
        channel_id,
        options.summary(&map_name)
    ))
    .await?;

    if let Err(err) = daily.send_due(guild_id, daily.today()).await {
        log::error!(
            "Failed to send first daily challenge for guild {}: {:#}",
            guild_id,
            err
        );
        ctx.say("Today's challenge could not be sent yet, it will be retried later.")
            .await?;
    }
    Ok(())
}

/// Stop posting the daily challenge.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    default_member_permissions = "MANAGE_GUILD"
)]
pub async fn cancelgeodaily(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    ctx.data().daily.cancel_daily(guild_id).await?;

    ctx.say("Daily GeoGuessr challenge cancelled.").await?;
    Ok(())
}
