/// checks for permission to execute a specific command
pub mod checks;
/// All available discord commands
mod commands;
/// Daily challenge scheduling
mod daily;
/// discord setup
mod discord;
mod error;
/// GeoGuessr API access
mod geoguessr;
mod logger;
/// GeoGuessr account sessions
mod session;
/// Bot Settings
mod settings;
/// Bot state
mod state;
mod utils;

use anyhow::{anyhow, Context, Result};
use daily::{Daily, DiscordPoster};
use geoguessr::GeoGuessr;
use poise::serenity_prelude as serenity;
use session::{Role, SessionManager};
use settings::Settings;
use state::State;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;

/// How often the map catalog is reloaded.
const MAP_REFRESH: Duration = Duration::from_secs(20 * 60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    let settings = match Settings::new() {
        Ok(settings) if !settings.token.is_empty() => settings,
        _ => {
            if !Settings::path().exists() {
                Settings::default()
                    .save()
                    .await
                    .context("Failed to save default config.")?;
                println!("Created default settings. Please fill out. Exiting...");
            } else {
                println!("Settings are invalid or the discord token is missing. Exiting...");
            }
            std::process::exit(0);
        }
    };

    logger::init(&settings.log_file, settings.log_level()?)?;
    let timezone = settings.timezone()?;

    let http = Arc::new(serenity::Http::new(&settings.token));
    let owner = match settings.owner {
        Some(owner) => owner,
        None => http
            .get_current_application_info()
            .await
            .context("Could not access application info")?
            .owner
            .map(|owner| owner.id.get())
            .ok_or_else(|| anyhow!("Application has no owner, set `owner` in the settings."))?,
    };

    let sessions = SessionManager::load(&settings.data_dir, owner).await?;
    for role in [Role::Main, Role::Auto] {
        if let Some(session) = sessions.session(role) {
            log::info!(
                "Using {} token last verified at {}.",
                role,
                session.last_verified.format("%Y-%m-%d %H:%M UTC")
            );
        }
    }
    for role in sessions.missing() {
        log::error!(
            "No {} token configured. Send `!{}token <token>` to the bot via DM.",
            role,
            role
        );
    }
    let sessions = Arc::new(Mutex::new(sessions));
    let state = State::load(&settings.data_dir).await?;
    log::info!(
        "Loaded {} active daily challenges.",
        state.guilds().filter(|config| config.enabled).count()
    );
    let state = Arc::new(Mutex::new(state));

    let api = Arc::new(GeoGuessr::new(settings.request_timeout())?);
    let poster = Arc::new(DiscordPoster::new(http));
    let daily = Arc::new(
        Daily::new(sessions.clone(), state, api, poster, timezone)
            .with_auto_username(settings.auto_username.clone()),
    );

    let scheduler = daily.spawn_scheduler(settings.check_interval());
    let map_refresh = daily.spawn_map_refresh(MAP_REFRESH);

    let result = discord::run(settings, sessions, daily)
        .await
        .context("Failed to start discord.");

    if scheduler.has_finished() {
        log::warn!("Daily scheduler stopped before shutdown.");
    }
    scheduler.cancel().await;
    map_refresh.cancel().await;
    log::info!("Stopped.");

    result
}
