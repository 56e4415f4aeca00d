use crate::{
    commands, daily::Daily, error::BotError, session::SessionManager, settings::Settings, Result,
};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared with every command invocation.
pub struct Data {
    pub settings: Settings,
    pub sessions: Arc<Mutex<SessionManager>>,
    pub daily: Arc<Daily>,
}

pub async fn run(
    settings: Settings,
    sessions: Arc<Mutex<SessionManager>>,
    daily: Arc<Daily>,
) -> Result<()> {
    let token = settings.token.clone();
    let intents = serenity::GatewayIntents::GUILDS | serenity::GatewayIntents::DIRECT_MESSAGES;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::list(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some("!".into()),
                case_insensitive_commands: true,
                ..Default::default()
            },
            on_error: |error| Box::pin(on_error(error)),
            pre_command: |ctx| {
                Box::pin(async move {
                    log::info!(
                        "{}",
                        invocation_line(&ctx.command().qualified_name, &ctx.author().name)
                    );
                })
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |_ctx, ready, _framework| {
            Box::pin(async move {
                log::info!("Connected as {}", ready.user.name);
                Ok(Data {
                    settings,
                    sessions,
                    daily,
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutting down.");
            shard_manager.shutdown_all().await;
        }
    });

    Ok(client.start().await?)
}

/// Arguments are left out, token commands carry session cookies.
fn invocation_line(command: &str, author: &str) -> String {
    format!("Got command '{}' by user '{}'", command, author)
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        // Sent for every guild after connecting and whenever the bot joins one.
        serenity::FullEvent::GuildCreate { guild, .. } => {
            if !data.settings.is_guild_allowed(guild.id.get()) {
                log::warn!(
                    "Leaving guild '{}' ({}) since it is not allowed.",
                    guild.name,
                    guild.id
                );
                guild.id.leave(&ctx.http).await?;
            }
        }
        serenity::FullEvent::Resume { .. } => {
            log::info!("Connection to discord resumed.");
        }
        _ => {}
    }

    Ok(())
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            let reply = match error.downcast_ref::<BotError>() {
                Some(err) => {
                    log::warn!("Command '{}' failed: {}", ctx.command().name, err);
                    err.user_message()
                }
                None => {
                    log::error!("Command '{}' failed: {:#}", ctx.command().name, error);
                    "Something went wrong. Please try again later.".to_string()
                }
            };
            reply_ephemeral(ctx, reply).await;
        }
        poise::FrameworkError::CooldownHit {
            remaining_cooldown,
            ctx,
            ..
        } => {
            let reply = format!(
                "This command is on cooldown. Try again in {} seconds.",
                remaining_cooldown.as_secs().max(1)
            );
            reply_ephemeral(ctx, reply).await;
        }
        error => {
            if let Err(err) = poise::builtins::on_error(error).await {
                log::error!("Failed to handle error: {}", err);
            }
        }
    }
}

async fn reply_ephemeral(ctx: Context<'_>, content: String) {
    let reply = poise::CreateReply::default()
        .content(content)
        .ephemeral(true);
    if let Err(err) = ctx.send(reply).await {
        log::error!("Failed to report error to user: {}", err);
    }
}
