use crate::{
    discord::{Context, Error},
    session::Role,
};

/// Sets the GeoGuessr session used for commands and daily challenges.
#[poise::command(prefix_command, dm_only, hide_in_help)]
pub async fn maintoken(ctx: Context<'_>, #[rest] token: Option<String>) -> Result<(), Error> {
    set_token(ctx, Role::Main, token).await
}

/// Sets the GeoGuessr session which plays daily challenges to unlock leaderboards.
#[poise::command(prefix_command, dm_only, hide_in_help)]
pub async fn autotoken(ctx: Context<'_>, #[rest] token: Option<String>) -> Result<(), Error> {
    set_token(ctx, Role::Auto, token).await
}

async fn set_token(ctx: Context<'_>, role: Role, token: Option<String>) -> Result<(), Error> {
    ctx.data()
        .sessions
        .lock()
        .await
        .set_token(ctx.author().id.get(), role, token.as_deref().unwrap_or_default())
        .await?;

    log::info!("Updated the {} token.", role);
    ctx.say(format!("Updated the {} token.", role)).await?;
    Ok(())
}

/// Registers all slash commands globally.
#[poise::command(prefix_command, dm_only, hide_in_help, check = "crate::checks::is_owner")]
pub async fn sync(ctx: Context<'_>) -> Result<(), Error> {
    let commands = &ctx.framework().options().commands;
    poise::builtins::register_globally(ctx.http(), commands).await?;

    log::info!("Registered {} commands globally.", commands.len());
    ctx.say("Registered slash commands globally.").await?;
    Ok(())
}
