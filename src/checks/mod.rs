use crate::discord::Context;
use crate::discord::Error;

/// Checks whether the user is the bot owner.
pub async fn is_owner(ctx: Context<'_>) -> Result<bool, Error> {
    let is_owner = ctx
        .data()
        .sessions
        .lock()
        .await
        .is_owner(ctx.author().id.get());

    if !is_owner {
        ctx.say("You need to be the bot owner to execute this command.")
            .await?;
    }
    Ok(is_owner)
}
