use crate::commands::{received_at, CommandContext};
use kalenteribotti::error::Error;
use poise::serenity_prelude as serenity;
use rust_i18n::t;
use serenity::{EditMessage, FullEvent, Message};
use tracing::{debug, error, info};

/// Gateway events outside of commands
pub async fn event_handler(
    ctx: &serenity::Context,
    event: &FullEvent,
    _framework: poise::FrameworkContext<'_, CommandContext, Error>,
    data: &CommandContext,
) -> Result<(), Error> {
    if let FullEvent::Message { new_message } = event {
        if should_handle(new_message, data.config.listen_channel_id) {
            handle_message(ctx, new_message, data).await?;
        }
    }
    Ok(())
}

/// Plain messages in DMs or in the configured channel go to the assistant
fn should_handle(msg: &Message, listen_channel_id: Option<u64>) -> bool {
    if msg.author.bot || msg.content.trim().is_empty() || msg.content.starts_with('!') {
        return false;
    }

    msg.guild_id.is_none() || listen_channel_id == Some(msg.channel_id.get())
}

async fn handle_message(
    ctx: &serenity::Context,
    msg: &Message,
    data: &CommandContext,
) -> Result<(), Error> {
    info!("Message from {} in channel {}", msg.author.name, msg.channel_id);
    debug!("Message content: {}", msg.content);

    let mut placeholder = msg.channel_id.say(&ctx.http, t!("thinking")).await?;

    let tz = data.config.reference_timezone()?;
    let reply = data
        .dispatcher
        .reply(&msg.content, received_at(msg.timestamp, tz))
        .await;

    if let Err(e) = placeholder
        .edit(ctx, EditMessage::new().content(&reply))
        .await
    {
        // The placeholder may have been deleted meanwhile
        error!("Failed to edit placeholder message: {:?}", e);
        msg.channel_id.say(&ctx.http, reply).await?;
    }

    Ok(())
}
