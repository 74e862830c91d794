//! Plugins shipped with the bot

mod admin;
mod commands;
mod info;
mod roll;

pub use admin::{AvatarPlugin, GamePlugin, NicknamePlugin, RebootPlugin};
pub use commands::CommandsPlugin;
pub use info::{PluginInfoPlugin, PluginListPlugin};
pub use roll::RollPlugin;

use tracing::warn;

use super::context::PluginContext;
use crate::domain::entities::Message;

/// Tokens of a message whose first token is `trigger`
fn invoked<'a>(message: &'a Message, trigger: &str) -> Option<Vec<&'a str>> {
    if message.author.is_bot {
        return None;
    }
    let tokens = message.tokens();
    (tokens.first() == Some(&trigger)).then_some(tokens)
}

async fn reply(ctx: &PluginContext, message: &Message, text: &str) {
    if let Err(e) = ctx.client().reply(message, text).await {
        warn!(channel = %message.channel_id, error = %e, "Failed to reply");
    }
}

async fn send(ctx: &PluginContext, channel_id: &str, text: &str) {
    if let Err(e) = ctx.client().send(channel_id, text).await {
        warn!(channel = %channel_id, error = %e, "Failed to send message");
    }
}
