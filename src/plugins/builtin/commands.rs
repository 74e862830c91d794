//! Custom text commands managed from chat

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{reply, send};
use crate::application::errors::PluginError;
use crate::application::services::command_service::{CommandOutcome, CommandRequest, CommandService, USAGE};
use crate::application::services::CommandTable;
use crate::domain::entities::{EventKind, Message};
use crate::plugins::{Plugin, PluginContext, PluginDescriptor};

pub struct CommandsPlugin {
    descriptor: PluginDescriptor,
}

impl CommandsPlugin {
    pub const NAME: &'static str = "commands";

    pub fn new() -> Self {
        Self {
            descriptor: PluginDescriptor::new(Self::NAME, "1.0.0")
                .with_description("Custom text commands, registered per guild")
                .with_usage(USAGE)
                .observes(EventKind::Message),
        }
    }
}

impl Default for CommandsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for CommandsPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn register(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        let table = CommandTable::new(ctx.store().clone());
        table.ensure_index().await?;
        ctx.state().insert(CommandService::new(Arc::new(table)));
        Ok(())
    }

    async fn destroy(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        ctx.state().remove::<CommandService>();
        Ok(())
    }

    async fn on_message(&self, ctx: &PluginContext, message: &Message) {
        if message.author.is_bot {
            return;
        }
        // commands live in guilds only
        let Some(guild) = &message.guild else {
            return;
        };
        let Some(service) = ctx.state().get::<CommandService>() else {
            warn!(plugin = Self::NAME, "Message received before registration");
            return;
        };

        let request = CommandRequest {
            scope: &guild.id,
            scope_name: &guild.name,
            text: &message.content,
            authorized: ctx.is_authorized(message),
        };

        match service.handle(&request).await {
            CommandOutcome::Reply(text) => reply(ctx, message, &text).await,
            CommandOutcome::Send(text) => send(ctx, &message.channel_id, &text).await,
            CommandOutcome::File { name, data } => {
                if let Err(e) = ctx.client().send_file(&message.channel_id, &name, data).await {
                    warn!(file = %name, error = %e, "Failed to send backup");
                }
            }
            CommandOutcome::Ignored => debug!(guild = %guild.id, "No command matched"),
        }
    }
}
