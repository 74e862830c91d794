//! Privileged commands changing how the bot appears.
//!
//! Unauthorized senders are ignored without a reply.

use async_trait::async_trait;
use tracing::{error, info};

use super::{invoked, reply, send};
use crate::application::messaging::double_quoted_text;
use crate::domain::entities::{EventKind, Message};
use crate::plugins::{Plugin, PluginContext, PluginDescriptor};

/// Tokens of an invocation by an authorized sender
fn privileged<'a>(ctx: &PluginContext, message: &'a Message, trigger: &str) -> Option<Vec<&'a str>> {
    let tokens = invoked(message, trigger)?;
    if !ctx.is_authorized(message) {
        info!(user = %message.author, command = trigger, "Ignoring unauthorized request");
        return None;
    }
    Some(tokens)
}

fn admin_descriptor(name: &str, description: &str, usage: &str) -> PluginDescriptor {
    PluginDescriptor::new(name, "1.0.0")
        .with_description(description)
        .with_usage(usage)
        .observes(EventKind::Message)
}

pub struct RebootPlugin {
    descriptor: PluginDescriptor,
}

impl RebootPlugin {
    pub const NAME: &'static str = "reboot";
    const TRIGGER: &'static str = "/slavereboot";

    pub fn new() -> Self {
        Self {
            descriptor: admin_descriptor(Self::NAME, "Reload the configuration and every plugin", Self::TRIGGER),
        }
    }
}

#[async_trait]
impl Plugin for RebootPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn on_message(&self, ctx: &PluginContext, message: &Message) {
        if privileged(ctx, message, Self::TRIGGER).is_none() {
            return;
        }
        let Some(runtime) = ctx.runtime() else {
            return;
        };

        send(ctx, &message.channel_id, "Rebooting...").await;
        // reboot destroys this plugin, so it cannot run inside its own handler
        tokio::spawn(async move {
            if let Err(e) = runtime.reboot().await {
                error!(error = %e, "Reboot failed");
            }
        });
    }
}

pub struct NicknamePlugin {
    descriptor: PluginDescriptor,
}

impl NicknamePlugin {
    pub const NAME: &'static str = "nickname";
    const TRIGGER: &'static str = "/slavenick";

    pub fn new() -> Self {
        Self {
            descriptor: admin_descriptor(Self::NAME, "Change the bot's display name", "/slavenick \"{name}\""),
        }
    }
}

#[async_trait]
impl Plugin for NicknamePlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn on_message(&self, ctx: &PluginContext, message: &Message) {
        let Some(tokens) = privileged(ctx, message, Self::TRIGGER) else {
            return;
        };
        let Some(runtime) = ctx.runtime() else {
            return;
        };

        let name = match double_quoted_text(&tokens, 1) {
            Ok(quoted) => quoted.text,
            Err(e) => return reply(ctx, message, &e.to_string()).await,
        };
        match runtime.set_display_name(&name).await {
            Ok(()) => reply(ctx, message, &format!("Display name changed to **{}**", name)).await,
            Err(e) => reply(ctx, message, &format!("Could not change display name: {}", e)).await,
        }
    }
}

pub struct GamePlugin {
    descriptor: PluginDescriptor,
}

impl GamePlugin {
    pub const NAME: &'static str = "game";
    const TRIGGER: &'static str = "/slavegame";

    pub fn new() -> Self {
        Self {
            descriptor: admin_descriptor(
                Self::NAME,
                "Set or clear the activity shown under the bot's name",
                "/slavegame [\"{activity}\"]",
            ),
        }
    }
}

#[async_trait]
impl Plugin for GamePlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn on_message(&self, ctx: &PluginContext, message: &Message) {
        let Some(tokens) = privileged(ctx, message, Self::TRIGGER) else {
            return;
        };
        let Some(runtime) = ctx.runtime() else {
            return;
        };

        let activity = if tokens.len() > 1 {
            match double_quoted_text(&tokens, 1) {
                Ok(quoted) => Some(quoted.text),
                Err(e) => return reply(ctx, message, &e.to_string()).await,
            }
        } else {
            None
        };

        if let Err(e) = runtime.set_activity(activity.as_deref()).await {
            reply(ctx, message, &format!("Could not change activity: {}", e)).await;
        }
    }
}

pub struct AvatarPlugin {
    descriptor: PluginDescriptor,
}

impl AvatarPlugin {
    pub const NAME: &'static str = "avatar";
    const TRIGGER: &'static str = "/slaveavatar";

    pub fn new() -> Self {
        Self {
            descriptor: admin_descriptor(Self::NAME, "Change the bot's avatar", "/slaveavatar {image url}"),
        }
    }
}

#[async_trait]
impl Plugin for AvatarPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn on_message(&self, ctx: &PluginContext, message: &Message) {
        let Some(tokens) = privileged(ctx, message, Self::TRIGGER) else {
            return;
        };
        let Some(runtime) = ctx.runtime() else {
            return;
        };

        let Some(url) = tokens.get(1) else {
            return reply(ctx, message, "Missing url").await;
        };
        match runtime.set_avatar(url).await {
            Ok(()) => reply(ctx, message, "Avatar updated").await,
            Err(e) => reply(ctx, message, &format!("Could not change avatar: {}", e)).await,
        }
    }
}
