use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

use crate::application::errors::BotError;
use crate::domain::entities::{Event, EventKind, Message};

/// Callback installed on the gateway for one event kind
pub type EventHandler = Arc<dyn Fn(Event) -> BoxFuture<'static, ()> + Send + Sync>;

/// Identifies one subscription on a gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Presence status shown to other users
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Online,
    Idle,
    Invisible,
}

impl Presence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Presence::Online => "online",
            Presence::Idle => "idle",
            Presence::Invisible => "invisible",
        }
    }
}

/// Gateway trait - abstraction over the chat client (event source)
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Install a handler for one event kind
    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriptionId;

    /// Remove a handler. Returns false when it was not installed.
    fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool;

    /// Log in and open the connection
    async fn connect(&self, token: &str) -> Result<(), BotError>;

    /// Close the connection
    async fn disconnect(&self) -> Result<(), BotError>;

    async fn set_presence(&self, presence: Presence) -> Result<(), BotError>;

    /// Set the "playing" activity text, `None` clears it
    async fn set_activity(&self, activity: Option<&str>) -> Result<(), BotError>;

    async fn set_username(&self, username: &str) -> Result<(), BotError>;

    async fn set_avatar(&self, url: &str) -> Result<(), BotError>;

    /// Send a message to a channel, returns the sent message id
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<String, BotError>;

    /// Send a file to a channel
    async fn send_file(&self, channel_id: &str, file_name: &str, data: Vec<u8>) -> Result<String, BotError>;

    /// Reply to a message, mentioning its author
    async fn reply(&self, message: &Message, text: &str) -> Result<String, BotError> {
        let text = format!("<@{}>, {}", message.author.id, text);
        self.send_message(&message.channel_id, &text).await
    }

    /// Get bot info
    fn bot_info(&self) -> BotInfo;
}

/// Bot information
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub id: String,
    pub name: String,
    pub username: String,
}
