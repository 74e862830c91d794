//! Local gateway for development and testing
//!
//! Messages are injected in-process (stdin in dev mode, directly in tests)
//! and everything the bot sends is kept in an outbox, optionally echoed to
//! stdout.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use super::hub::EventHub;
use crate::application::errors::BotError;
use crate::domain::entities::{Event, EventKind, Message};
use crate::domain::traits::{BotInfo, EventHandler, Gateway, Presence, SubscriptionId};

/// Something the bot sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Text { channel_id: String, text: String },
    File { channel_id: String, file_name: String, data: Vec<u8> },
}

impl Outgoing {
    pub fn text(&self) -> Option<&str> {
        match self {
            Outgoing::Text { text, .. } => Some(text),
            Outgoing::File { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    connected: bool,
    logins: usize,
    presence: Option<Presence>,
    activity: Option<String>,
    username: Option<String>,
    avatar: Option<String>,
    outbox: Vec<Outgoing>,
}

/// In-process gateway
pub struct ConsoleAdapter {
    info: BotInfo,
    hub: EventHub,
    state: Mutex<SessionState>,
    sent: Notify,
    echo: bool,
}

impl ConsoleAdapter {
    pub fn new() -> Self {
        Self {
            info: BotInfo {
                id: "console".to_string(),
                name: "slave-bot".to_string(),
                username: "console".to_string(),
            },
            hub: EventHub::new(),
            state: Mutex::new(SessionState::default()),
            sent: Notify::new(),
            echo: false,
        }
    }

    /// Print everything the bot sends to stdout
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, SessionState>, BotError> {
        self.state
            .lock()
            .map_err(|_| BotError::Internal("Lock poisoned".to_string()))
    }

    fn push(&self, outgoing: Outgoing) -> Result<String, BotError> {
        let mut state = self.state()?;
        if !state.connected {
            return Err(BotError::NotConnected);
        }
        if self.echo {
            match &outgoing {
                Outgoing::Text { text, .. } => println!("[BOT] {}", text),
                Outgoing::File { file_name, data, .. } => {
                    println!("[BOT] <file {} ({} bytes)>", file_name, data.len())
                }
            }
        }
        state.outbox.push(outgoing);
        drop(state);
        self.sent.notify_waiters();
        Ok(uuid::Uuid::new_v4().to_string())
    }

    /// Deliver an incoming message to subscribers
    pub fn inject(&self, message: Message) -> usize {
        self.hub.emit(Event::Message(Arc::new(message)))
    }

    /// Simulate an error reported by the connection
    pub fn raise_error(&self, message: impl Into<String>) -> usize {
        self.hub.emit(Event::Error { message: message.into() })
    }

    /// Simulate the connection dropping
    pub fn drop_connection(&self, reason: impl Into<String>) -> usize {
        if let Ok(mut state) = self.state() {
            state.connected = false;
        }
        self.hub.emit(Event::Disconnect { reason: reason.into() })
    }

    pub fn is_connected(&self) -> bool {
        self.state().map(|s| s.connected).unwrap_or(false)
    }

    /// Number of successful connects so far
    pub fn logins(&self) -> usize {
        self.state().map(|s| s.logins).unwrap_or(0)
    }

    pub fn presence(&self) -> Option<Presence> {
        self.state().ok().and_then(|s| s.presence)
    }

    pub fn activity(&self) -> Option<String> {
        self.state().ok().and_then(|s| s.activity.clone())
    }

    pub fn username(&self) -> Option<String> {
        self.state().ok().and_then(|s| s.username.clone())
    }

    pub fn avatar(&self) -> Option<String> {
        self.state().ok().and_then(|s| s.avatar.clone())
    }

    pub fn outbox(&self) -> Vec<Outgoing> {
        self.state().map(|s| s.outbox.clone()).unwrap_or_default()
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.hub.subscriber_count(kind)
    }

    /// Wait until the outbox holds at least `len` entries
    pub async fn wait_for_outbox(&self, len: usize, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.sent.notified();
                if self.outbox().len() >= len {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

impl Default for ConsoleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for ConsoleAdapter {
    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        self.hub.subscribe(kind, handler)
    }

    fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        self.hub.unsubscribe(kind, id)
    }

    async fn connect(&self, token: &str) -> Result<(), BotError> {
        if token.trim().is_empty() {
            return Err(BotError::Auth("empty token".to_string()));
        }
        {
            let mut state = self.state()?;
            state.connected = true;
            state.logins += 1;
        }
        tracing::info!("Console gateway connected");
        self.hub.emit(Event::Ready);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BotError> {
        self.state()?.connected = false;
        tracing::info!("Console gateway disconnected");
        Ok(())
    }

    async fn set_presence(&self, presence: Presence) -> Result<(), BotError> {
        self.state()?.presence = Some(presence);
        Ok(())
    }

    async fn set_activity(&self, activity: Option<&str>) -> Result<(), BotError> {
        self.state()?.activity = activity.map(str::to_string);
        Ok(())
    }

    async fn set_username(&self, username: &str) -> Result<(), BotError> {
        self.state()?.username = Some(username.to_string());
        Ok(())
    }

    async fn set_avatar(&self, url: &str) -> Result<(), BotError> {
        self.state()?.avatar = Some(url.to_string());
        Ok(())
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<String, BotError> {
        self.push(Outgoing::Text {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
        })
    }

    async fn send_file(&self, channel_id: &str, file_name: &str, data: Vec<u8>) -> Result<String, BotError> {
        self.push(Outgoing::File {
            channel_id: channel_id.to_string(),
            file_name: file_name.to_string(),
            data,
        })
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}
