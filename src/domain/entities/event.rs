use std::fmt;
use std::sync::Arc;

use super::Message;

/// Kinds of events a gateway emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    Message,
    Disconnect,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Ready => "ready",
            EventKind::Message => "message",
            EventKind::Disconnect => "disconnect",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event delivered by the gateway
#[derive(Debug, Clone)]
pub enum Event {
    Ready,
    Message(Arc<Message>),
    Disconnect { reason: String },
    Error { message: String },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Ready => EventKind::Ready,
            Event::Message(_) => EventKind::Message,
            Event::Disconnect { .. } => EventKind::Disconnect,
            Event::Error { .. } => EventKind::Error,
        }
    }
}
