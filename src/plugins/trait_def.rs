//! Plugin trait definitions

use async_trait::async_trait;
use serde::Serialize;

use super::context::PluginContext;
use crate::application::errors::PluginError;
use crate::domain::entities::{EventKind, Message};

/// Core plugin trait that all plugins must implement.
///
/// Only `descriptor` is required. Lifecycle hooks and event handlers default
/// to no-ops; a handler is only wired up when its kind is listed in
/// [`PluginDescriptor::events`].
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Identity and metadata
    fn descriptor(&self) -> &PluginDescriptor;

    /// Prepare plugin state before any event is delivered
    async fn register(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    /// Release plugin state, called once subscriptions are gone
    async fn destroy(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    async fn on_ready(&self, _ctx: &PluginContext) {}

    async fn on_message(&self, _ctx: &PluginContext, _message: &Message) {}

    async fn on_disconnect(&self, _ctx: &PluginContext, _reason: &str) {}

    async fn on_error(&self, _ctx: &PluginContext, _error: &str) {}
}

/// Identity and metadata of a loadable plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub usage: Option<String>,
    pub events: Vec<EventKind>,
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            usage: None,
            events: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    /// Declare interest in an event kind
    pub fn observes(mut self, kind: EventKind) -> Self {
        if !self.events.contains(&kind) {
            self.events.push(kind);
        }
        self
    }

    pub fn summary(&self) -> PluginSummary {
        PluginSummary {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            usage: self.usage.clone(),
        }
    }
}

/// Plugin information for listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginSummary {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub usage: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observes_ignores_duplicates() {
        let descriptor = PluginDescriptor::new("p", "1.0.0")
            .observes(EventKind::Message)
            .observes(EventKind::Ready)
            .observes(EventKind::Message);
        assert_eq!(descriptor.events, vec![EventKind::Message, EventKind::Ready]);
    }

    #[test]
    fn test_summary_projection() {
        let summary = PluginDescriptor::new("p", "2.1.0").with_usage("/p").summary();
        assert_eq!(summary.name, "p");
        assert_eq!(summary.version, "2.1.0");
        assert_eq!(summary.description, None);
        assert_eq!(summary.usage.as_deref(), Some("/p"));
    }
}
