//! slave-bot - plugin host for a chat bot with per-guild custom commands

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;

pub use application::errors::{CommandError, PluginError, RuntimeError};
pub use application::services::{RuntimeServer, RuntimeState};
pub use infrastructure::config::{ConfigSource, FileConfigSource, RuntimeConfig};
pub use infrastructure::plugins::PluginRegistry;
pub use plugins::{Plugin, PluginContext, PluginDescriptor};
