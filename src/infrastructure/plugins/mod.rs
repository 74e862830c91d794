//! Plugin resolution
//!
//! Built-in plugins come from a static name → factory table; external
//! plugins are shared libraries exporting `slave_bot_plugin_create`.

pub mod loader;
pub mod registry;

pub use loader::{LoadedPlugin, PluginLoader};
pub use registry::{PluginFactory, PluginRegistry};
