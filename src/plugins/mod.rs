//! Plugin system for slave-bot
//!
//! A plugin implements [`Plugin`]; the runtime wraps every loaded plugin in a
//! [`PluginContainer`] that relays gateway events to it.

pub mod builtin;
pub mod container;
pub mod context;
pub mod trait_def;

pub use container::{ContainerState, PluginContainer};
pub use context::{ClientHandle, PluginContext, StateBag};
pub use trait_def::{Plugin, PluginDescriptor, PluginSummary};
