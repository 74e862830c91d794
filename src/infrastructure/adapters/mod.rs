//! Gateway adapters

pub mod console;
pub mod hub;

pub use console::{ConsoleAdapter, Outgoing};
pub use hub::EventHub;
