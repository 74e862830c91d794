//! Domain traits - Abstractions for infrastructure implementations

pub mod gateway;
pub mod store;

pub use gateway::{BotInfo, EventHandler, Gateway, Presence, SubscriptionId};
pub use store::{Collection, Filter, ResourceProvisioner, ID_FIELD};
