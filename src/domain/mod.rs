//! Domain layer - Core business logic with no external dependencies
//! 
//! This layer contains:
//! - Entities: Core business objects (User, Guild, Message, Command, Event)
//! - Traits: Abstractions for infrastructure (Gateway, Collection)

pub mod entities;
pub mod traits;
