//! Domain entities - Core business objects with no external dependencies

pub mod user;
pub mod message;
pub mod command;
pub mod event;

pub use user::{Guild, Member, Role, User};
pub use message::Message;
pub use command::{Command, CommandMatcher, MatchStrategy};
pub use event::{Event, EventKind};
