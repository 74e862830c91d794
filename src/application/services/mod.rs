//! Application services - Business logic orchestration

pub mod command_service;
pub mod command_table;
pub mod runtime;

pub use command_service::{CommandOutcome, CommandRequest, CommandService};
pub use command_table::CommandTable;
pub use runtime::{RuntimeMethod, RuntimeServer, RuntimeState};
