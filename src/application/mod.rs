//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Services: runtime lifecycle and custom command handling
//! - Errors: Domain-specific errors
//! - Messaging: Text command parsing

pub mod errors;
pub mod messaging;
pub mod services;
