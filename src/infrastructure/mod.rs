//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Storage: in-memory plugin collections
//! - Database: SQLite plugin collections
//! - Adapters: gateway implementations
//! - Plugins: plugin registry and library loading

pub mod adapters;
pub mod config;
pub mod database;
pub mod plugins;
pub mod storage;
