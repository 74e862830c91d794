//! Application layer errors

use thiserror::Error;

/// Gateway (chat client) errors
#[derive(Error, Debug, Clone)]
pub enum BotError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Gateway is not connected")]
    NotConnected,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Runtime lifecycle errors
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Could not load configuration from {source_name}: {reason}")]
    ConfigNotFound { source_name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Missing plugin name: {0}")]
    MissingPluginName(String),

    #[error("Plugin registration failed: {0}")]
    Registration(#[from] PluginError),

    #[error("No method called {0}")]
    UnknownMethod(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] BotError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Plugin loading and lifecycle errors
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Failed to load plugin: {0}")]
    Load(String),

    #[error("Plugin '{plugin}' failed to register: {reason}")]
    RegistrationFailed { plugin: String, reason: String },

    #[error("Plugin not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Custom command errors, all of them end up as replies
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Missing command name")]
    MissingName,

    #[error("Missing command content")]
    MissingContent,

    #[error("Missing double quote")]
    UnterminatedQuote,

    #[error("Wrong matching strategy: {0}")]
    InvalidStrategy(String),

    #[error("Command {0} already exists")]
    AlreadyExists(String),

    #[error("Command {0} does not exist")]
    NotFound(String),

    #[error("Permission denied")]
    Unauthorized,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Invalid field name: {0}")]
    InvalidField(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
