//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::application::errors::ConfigError;

/// Role whose members may run privileged operations when none is configured
pub const DEFAULT_ADMIN_ROLE: &str = "Slave Master";

const DEFAULT_DATA_DIR: &str = "databases";
const DEFAULT_DESTROY_TIMEOUT_SECS: u64 = 10;

/// Runtime configuration, re-read on every setup/reboot
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeConfig {
    #[serde(alias = "botToken")]
    pub bot_token: Option<String>,

    #[serde(alias = "initialPlayingGame", skip_serializing_if = "Option::is_none")]
    pub initial_activity: Option<String>,

    #[serde(alias = "botUsername", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(alias = "adminRole", skip_serializing_if = "Option::is_none")]
    pub admin_role: Option<String>,

    #[serde(alias = "dataDir", skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    #[serde(alias = "destroyTimeoutSecs", skip_serializing_if = "Option::is_none")]
    pub destroy_timeout_secs: Option<u64>,

    #[serde(default)]
    pub plugins: Vec<PluginEntry>,
}

/// One configured plugin: built in when `path` is absent
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginEntry {
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

impl PluginEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// The plugin name, when present and not blank
    pub fn plugin_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let plugins = [
            "commands",
            "plugin-list",
            "plugin-info",
            "reboot",
            "nickname",
            "game",
            "avatar",
            "roll",
        ]
        .into_iter()
        .map(PluginEntry::named)
        .collect();

        Self {
            bot_token: Some("changeme".to_string()),
            initial_activity: None,
            display_name: None,
            admin_role: Some(DEFAULT_ADMIN_ROLE.to_string()),
            data_dir: Some(PathBuf::from(DEFAULT_DATA_DIR)),
            destroy_timeout_secs: Some(DEFAULT_DESTROY_TIMEOUT_SECS),
            plugins,
        }
    }
}

impl RuntimeConfig {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;

        Self::parse(&content)
    }

    /// Parse a YAML or JSON document
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.bot_token.as_deref() {
            Some(token) if !token.trim().is_empty() => Ok(()),
            _ => Err(ConfigError::MissingField("bot-token".to_string())),
        }
    }

    pub fn token(&self) -> &str {
        self.bot_token.as_deref().unwrap_or_default()
    }

    pub fn admin_role(&self) -> &str {
        self.admin_role.as_deref().unwrap_or(DEFAULT_ADMIN_ROLE)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }

    pub fn destroy_timeout(&self) -> Duration {
        Duration::from_secs(self.destroy_timeout_secs.unwrap_or(DEFAULT_DESTROY_TIMEOUT_SECS))
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }
}

/// Where the runtime reads its configuration from
pub trait ConfigSource: Send + Sync {
    /// Human readable origin, used in errors and logs
    fn describe(&self) -> String;

    /// Read and parse the configuration, never cached
    fn load(&self) -> Result<RuntimeConfig, ConfigError>;
}

/// Configuration file on disk
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileConfigSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<RuntimeConfig, ConfigError> {
        RuntimeConfig::load(&self.path)
    }
}
