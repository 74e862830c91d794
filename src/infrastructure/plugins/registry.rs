//! Plugin registry - maps configured names to plugin factories

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::loader::PluginLoader;
use crate::application::errors::PluginError;
use crate::infrastructure::config::PluginEntry;
use crate::plugins::builtin::{
    AvatarPlugin, CommandsPlugin, GamePlugin, NicknamePlugin, PluginInfoPlugin, PluginListPlugin,
    RebootPlugin, RollPlugin,
};
use crate::plugins::Plugin;

/// Builds a fresh plugin instance
pub type PluginFactory = Arc<dyn Fn() -> Result<Arc<dyn Plugin>, PluginError> + Send + Sync>;

fn factory<P, F>(build: F) -> PluginFactory
where
    P: Plugin + 'static,
    F: Fn() -> P + Send + Sync + 'static,
{
    Arc::new(move || Ok(Arc::new(build()) as Arc<dyn Plugin>))
}

/// Plugins linked into the binary
static BUILTINS: Lazy<Vec<(&'static str, PluginFactory)>> = Lazy::new(|| {
    vec![
        (CommandsPlugin::NAME, factory(CommandsPlugin::new)),
        (PluginListPlugin::NAME, factory(PluginListPlugin::new)),
        (PluginInfoPlugin::NAME, factory(PluginInfoPlugin::new)),
        (RebootPlugin::NAME, factory(RebootPlugin::new)),
        (NicknamePlugin::NAME, factory(NicknamePlugin::new)),
        (GamePlugin::NAME, factory(GamePlugin::new)),
        (AvatarPlugin::NAME, factory(AvatarPlugin::new)),
        (RollPlugin::NAME, factory(RollPlugin::new)),
    ]
});

/// Registry resolving plugin entries to instances
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
    loader: PluginLoader,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            loader: PluginLoader::new(),
        }
    }

    /// Registry preloaded with every built-in plugin
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (name, factory) in BUILTINS.iter() {
            registry.factories.insert(name.to_string(), factory.clone());
        }
        registry
    }

    /// Add or replace a named factory
    pub fn register<P, F>(&mut self, name: impl Into<String>, build: F)
    where
        P: Plugin + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), factory(build));
    }

    /// Add or replace a factory that may fail
    pub fn register_fallible(&mut self, name: impl Into<String>, factory: PluginFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate the plugin for one configuration entry. Entries with a
    /// `path` come from a shared library, the others from the table.
    pub fn resolve(&self, entry: &PluginEntry) -> Result<Arc<dyn Plugin>, PluginError> {
        let name = entry
            .plugin_name()
            .ok_or_else(|| PluginError::Load("Plugin entry has no name".to_string()))?;

        if let Some(path) = &entry.path {
            debug!(plugin = name, path = %path.display(), "Loading external plugin");
            let plugin = self.loader.load(path)?;
            return Ok(Arc::new(plugin));
        }

        match self.factories.get(name) {
            Some(factory) => factory(),
            None => Err(PluginError::NotFound(name.to_string())),
        }
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
