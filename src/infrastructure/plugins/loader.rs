//! Plugin loader - loads plugins from shared libraries

use async_trait::async_trait;
use libloading::{Library, Symbol};
use std::path::Path;
use tracing::info;

use crate::application::errors::PluginError;
use crate::domain::entities::Message;
use crate::plugins::{Plugin, PluginContext, PluginDescriptor};

/// Symbol every plugin library exports, see [`export_plugin!`](crate::export_plugin)
pub const CREATE_SYMBOL: &[u8] = b"slave_bot_plugin_create";

/// Function signature of the exported constructor
pub type PluginCreateFn = unsafe extern "C" fn() -> *mut Box<dyn Plugin>;

/// Declare the constructor of a plugin built as a `cdylib`.
///
/// ```ignore
/// slave_bot::export_plugin!(MyPlugin::new());
/// ```
#[macro_export]
macro_rules! export_plugin {
    ($constructor:expr) => {
        #[no_mangle]
        pub extern "C" fn slave_bot_plugin_create() -> *mut Box<dyn $crate::plugins::Plugin> {
            let plugin: Box<dyn $crate::plugins::Plugin> = Box::new($constructor);
            Box::into_raw(Box::new(plugin))
        }
    };
}

/// Plugin instance together with the library its code lives in
pub struct LoadedPlugin {
    // dropped before the library
    instance: Box<dyn Plugin>,
    _library: Library,
}

#[async_trait]
impl Plugin for LoadedPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        self.instance.descriptor()
    }

    async fn register(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        self.instance.register(ctx).await
    }

    async fn destroy(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        self.instance.destroy(ctx).await
    }

    async fn on_ready(&self, ctx: &PluginContext) {
        self.instance.on_ready(ctx).await
    }

    async fn on_message(&self, ctx: &PluginContext, message: &Message) {
        self.instance.on_message(ctx, message).await
    }

    async fn on_disconnect(&self, ctx: &PluginContext, reason: &str) {
        self.instance.on_disconnect(ctx, reason).await
    }

    async fn on_error(&self, ctx: &PluginContext, error: &str) {
        self.instance.on_error(ctx, error).await
    }
}

/// Plugin loader
#[derive(Debug, Default)]
pub struct PluginLoader;

impl PluginLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a single plugin library
    pub fn load(&self, path: impl AsRef<Path>) -> Result<LoadedPlugin, PluginError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PluginError::Load(format!("Library not found: {}", path.display())));
        }

        // Safety: the library runs its initialisers on load; plugin paths come
        // from the operator's configuration.
        let library = unsafe {
            Library::new(path).map_err(|e| PluginError::Load(format!("Failed to load library: {}", e)))?
        };

        let instance = unsafe {
            let create: Symbol<PluginCreateFn> = library
                .get(CREATE_SYMBOL)
                .map_err(|e| PluginError::Load(format!("Failed to find constructor: {}", e)))?;

            let raw = create();
            if raw.is_null() {
                return Err(PluginError::Load("Plugin constructor returned null".to_string()));
            }
            *Box::from_raw(raw)
        };

        let descriptor = instance.descriptor();
        info!(plugin = %descriptor.name, version = %descriptor.version, path = %path.display(), "Loaded plugin library");

        Ok(LoadedPlugin {
            instance,
            _library: library,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let err = PluginLoader::new().load("/definitely/not/here.so").err().unwrap();
        assert!(err.to_string().contains("Library not found"));
    }

    #[test]
    fn test_not_a_library() {
        let dir = std::env::temp_dir().join(format!("slave-bot-loader-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bogus.so");
        std::fs::write(&path, b"not an elf").unwrap();

        let err = PluginLoader::new().load(&path).err().unwrap();
        assert!(err.to_string().contains("Failed to load library"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
