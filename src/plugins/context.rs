//! What a plugin gets to see of the host

use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use crate::application::errors::BotError;
use crate::application::services::runtime::RuntimeServer;
use crate::domain::entities::Message;
use crate::domain::traits::{BotInfo, Collection, Gateway};

/// Configuration handed to every plugin hook and handler
pub struct PluginContext {
    runtime: Weak<RuntimeServer>,
    client: ClientHandle,
    store: Arc<dyn Collection>,
    options: Option<Value>,
    state: StateBag,
}

impl PluginContext {
    pub fn new(
        runtime: Weak<RuntimeServer>,
        client: ClientHandle,
        store: Arc<dyn Collection>,
        options: Option<Value>,
    ) -> Self {
        Self {
            runtime,
            client,
            store,
            options,
            state: StateBag::default(),
        }
    }

    /// The owning runtime, `None` once it has been dropped
    pub fn runtime(&self) -> Option<Arc<RuntimeServer>> {
        self.runtime.upgrade()
    }

    pub fn client(&self) -> &ClientHandle {
        &self.client
    }

    /// This plugin's isolated store
    pub fn store(&self) -> &Arc<dyn Collection> {
        &self.store
    }

    pub fn options(&self) -> Option<&Value> {
        self.options.as_ref()
    }

    pub fn state(&self) -> &StateBag {
        &self.state
    }

    pub fn is_authorized(&self, message: &Message) -> bool {
        self.runtime()
            .map(|runtime| runtime.is_authorized(message))
            .unwrap_or(false)
    }
}

/// Read and display access to the shared gateway. Connection-level changes
/// go through the runtime.
#[derive(Clone)]
pub struct ClientHandle {
    gateway: Arc<dyn Gateway>,
}

impl ClientHandle {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn reply(&self, message: &Message, text: &str) -> Result<String, BotError> {
        self.gateway.reply(message, text).await
    }

    pub async fn send(&self, channel_id: &str, text: &str) -> Result<String, BotError> {
        self.gateway.send_message(channel_id, text).await
    }

    pub async fn send_file(&self, channel_id: &str, file_name: &str, data: Vec<u8>) -> Result<String, BotError> {
        self.gateway.send_file(channel_id, file_name, data).await
    }

    pub fn bot_info(&self) -> BotInfo {
        self.gateway.bot_info()
    }
}

/// Per-plugin mutable state, one value per type
#[derive(Default)]
pub struct StateBag {
    values: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl StateBag {
    /// Store a value, replacing any previous value of the same type
    pub fn insert<T: Any + Send + Sync>(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        if let Ok(mut values) = self.values.write() {
            values.insert(TypeId::of::<T>(), value.clone());
        }
        value
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let values = self.values.read().ok()?;
        values.get(&TypeId::of::<T>())?.clone().downcast::<T>().ok()
    }

    pub fn remove<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let mut values = self.values.write().ok()?;
        values.remove(&TypeId::of::<T>())?.downcast::<T>().ok()
    }
}
