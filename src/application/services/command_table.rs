//! Per-guild cache of custom commands over the command plugin's store

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::application::errors::{CommandError, StorageError};
use crate::domain::entities::{Command, CommandMatcher};
use crate::domain::traits::{Collection, Filter};

/// Store field commands are indexed and partitioned by
pub const SCOPE_FIELD: &str = "guild";

/// A command with its compiled matcher
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub command: Command,
    matcher: CommandMatcher,
}

impl TableEntry {
    pub fn is_match(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }
}

/// Snapshot of one guild's commands in store order
pub type Snapshot = Arc<[TableEntry]>;

/// Read-through cache of commands per guild. The store stays authoritative;
/// every add/remove reloads the affected guild.
pub struct CommandTable {
    store: Arc<dyn Collection>,
    cache: RwLock<HashMap<String, Snapshot>>,
}

impl CommandTable {
    pub fn new(store: Arc<dyn Collection>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn ensure_index(&self) -> Result<(), StorageError> {
        self.store.ensure_index(SCOPE_FIELD).await
    }

    /// Commands of a guild, from cache when present
    pub async fn commands(&self, scope: &str) -> Result<Snapshot, StorageError> {
        if let Some(snapshot) = self.cached(scope).await {
            return Ok(snapshot);
        }
        self.load(scope).await
    }

    pub async fn cached(&self, scope: &str) -> Option<Snapshot> {
        self.cache.read().await.get(scope).cloned()
    }

    /// Read a guild's commands from the store and replace its cache entry
    pub async fn load(&self, scope: &str) -> Result<Snapshot, StorageError> {
        let documents = self.store.find(&Filter::eq(SCOPE_FIELD, scope)).await?;

        let mut entries = Vec::with_capacity(documents.len());
        for document in documents {
            let command: Command = match serde_json::from_value(document) {
                Ok(command) => command,
                Err(e) => {
                    warn!(guild = scope, error = %e, "Skipping unreadable command");
                    continue;
                }
            };
            match CommandMatcher::for_command(&command) {
                Ok(matcher) => entries.push(TableEntry { command, matcher }),
                Err(e) => warn!(guild = scope, command = %command.name, error = %e, "Skipping command"),
            }
        }

        let snapshot: Snapshot = entries.into();
        debug!(guild = scope, commands = snapshot.len(), "Loaded commands");
        self.cache.write().await.insert(scope.to_string(), snapshot.clone());
        Ok(snapshot)
    }

    pub async fn invalidate(&self, scope: &str) {
        self.cache.write().await.remove(scope);
    }

    /// Insert a new command. An existing (guild, name) is never overwritten.
    pub async fn add(&self, command: Command) -> Result<(), CommandError> {
        let document =
            serde_json::to_value(&command).map_err(|e| StorageError::Serialization(e.to_string()))?;

        match self.store.insert(&command.id(), document).await {
            Ok(()) => {}
            Err(StorageError::DuplicateKey(_)) => return Err(CommandError::AlreadyExists(command.name)),
            Err(e) => return Err(e.into()),
        }

        self.reload(&command.scope).await;
        Ok(())
    }

    pub async fn remove(&self, scope: &str, name: &str) -> Result<(), CommandError> {
        let removed = self.store.remove(&Command::identity(scope, name)).await?;
        if removed == 0 {
            return Err(CommandError::NotFound(name.to_string()));
        }

        self.reload(scope).await;
        Ok(())
    }

    /// First command matching the text, in store order
    pub async fn find_match(&self, scope: &str, text: &str) -> Result<Option<Command>, StorageError> {
        let snapshot = self.commands(scope).await?;
        Ok(snapshot
            .iter()
            .find(|entry| entry.is_match(text))
            .map(|entry| entry.command.clone()))
    }

    /// A failed reload drops the cache entry so the next read hits the store
    async fn reload(&self, scope: &str) {
        if let Err(e) = self.load(scope).await {
            warn!(guild = scope, error = %e, "Failed to reload commands");
            self.invalidate(scope).await;
        }
    }
}
