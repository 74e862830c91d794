use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::application::errors::StorageError;

/// Name of the identity field every stored document carries
pub const ID_FIELD: &str = "_id";

/// Equality filter over top-level string fields of a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<(String, String)>,
}

impl Filter {
    /// Matches every document
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::all().and(field, value)
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, String)] {
        &self.conditions
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| document.get(field).and_then(Value::as_str) == Some(value.as_str()))
    }
}

/// Collection trait - one plugin's isolated document store
///
/// Documents are JSON objects keyed by [`ID_FIELD`]. `find` returns
/// documents in insertion order.
#[async_trait]
pub trait Collection: Send + Sync {
    async fn ensure_index(&self, field: &str) -> Result<(), StorageError>;

    /// Insert a new document. Fails with `DuplicateKey` when `id` exists.
    async fn insert(&self, id: &str, document: Value) -> Result<(), StorageError>;

    async fn find(&self, filter: &Filter) -> Result<Vec<Value>, StorageError>;

    async fn find_one(&self, id: &str) -> Result<Option<Value>, StorageError>;

    /// Replace a document, returns the number of documents updated
    async fn update(&self, id: &str, document: Value) -> Result<usize, StorageError>;

    /// Returns the number of documents removed
    async fn remove(&self, id: &str) -> Result<usize, StorageError>;

    async fn count(&self, filter: &Filter) -> Result<usize, StorageError> {
        Ok(self.find(filter).await?.len())
    }
}

/// Hands out one isolated collection per plugin
pub trait ResourceProvisioner: Send + Sync {
    fn open(&self, plugin_name: &str) -> Result<Arc<dyn Collection>, StorageError>;

    /// Point later opens at the configured data directory. Called on every setup.
    fn relocate(&self, _data_dir: &Path) {}
}

/// Stamp the identity field onto a document before it is stored
pub(crate) fn with_identity(id: &str, mut document: Value) -> Result<Value, StorageError> {
    match document.as_object_mut() {
        Some(object) => {
            object.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
            Ok(document)
        }
        None => Err(StorageError::Serialization(
            "documents must be JSON objects".to_string(),
        )),
    }
}
