//! In-memory storage implementation

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use crate::application::errors::StorageError;
use crate::domain::traits::store::with_identity;
use crate::domain::traits::{Collection, Filter, ResourceProvisioner, ID_FIELD};

/// Document collection kept in memory, in insertion order
#[derive(Default)]
pub struct MemoryCollection {
    documents: RwLock<Vec<Value>>,
    indexes: RwLock<HashSet<String>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn indexes(&self) -> Vec<String> {
        self.indexes.read().await.iter().cloned().collect()
    }
}

fn document_id(document: &Value) -> Option<&str> {
    document.get(ID_FIELD).and_then(Value::as_str)
}

#[async_trait]
impl Collection for MemoryCollection {
    async fn ensure_index(&self, field: &str) -> Result<(), StorageError> {
        self.indexes.write().await.insert(field.to_string());
        Ok(())
    }

    async fn insert(&self, id: &str, document: Value) -> Result<(), StorageError> {
        let document = with_identity(id, document)?;
        let mut documents = self.documents.write().await;
        if documents.iter().any(|d| document_id(d) == Some(id)) {
            return Err(StorageError::DuplicateKey(id.to_string()));
        }
        documents.push(document);
        Ok(())
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<Value>, StorageError> {
        let documents = self.documents.read().await;
        Ok(documents.iter().filter(|d| filter.matches(d)).cloned().collect())
    }

    async fn find_one(&self, id: &str) -> Result<Option<Value>, StorageError> {
        let documents = self.documents.read().await;
        Ok(documents.iter().find(|d| document_id(d) == Some(id)).cloned())
    }

    async fn update(&self, id: &str, document: Value) -> Result<usize, StorageError> {
        let document = with_identity(id, document)?;
        let mut documents = self.documents.write().await;
        match documents.iter_mut().find(|d| document_id(d) == Some(id)) {
            Some(slot) => {
                *slot = document;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn remove(&self, id: &str) -> Result<usize, StorageError> {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|d| document_id(d) != Some(id));
        Ok(before - documents.len())
    }
}

/// Provisioner handing out one in-memory collection per plugin.
/// Collections outlive reboots for as long as the provisioner does.
#[derive(Default)]
pub struct MemoryProvisioner {
    collections: Mutex<HashMap<String, Arc<MemoryCollection>>>,
}

impl MemoryProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed access to a plugin's collection, created on first use
    pub fn collection(&self, plugin_name: &str) -> Result<Arc<MemoryCollection>, StorageError> {
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| StorageError::Database("Lock poisoned".to_string()))?;
        Ok(collections
            .entry(plugin_name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new()))
            .clone())
    }
}

impl ResourceProvisioner for MemoryProvisioner {
    fn open(&self, plugin_name: &str) -> Result<Arc<dyn Collection>, StorageError> {
        let collection: Arc<dyn Collection> = self.collection(plugin_name)?;
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_rejects_duplicate_key() {
        let store = MemoryCollection::new();
        store.insert("a", json!({"v": 1})).await.unwrap();

        let err = store.insert("a", json!({"v": 2})).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey(k) if k == "a"));
        assert_eq!(store.find_one("a").await.unwrap().unwrap()["v"], 1);
    }

    #[tokio::test]
    async fn test_find_keeps_insertion_order() {
        let store = MemoryCollection::new();
        for name in ["c", "a", "b"] {
            store.insert(name, json!({"guild": "g1", "name": name})).await.unwrap();
        }
        store.insert("x", json!({"guild": "g2", "name": "x"})).await.unwrap();

        let names: Vec<_> = store
            .find(&Filter::eq("guild", "g1"))
            .await
            .unwrap()
            .into_iter()
            .map(|d| d["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_update_and_remove_report_affected_rows() {
        let store = MemoryCollection::new();
        store.insert("a", json!({"v": 1})).await.unwrap();

        assert_eq!(store.update("a", json!({"v": 2})).await.unwrap(), 1);
        assert_eq!(store.update("zz", json!({"v": 2})).await.unwrap(), 0);
        assert_eq!(store.find_one("a").await.unwrap().unwrap()["v"], 2);

        assert_eq!(store.remove("a").await.unwrap(), 1);
        assert_eq!(store.remove("a").await.unwrap(), 0);
        assert_eq!(store.count(&Filter::all()).await.unwrap(), 0);
    }

    #[test]
    fn test_provisioner_isolates_plugins() {
        let provisioner = MemoryProvisioner::new();
        let a = provisioner.collection("a").unwrap();
        let again = provisioner.collection("a").unwrap();
        let b = provisioner.collection("b").unwrap();

        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
