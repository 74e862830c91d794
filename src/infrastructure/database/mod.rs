//! SQLite-backed plugin storage: one database file per plugin

use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use crate::application::errors::StorageError;
use crate::domain::traits::store::with_identity;
use crate::domain::traits::{Collection, Filter, ResourceProvisioner};

pub struct SqliteCollection {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCollection {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT UNIQUE NOT NULL,
                body TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StorageError::Database("Lock poisoned".to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Storage task failed: {}", e)))?
    }
}

/// Field names end up inside SQL, only plain identifiers are accepted
fn json_path(field: &str) -> Result<String, StorageError> {
    let valid = !field.is_empty()
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(StorageError::InvalidField(field.to_string()));
    }
    Ok(format!("'$.{}'", field))
}

fn parse_body(body: String) -> Result<Value, StorageError> {
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl Collection for SqliteCollection {
    async fn ensure_index(&self, field: &str) -> Result<(), StorageError> {
        let path = json_path(field)?;
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS idx_documents_{} ON documents (json_extract(body, {}))",
            field, path
        );
        self.with_conn(move |conn| {
            conn.execute(&sql, [])?;
            Ok(())
        })
        .await
    }

    async fn insert(&self, id: &str, document: Value) -> Result<(), StorageError> {
        let body = serde_json::to_string(&with_identity(id, document)?)?;
        let id = id.to_string();
        self.with_conn(move |conn| {
            match conn.execute(
                "INSERT INTO documents (id, body) VALUES (?1, ?2)",
                rusqlite::params![id, body],
            ) {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                    Err(StorageError::DuplicateKey(id))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<Value>, StorageError> {
        let mut sql = "SELECT body FROM documents".to_string();
        let mut params = Vec::new();
        for (i, (field, value)) in filter.conditions().iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(&format!("json_extract(body, {}) = ?{}", json_path(field)?, i + 1));
            params.push(value.clone());
        }
        sql.push_str(" ORDER BY seq");

        let bodies = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), |row| {
                    row.get::<_, String>(0)
                })?;
                let mut bodies = Vec::new();
                for body in rows {
                    bodies.push(body?);
                }
                Ok(bodies)
            })
            .await?;

        bodies.into_iter().map(parse_body).collect()
    }

    async fn find_one(&self, id: &str) -> Result<Option<Value>, StorageError> {
        let id = id.to_string();
        let body = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row("SELECT body FROM documents WHERE id = ?1", [id], |row| {
                        row.get::<_, String>(0)
                    })
                    .optional()?)
            })
            .await?;
        body.map(parse_body).transpose()
    }

    async fn update(&self, id: &str, document: Value) -> Result<usize, StorageError> {
        let body = serde_json::to_string(&with_identity(id, document)?)?;
        let id = id.to_string();
        self.with_conn(move |conn| {
            Ok(conn.execute(
                "UPDATE documents SET body = ?2 WHERE id = ?1",
                rusqlite::params![id, body],
            )?)
        })
        .await
    }

    async fn remove(&self, id: &str) -> Result<usize, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| Ok(conn.execute("DELETE FROM documents WHERE id = ?1", [id])?))
            .await
    }
}

/// Opens `<data_dir>/<plugin>.db` for each plugin
pub struct SqliteProvisioner {
    data_dir: RwLock<PathBuf>,
}

impl SqliteProvisioner {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: RwLock::new(data_dir.into()),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        match self.data_dir.read() {
            Ok(dir) => dir.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ResourceProvisioner for SqliteProvisioner {
    fn open(&self, plugin_name: &str) -> Result<Arc<dyn Collection>, StorageError> {
        if plugin_name.is_empty() || plugin_name.contains(['/', '\\']) || plugin_name.starts_with('.') {
            return Err(StorageError::InvalidField(plugin_name.to_string()));
        }
        let data_dir = self.data_dir();
        std::fs::create_dir_all(&data_dir)?;
        let path = data_dir.join(format!("{}.db", plugin_name));
        tracing::debug!(plugin = plugin_name, path = %path.display(), "Opening plugin database");
        Ok(Arc::new(SqliteCollection::open(path)?))
    }

    fn relocate(&self, data_dir: &Path) {
        let mut current = match self.data_dir.write() {
            Ok(dir) => dir,
            Err(poisoned) => poisoned.into_inner(),
        };
        if current.as_path() != data_dir {
            tracing::info!(from = %current.display(), to = %data_dir.display(), "Plugin data directory changed");
            *current = data_dir.to_path_buf();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_find_in_order() {
        let store = SqliteCollection::open_in_memory().unwrap();
        store.ensure_index("guild").await.unwrap();
        store.insert("b", json!({"guild": "g1", "name": "b"})).await.unwrap();
        store.insert("a", json!({"guild": "g1", "name": "a"})).await.unwrap();
        store.insert("c", json!({"guild": "g2", "name": "c"})).await.unwrap();

        let docs = store.find(&Filter::eq("guild", "g1")).await.unwrap();
        let names: Vec<_> = docs.iter().map(|d| d["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(docs[0]["_id"], "b");
        assert_eq!(store.count(&Filter::all()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_key_keeps_original() {
        let store = SqliteCollection::open_in_memory().unwrap();
        store.insert("k", json!({"content": "first"})).await.unwrap();

        let err = store.insert("k", json!({"content": "second"})).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey(_)));
        assert_eq!(store.find_one("k").await.unwrap().unwrap()["content"], "first");
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let store = SqliteCollection::open_in_memory().unwrap();
        store.insert("k", json!({"v": 1})).await.unwrap();

        assert_eq!(store.update("k", json!({"v": 2})).await.unwrap(), 1);
        assert_eq!(store.find_one("k").await.unwrap().unwrap()["v"], 2);
        assert_eq!(store.remove("k").await.unwrap(), 1);
        assert_eq!(store.remove("k").await.unwrap(), 0);
        assert!(store.find_one("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_unsafe_field_names() {
        let store = SqliteCollection::open_in_memory().unwrap();
        let err = store.ensure_index("guild'); DROP TABLE documents; --").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidField(_)));
        assert!(store.find(&Filter::eq("a b", "x")).await.is_err());
    }

    #[test]
    fn test_provisioner_rejects_path_like_names() {
        let provisioner = SqliteProvisioner::new(std::env::temp_dir().join("slave-bot-tests"));
        assert!(provisioner.open("../escape").is_err());
        assert!(provisioner.open("").is_err());
    }

    #[tokio::test]
    async fn test_relocate_moves_later_opens() {
        let root = std::env::temp_dir().join(format!("slave-bot-relocate-{}", std::process::id()));
        let first = root.join("first");
        let second = root.join("second");
        let provisioner = SqliteProvisioner::new(&first);

        provisioner.open("commands").unwrap();
        provisioner.relocate(&second);
        assert_eq!(provisioner.data_dir(), second);

        let store = provisioner.open("commands").unwrap();
        store.insert("k", json!({"v": 1})).await.unwrap();
        assert!(first.join("commands.db").exists());
        assert!(second.join("commands.db").exists());

        let _ = std::fs::remove_dir_all(&root);
    }
}
