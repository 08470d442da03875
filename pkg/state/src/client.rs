use serde::Serialize;
use serde::de::DeserializeOwned;
use slatedb::Db;
use slatedb::object_store::local::LocalFileSystem;
use slatedb::object_store::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use pkg_constants::state::REGISTRY_PREFIX;

/// Registry key of a namespaced cluster object: `/registry/<kind>/<ns>/<name>`.
pub fn registry_key(kind: &str, namespace: &str, name: &str) -> String {
    format!("{}{}/{}/{}", REGISTRY_PREFIX, kind, namespace, name)
}

/// Prefix listing every object of one kind.
pub fn registry_prefix(kind: &str) -> String {
    format!("{}{}/", REGISTRY_PREFIX, kind)
}

/// Persistent key/value store backed by SlateDB on a local filesystem.
///
/// Holds the cluster registry written by the watchers and the load-balancer
/// configuration written by `StoredLoadBalancer`.
#[derive(Clone)]
pub struct StateStore {
    db: Db,
}

fn db_error(op: &str, key: &str, e: impl std::fmt::Display) -> anyhow::Error {
    anyhow::anyhow!("state store {} '{}': {}", op, key, e)
}

impl StateStore {
    /// Open the store under `data_dir`, creating the directory on first use.
    pub async fn new(data_dir: &str) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| db_error("create_dir", data_dir, e))?;
        let fs = LocalFileSystem::new_with_prefix(data_dir)
            .map_err(|e| db_error("object_store", data_dir, e))?;
        let db = Db::open(Path::from("/"), Arc::new(fs))
            .await
            .map_err(|e| db_error("open", data_dir, e))?;
        info!("State store ready at {}", data_dir);
        Ok(Self { db })
    }

    pub async fn put(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.db
            .put(key.as_bytes(), value)
            .await
            .map_err(|e| db_error("put", key, e))
            .map(|_| ())
    }

    /// Raw bytes stored at `key`; `None` when absent.
    pub async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let found = self
            .db
            .get(key.as_bytes())
            .await
            .map_err(|e| db_error("get", key, e))?;
        Ok(found.map(|bytes| bytes.to_vec()))
    }

    pub async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.db
            .delete(key.as_bytes())
            .await
            .map_err(|e| db_error("delete", key, e))
            .map(|_| ())
    }

    /// Every `(key, bytes)` pair under `prefix`, in key order.
    pub async fn list_prefix(&self, prefix: &str) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
        let mut entries = Vec::new();
        let mut scan = self
            .db
            .scan_prefix(prefix.as_bytes())
            .await
            .map_err(|e| db_error("scan", prefix, e))?;
        loop {
            match scan.next().await {
                Ok(Some(kv)) => entries.push((
                    String::from_utf8_lossy(&kv.key).into_owned(),
                    kv.value.to_vec(),
                )),
                Ok(None) => break,
                Err(e) => return Err(db_error("scan", prefix, e)),
            }
        }
        Ok(entries)
    }

    /// Store a value as JSON.
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let data = serde_json::to_vec(value)?;
        self.put(key, &data).await
    }

    /// Fetch and decode a JSON value.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.get(key).await? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Decode every JSON value under `prefix`. Undecodable entries are logged
    /// and skipped so one corrupt object cannot hide the rest.
    pub async fn list_json<T: DeserializeOwned>(&self, prefix: &str) -> anyhow::Result<Vec<T>> {
        let entries = self.list_prefix(prefix).await?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, value)| match serde_json::from_slice(&value) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Skipping undecodable entry {}: {}", key, e);
                    None
                }
            })
            .collect())
    }

    /// Flush and close the underlying database.
    pub async fn close(self) -> anyhow::Result<()> {
        self.db.close().await.map_err(|e| db_error("close", "/", e))?;
        info!("State store closed");
        Ok(())
    }
}
