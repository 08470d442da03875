//! Load-balancer configuration persisted in the state store.
//!
//! The controller writes the desired configuration under `/lb/...`; a
//! renderer next to the balancer process turns it into a config file.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use pkg_constants::state::LB_PREFIX;
use pkg_state::client::StateStore;
use pkg_types::backend::{Backend, Mode, Server};
use pkg_types::defaults::Defaults;
use pkg_types::frontend::Frontend;
use pkg_types::global::{Global, LogTargets};

use crate::{ApiError, ApiResult, CertSlot, LoadBalancerApi, SnippetScope};

fn lb_key(path: &str) -> String {
    format!("{}{}", LB_PREFIX, path)
}

fn storage(e: anyhow::Error) -> ApiError {
    ApiError::Storage(e.to_string())
}

#[derive(Clone)]
pub struct StoredLoadBalancer {
    store: StateStore,
    /// Serializes id allocation and create-if-absent.
    seq: Arc<Mutex<()>>,
}

impl StoredLoadBalancer {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            seq: Arc::new(Mutex::new(())),
        }
    }

    /// Create any of the given front ends that do not exist yet.
    pub async fn bootstrap_frontends(&self, names: &[&str], mode: Mode) -> anyhow::Result<()> {
        let seq = self.seq.lock().await;
        for name in names {
            let key = lb_key(&format!("frontends/{}", name));
            if self.store.get(&key).await?.is_none() {
                let frontend = Frontend {
                    id: Some(self.next_id(&seq).await?),
                    name: name.to_string(),
                    mode,
                    default_backend: None,
                };
                self.store.put_json(&key, &frontend).await?;
                info!("Bootstrapped front end {}", name);
            }
        }
        Ok(())
    }

    async fn read<T: DeserializeOwned>(&self, path: &str) -> ApiResult<Option<T>> {
        self.store.get_json(&lb_key(path)).await.map_err(storage)
    }

    async fn write<T: Serialize + Sync>(&self, path: &str, value: &T) -> ApiResult<()> {
        debug!("Writing {}{}", LB_PREFIX, path);
        self.store
            .put_json(&lb_key(path), value)
            .await
            .map_err(storage)
    }

    async fn next_id(&self, _seq: &MutexGuard<'_, ()>) -> ApiResult<u64> {
        let id = self.read::<u64>("seq").await?.unwrap_or(0) + 1;
        self.write("seq", &id).await?;
        Ok(id)
    }
}

#[async_trait]
impl LoadBalancerApi for StoredLoadBalancer {
    async fn global_get(&self) -> ApiResult<Global> {
        Ok(self.read("global").await?.unwrap_or_default())
    }

    async fn global_push(&self, global: &Global) -> ApiResult<()> {
        self.write("global", global).await
    }

    async fn global_get_log_targets(&self) -> ApiResult<LogTargets> {
        Ok(self.read("log-targets").await?.unwrap_or_default())
    }

    async fn global_push_log_targets(&self, targets: &LogTargets) -> ApiResult<()> {
        self.write("log-targets", targets).await
    }

    async fn defaults_get(&self) -> ApiResult<Defaults> {
        Ok(self.read("defaults").await?.unwrap_or_default())
    }

    async fn defaults_push(&self, defaults: &Defaults) -> ApiResult<()> {
        self.write("defaults", defaults).await
    }

    async fn backend_get(&self, name: &str) -> ApiResult<Backend> {
        self.read(&format!("backends/{}", name))
            .await?
            .ok_or_else(|| ApiError::not_found("backend", name))
    }

    async fn backend_create(&self, backend: &Backend) -> ApiResult<()> {
        let path = format!("backends/{}", backend.name);
        let seq = self.seq.lock().await;
        if self.read::<Backend>(&path).await?.is_some() {
            return Err(ApiError::AlreadyExists {
                kind: "backend",
                name: backend.name.clone(),
            });
        }
        let mut stored = backend.clone();
        stored.id = Some(self.next_id(&seq).await?);
        self.write(&path, &stored).await
    }

    async fn backend_edit(&self, backend: &Backend) -> ApiResult<()> {
        let live = self.backend_get(&backend.name).await?;
        let mut stored = backend.clone();
        stored.id = live.id;
        self.write(&format!("backends/{}", backend.name), &stored)
            .await
    }

    async fn frontend_get(&self, name: &str) -> ApiResult<Frontend> {
        self.read(&format!("frontends/{}", name))
            .await?
            .ok_or_else(|| ApiError::not_found("frontend", name))
    }

    async fn frontend_edit(&self, frontend: &Frontend) -> ApiResult<()> {
        let live = self.frontend_get(&frontend.name).await?;
        let mut stored = frontend.clone();
        stored.id = live.id;
        self.write(&format!("frontends/{}", frontend.name), &stored)
            .await
    }

    async fn certificate_get(&self, slot: CertSlot) -> ApiResult<Option<Vec<u8>>> {
        self.store
            .get(&lb_key(&format!("certs/{}", slot)))
            .await
            .map_err(storage)
    }

    async fn install_certificate(&self, pem: &[u8], slot: CertSlot) -> ApiResult<()> {
        self.store
            .put(&lb_key(&format!("certs/{}", slot)), pem)
            .await
            .map_err(storage)
    }

    async fn snippet_get(&self, scope: &SnippetScope) -> ApiResult<Vec<String>> {
        Ok(self
            .read(&format!("snippets/{}", scope))
            .await?
            .unwrap_or_default())
    }

    async fn snippet_set(&self, scope: &SnippetScope, lines: &[String]) -> ApiResult<()> {
        let path = format!("snippets/{}", scope);
        if lines.is_empty() {
            return self.store.delete(&lb_key(&path)).await.map_err(storage);
        }
        self.write(&path, &lines).await
    }

    async fn servers_get(&self, backend: &str) -> ApiResult<Vec<Server>> {
        self.backend_get(backend).await?;
        Ok(self
            .read(&format!("servers/{}", backend))
            .await?
            .unwrap_or_default())
    }

    async fn servers_replace(&self, backend: &str, servers: &[Server]) -> ApiResult<()> {
        self.backend_get(backend).await?;
        self.write(&format!("servers/{}", backend), &servers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_live_under_the_lb_prefix() {
        assert_eq!(lb_key("backends/ns_app_http"), "/lb/backends/ns_app_http");
        assert_eq!(
            lb_key(&format!("snippets/{}", SnippetScope::Frontend("http".into()))),
            "/lb/snippets/frontend/http"
        );
    }

    async fn temp_lb(name: &str) -> StoredLoadBalancer {
        let dir = std::env::temp_dir().join(format!("lbapi-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        StoredLoadBalancer::new(StateStore::new(&dir.to_string_lossy()).await.unwrap())
    }

    #[tokio::test]
    async fn concurrent_creates_get_distinct_ids() {
        let lb = temp_lb("ids").await;
        let a = Backend::named("ns_a_http", Mode::Http);
        let b = Backend::named("ns_b_http", Mode::Http);
        let (ra, rb) = tokio::join!(lb.backend_create(&a), lb.backend_create(&b));
        ra.unwrap();
        rb.unwrap();

        let id_a = lb.backend_get("ns_a_http").await.unwrap().id;
        let id_b = lb.backend_get("ns_b_http").await.unwrap().id;
        assert!(id_a.is_some() && id_b.is_some());
        assert_ne!(id_a, id_b);
    }

    #[tokio::test]
    async fn concurrent_duplicate_create_succeeds_once() {
        let lb = temp_lb("dup").await;
        let backend = Backend::named("ns_app_http", Mode::Tcp);
        let (first, second) =
            tokio::join!(lb.backend_create(&backend), lb.backend_create(&backend));
        let created = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(created, 1);
        assert!(
            [first, second]
                .into_iter()
                .any(|r| matches!(r, Err(ApiError::AlreadyExists { .. })))
        );
    }

    #[tokio::test]
    async fn certificate_slot_reads_back() {
        let lb = temp_lb("cert").await;
        assert_eq!(lb.certificate_get(CertSlot::DefaultCert).await.unwrap(), None);
        lb.install_certificate(b"CERT\n", CertSlot::DefaultCert)
            .await
            .unwrap();
        assert_eq!(
            lb.certificate_get(CertSlot::DefaultCert).await.unwrap(),
            Some(b"CERT\n".to_vec())
        );
    }
}
