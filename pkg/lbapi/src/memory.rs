//! In-process load balancer used by tests and local experiments.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use pkg_constants::lb::{FRONTEND_HTTP, FRONTEND_HTTPS, FRONTEND_STATS};
use pkg_types::backend::{Backend, Mode, Server};
use pkg_types::defaults::Defaults;
use pkg_types::frontend::Frontend;
use pkg_types::global::{Global, LogTargets};

use crate::{ApiError, ApiResult, CertSlot, LoadBalancerApi, SnippetScope};

#[derive(Default)]
struct Inner {
    global: Global,
    log_targets: LogTargets,
    defaults: Defaults,
    backends: BTreeMap<String, Backend>,
    frontends: BTreeMap<String, Frontend>,
    certificates: HashMap<CertSlot, Vec<u8>>,
    snippets: HashMap<SnippetScope, Vec<String>>,
    servers: HashMap<String, Vec<Server>>,
    next_id: u64,
    /// Successful writes, as `operation:target`.
    writes: Vec<String>,
    /// Operations that fail with `Rejected`.
    rejected: HashSet<String>,
}

/// Load balancer held entirely in memory. Records every successful write so
/// callers can assert exactly what a pass changed.
#[derive(Default)]
pub struct MemoryLoadBalancer {
    inner: Mutex<Inner>,
}

impl MemoryLoadBalancer {
    /// Empty configuration with the standard `http`, `https` and `stats` front ends.
    pub fn new() -> Self {
        let lb = Self::default();
        for name in [FRONTEND_HTTP, FRONTEND_HTTPS, FRONTEND_STATS] {
            lb.insert_frontend(Frontend {
                name: name.to_string(),
                mode: Mode::Http,
                ..Default::default()
            });
        }
        lb
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_frontend(&self, mut frontend: Frontend) {
        let mut inner = self.lock();
        inner.next_id += 1;
        frontend.id = Some(inner.next_id);
        inner.frontends.insert(frontend.name.clone(), frontend);
    }

    /// Make every later call of `operation` (e.g. `"backend_edit"`) fail.
    pub fn reject(&self, operation: &str) {
        self.lock().rejected.insert(operation.to_string());
    }

    pub fn accept_all(&self) {
        self.lock().rejected.clear();
    }

    /// All successful writes so far, as `operation:target`.
    pub fn writes(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    /// Number of successful writes of one operation.
    pub fn write_count(&self, operation: &str) -> usize {
        let prefix = format!("{}:", operation);
        self.lock()
            .writes
            .iter()
            .filter(|w| w.starts_with(&prefix))
            .count()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    pub fn certificate(&self, slot: CertSlot) -> Option<Vec<u8>> {
        self.lock().certificates.get(&slot).cloned()
    }

    pub fn backend_names(&self) -> Vec<String> {
        self.lock().backends.keys().cloned().collect()
    }

    /// Run a write: fails if the operation is rejected, records it otherwise.
    fn write<T>(
        &self,
        operation: &str,
        target: &str,
        apply: impl FnOnce(&mut Inner) -> ApiResult<T>,
    ) -> ApiResult<T> {
        let mut inner = self.lock();
        if inner.rejected.contains(operation) {
            return Err(ApiError::Rejected(format!("{} {}", operation, target)));
        }
        let result = apply(&mut inner)?;
        inner.writes.push(format!("{}:{}", operation, target));
        Ok(result)
    }
}

#[async_trait]
impl LoadBalancerApi for MemoryLoadBalancer {
    async fn global_get(&self) -> ApiResult<Global> {
        Ok(self.lock().global.clone())
    }

    async fn global_push(&self, global: &Global) -> ApiResult<()> {
        self.write("global_push", "global", |inner| {
            inner.global = global.clone();
            Ok(())
        })
    }

    async fn global_get_log_targets(&self) -> ApiResult<LogTargets> {
        Ok(self.lock().log_targets.clone())
    }

    async fn global_push_log_targets(&self, targets: &LogTargets) -> ApiResult<()> {
        self.write("global_push_log_targets", "global", |inner| {
            inner.log_targets = targets.clone();
            Ok(())
        })
    }

    async fn defaults_get(&self) -> ApiResult<Defaults> {
        Ok(self.lock().defaults.clone())
    }

    async fn defaults_push(&self, defaults: &Defaults) -> ApiResult<()> {
        self.write("defaults_push", "defaults", |inner| {
            inner.defaults = defaults.clone();
            Ok(())
        })
    }

    async fn backend_get(&self, name: &str) -> ApiResult<Backend> {
        self.lock()
            .backends
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::not_found("backend", name))
    }

    async fn backend_create(&self, backend: &Backend) -> ApiResult<()> {
        self.write("backend_create", &backend.name, |inner| {
            if inner.backends.contains_key(&backend.name) {
                return Err(ApiError::AlreadyExists {
                    kind: "backend",
                    name: backend.name.clone(),
                });
            }
            inner.next_id += 1;
            let mut stored = backend.clone();
            stored.id = Some(inner.next_id);
            inner.backends.insert(stored.name.clone(), stored);
            Ok(())
        })
    }

    async fn backend_edit(&self, backend: &Backend) -> ApiResult<()> {
        self.write("backend_edit", &backend.name, |inner| {
            let Some(live) = inner.backends.get_mut(&backend.name) else {
                return Err(ApiError::not_found("backend", backend.name.clone()));
            };
            let id = live.id;
            *live = backend.clone();
            live.id = id;
            Ok(())
        })
    }

    async fn frontend_get(&self, name: &str) -> ApiResult<Frontend> {
        self.lock()
            .frontends
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::not_found("frontend", name))
    }

    async fn frontend_edit(&self, frontend: &Frontend) -> ApiResult<()> {
        self.write("frontend_edit", &frontend.name, |inner| {
            let Some(live) = inner.frontends.get_mut(&frontend.name) else {
                return Err(ApiError::not_found("frontend", frontend.name.clone()));
            };
            let id = live.id;
            *live = frontend.clone();
            live.id = id;
            Ok(())
        })
    }

    async fn certificate_get(&self, slot: CertSlot) -> ApiResult<Option<Vec<u8>>> {
        Ok(self.lock().certificates.get(&slot).cloned())
    }

    async fn install_certificate(&self, pem: &[u8], slot: CertSlot) -> ApiResult<()> {
        self.write("install_certificate", &slot.to_string(), |inner| {
            inner.certificates.insert(slot, pem.to_vec());
            Ok(())
        })
    }

    async fn snippet_get(&self, scope: &SnippetScope) -> ApiResult<Vec<String>> {
        Ok(self.lock().snippets.get(scope).cloned().unwrap_or_default())
    }

    async fn snippet_set(&self, scope: &SnippetScope, lines: &[String]) -> ApiResult<()> {
        self.write("snippet_set", &scope.to_string(), |inner| {
            if lines.is_empty() {
                inner.snippets.remove(scope);
            } else {
                inner.snippets.insert(scope.clone(), lines.to_vec());
            }
            Ok(())
        })
    }

    async fn servers_get(&self, backend: &str) -> ApiResult<Vec<Server>> {
        let inner = self.lock();
        if !inner.backends.contains_key(backend) {
            return Err(ApiError::not_found("backend", backend));
        }
        Ok(inner.servers.get(backend).cloned().unwrap_or_default())
    }

    async fn servers_replace(&self, backend: &str, servers: &[Server]) -> ApiResult<()> {
        self.write("servers_replace", backend, |inner| {
            if !inner.backends.contains_key(backend) {
                return Err(ApiError::not_found("backend", backend));
            }
            inner.servers.insert(backend.to_string(), servers.to_vec());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn backend_ids_are_assigned_by_the_balancer() {
        let lb = MemoryLoadBalancer::new();
        lb.backend_create(&Backend::named("ns_app_http", Mode::Http))
            .await
            .unwrap();

        let live = lb.backend_get("ns_app_http").await.unwrap();
        assert!(live.id.is_some());

        let mut edited = live.clone();
        edited.id = None;
        edited.forwardfor = true;
        lb.backend_edit(&edited).await.unwrap();
        assert_eq!(lb.backend_get("ns_app_http").await.unwrap().id, live.id);
    }

    #[tokio::test]
    async fn missing_backend_is_not_found() {
        let lb = MemoryLoadBalancer::new();
        let err = lb.backend_get("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let lb = MemoryLoadBalancer::new();
        let backend = Backend::named("b", Mode::Tcp);
        lb.backend_create(&backend).await.unwrap();
        assert!(matches!(
            lb.backend_create(&backend).await,
            Err(ApiError::AlreadyExists { .. })
        ));
        assert_eq!(lb.write_count("backend_create"), 1);
    }

    #[tokio::test]
    async fn rejected_operations_leave_state_untouched() {
        let lb = MemoryLoadBalancer::new();
        lb.reject("global_push");
        let global = Global {
            maxconn: Some(1000),
            ..Default::default()
        };
        assert!(lb.global_push(&global).await.is_err());
        assert_eq!(lb.global_get().await.unwrap(), Global::default());
        assert!(lb.writes().is_empty());
    }
}
