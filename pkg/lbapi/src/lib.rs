//! Load-balancer configuration API consumed by the reconciliation core.
//!
//! Every call is a single-entity request/response: it either applies fully
//! or fails with an [`ApiError`]. `NotFound` is distinguishable so callers
//! can branch between create and edit.

pub mod memory;
pub mod stored;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pkg_types::backend::{Backend, Server};
use pkg_types::defaults::Defaults;
use pkg_types::frontend::Frontend;
use pkg_types::global::{Global, LogTargets};

pub use memory::MemoryLoadBalancer;
pub use stored::StoredLoadBalancer;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("load balancer rejected {0}")]
    Rejected(String),

    #[error("configuration storage error: {0}")]
    Storage(String),
}

impl ApiError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Reserved certificate slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertSlot {
    /// Served when no SNI-specific certificate matches.
    DefaultCert,
}

impl std::fmt::Display for CertSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CertSlot::DefaultCert => write!(f, "default-cert"),
        }
    }
}

/// Section a raw configuration snippet is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnippetScope {
    Global,
    Frontend(String),
    Backend(String),
}

impl std::fmt::Display for SnippetScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnippetScope::Global => write!(f, "global"),
            SnippetScope::Frontend(name) => write!(f, "frontend/{}", name),
            SnippetScope::Backend(name) => write!(f, "backend/{}", name),
        }
    }
}

#[async_trait]
pub trait LoadBalancerApi: Send + Sync {
    async fn global_get(&self) -> ApiResult<Global>;
    async fn global_push(&self, global: &Global) -> ApiResult<()>;
    async fn global_get_log_targets(&self) -> ApiResult<LogTargets>;
    async fn global_push_log_targets(&self, targets: &LogTargets) -> ApiResult<()>;

    async fn defaults_get(&self) -> ApiResult<Defaults>;
    async fn defaults_push(&self, defaults: &Defaults) -> ApiResult<()>;

    /// Fails with [`ApiError::NotFound`] when no backend has this name.
    async fn backend_get(&self, name: &str) -> ApiResult<Backend>;
    async fn backend_create(&self, backend: &Backend) -> ApiResult<()>;
    async fn backend_edit(&self, backend: &Backend) -> ApiResult<()>;

    async fn frontend_get(&self, name: &str) -> ApiResult<Frontend>;
    async fn frontend_edit(&self, frontend: &Frontend) -> ApiResult<()>;

    /// Bundle currently installed in `slot`, if any.
    async fn certificate_get(&self, slot: CertSlot) -> ApiResult<Option<Vec<u8>>>;
    async fn install_certificate(&self, pem: &[u8], slot: CertSlot) -> ApiResult<()>;

    /// Lines of the snippet attached to `scope`; empty when none.
    async fn snippet_get(&self, scope: &SnippetScope) -> ApiResult<Vec<String>>;
    async fn snippet_set(&self, scope: &SnippetScope, lines: &[String]) -> ApiResult<()>;

    async fn servers_get(&self, backend: &str) -> ApiResult<Vec<Server>>;
    async fn servers_replace(&self, backend: &str, servers: &[Server]) -> ApiResult<()>;
}
