//! Server-pool synchronization for a bound backend.

use async_trait::async_trait;
use tracing::info;

use pkg_constants::lb::LOCAL_BACKEND_ADDRESS;
use pkg_lbapi::LoadBalancerApi;
use pkg_state::snapshot::ClusterState;
use pkg_types::backend::Server;

use crate::backend::{BackendBinding, BindingTarget};
use crate::classifier::{EntityKind, classify};
use crate::error::SyncError;

#[async_trait]
pub trait EndpointSync: Send + Sync {
    /// Bring the servers of `backend` in line with the binding's endpoints.
    /// Returns whether anything was written (a reload-class change).
    async fn sync_servers(
        &self,
        lb: &dyn LoadBalancerApi,
        cluster: &dyn ClusterState,
        backend: &str,
        binding: &BackendBinding<'_>,
    ) -> Result<bool, SyncError>;
}

/// Builds server lists from the snapshot's Endpoints.
#[derive(Debug, Default)]
pub struct EndpointSyncer;

impl EndpointSyncer {
    pub fn new() -> Self {
        Self
    }

    pub fn desired_servers(
        cluster: &dyn ClusterState,
        binding: &BackendBinding<'_>,
    ) -> Vec<Server> {
        let service = match binding.target {
            BindingTarget::Local { port } => {
                return vec![server(1, LOCAL_BACKEND_ADDRESS, port)];
            }
            BindingTarget::Service(svc) => svc,
        };
        let Some(port) = binding.path.resolved_port.as_ref() else {
            return Vec::new();
        };
        if let Some(dns) = service.dns() {
            return vec![server(1, dns, port.effective_target_port())];
        }
        let Some(endpoint) = cluster.endpoints(&service.namespace, &service.name) else {
            return Vec::new();
        };
        let target = endpoint.port_for(&port.name, port.effective_target_port());
        let mut addresses: Vec<&str> =
            endpoint.addresses.iter().map(|a| a.ip.as_str()).collect();
        addresses.sort_unstable();
        addresses.dedup();
        addresses
            .into_iter()
            .enumerate()
            .map(|(i, ip)| server(i + 1, ip, target))
            .collect()
    }
}

fn server(index: usize, address: &str, port: u16) -> Server {
    Server {
        name: format!("SRV_{}", index),
        address: address.to_string(),
        port,
    }
}

#[async_trait]
impl EndpointSync for EndpointSyncer {
    async fn sync_servers(
        &self,
        lb: &dyn LoadBalancerApi,
        cluster: &dyn ClusterState,
        backend: &str,
        binding: &BackendBinding<'_>,
    ) -> Result<bool, SyncError> {
        let desired = Self::desired_servers(cluster, binding);
        // A backend created in this pass has no servers yet.
        let live = if binding.new_backend {
            Vec::new()
        } else {
            lb.servers_get(backend).await?
        };
        if !classify(EntityKind::Servers, &desired, &live).changed {
            return Ok(false);
        }
        lb.servers_replace(backend, &desired).await?;
        info!("Backend {}: {} servers", backend, desired.len());
        Ok(true)
    }
}
