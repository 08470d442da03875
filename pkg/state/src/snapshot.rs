//! Read-only cluster state seen by one reconciliation pass.

use std::collections::HashMap;
use tracing::debug;

use pkg_types::configmap::ConfigMap;
use pkg_types::custom_resource::{CustomResource, ResourceKind};
use pkg_types::endpoint::Endpoint;
use pkg_types::ingress::Ingress;
use pkg_types::secret::Secret;
use pkg_types::service::Service;

use crate::client::{StateStore, registry_prefix};

/// Cluster-state provider consumed by the reconciliation core.
///
/// Implementations must not change between calls made within one pass.
pub trait ClusterState: Send + Sync {
    fn service(&self, namespace: &str, name: &str) -> Option<&Service>;
    fn secret(&self, namespace: &str, name: &str) -> Option<&Secret>;
    fn config_map(&self, namespace: &str, name: &str) -> Option<&ConfigMap>;
    fn endpoints(&self, namespace: &str, name: &str) -> Option<&Endpoint>;
    fn custom_resource(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Option<&CustomResource>;
    fn ingresses(&self) -> &[Ingress];
}

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

/// In-memory copy of the registry, taken once per pass.
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    services: HashMap<Key, Service>,
    secrets: HashMap<Key, Secret>,
    config_maps: HashMap<Key, ConfigMap>,
    endpoints: HashMap<Key, Endpoint>,
    custom_resources: HashMap<(ResourceKind, String, String), CustomResource>,
    ingresses: Vec<Ingress>,
}

impl ClusterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every object the controller consumes from the registry.
    pub async fn load(store: &StateStore) -> anyhow::Result<Self> {
        let mut snapshot = Self::new();
        for svc in store.list_json::<Service>(&registry_prefix("services")).await? {
            snapshot = snapshot.with_service(svc);
        }
        for secret in store.list_json::<Secret>(&registry_prefix("secrets")).await? {
            snapshot = snapshot.with_secret(secret);
        }
        for cm in store
            .list_json::<ConfigMap>(&registry_prefix("configmaps"))
            .await?
        {
            snapshot = snapshot.with_config_map(cm);
        }
        for ep in store
            .list_json::<Endpoint>(&registry_prefix("endpoints"))
            .await?
        {
            snapshot = snapshot.with_endpoints(ep);
        }
        for kind in [
            ResourceKind::Global,
            ResourceKind::Defaults,
            ResourceKind::Backend,
        ] {
            let prefix = registry_prefix(&format!("crs/{}", kind.plural()));
            for cr in store.list_json::<CustomResource>(&prefix).await? {
                snapshot = snapshot.with_custom_resource(cr);
            }
        }
        snapshot.ingresses = store
            .list_json::<Ingress>(&registry_prefix("ingresses"))
            .await?;

        debug!(
            "Cluster snapshot loaded: {} services, {} ingresses, {} custom resources",
            snapshot.services.len(),
            snapshot.ingresses.len(),
            snapshot.custom_resources.len()
        );
        Ok(snapshot)
    }

    pub fn with_service(mut self, svc: Service) -> Self {
        self.services.insert(key(&svc.namespace, &svc.name), svc);
        self
    }

    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secrets
            .insert(key(&secret.namespace, &secret.name), secret);
        self
    }

    pub fn with_config_map(mut self, cm: ConfigMap) -> Self {
        self.config_maps.insert(key(&cm.namespace, &cm.name), cm);
        self
    }

    pub fn with_endpoints(mut self, ep: Endpoint) -> Self {
        self.endpoints
            .insert(key(&ep.namespace, &ep.service_name), ep);
        self
    }

    pub fn with_custom_resource(mut self, cr: CustomResource) -> Self {
        self.custom_resources
            .insert((cr.kind, cr.namespace.clone(), cr.name.clone()), cr);
        self
    }

    pub fn with_ingress(mut self, ingress: Ingress) -> Self {
        self.ingresses.push(ingress);
        self
    }
}

impl ClusterState for ClusterSnapshot {
    fn service(&self, namespace: &str, name: &str) -> Option<&Service> {
        self.services.get(&key(namespace, name))
    }

    fn secret(&self, namespace: &str, name: &str) -> Option<&Secret> {
        self.secrets.get(&key(namespace, name))
    }

    fn config_map(&self, namespace: &str, name: &str) -> Option<&ConfigMap> {
        self.config_maps.get(&key(namespace, name))
    }

    fn endpoints(&self, namespace: &str, name: &str) -> Option<&Endpoint> {
        self.endpoints.get(&key(namespace, name))
    }

    fn custom_resource(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Option<&CustomResource> {
        self.custom_resources
            .get(&(kind, namespace.to_string(), name.to_string()))
    }

    fn ingresses(&self) -> &[Ingress] {
        &self.ingresses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_namespaced() {
        let snapshot = ClusterSnapshot::new()
            .with_service(Service {
                name: "app".into(),
                namespace: "a".into(),
                ..Default::default()
            })
            .with_custom_resource(CustomResource {
                kind: ResourceKind::Backend,
                namespace: "a".into(),
                name: "tuned".into(),
                spec: serde_json::json!({}),
            });

        assert!(snapshot.service("a", "app").is_some());
        assert!(snapshot.service("b", "app").is_none());
        assert!(
            snapshot
                .custom_resource(ResourceKind::Backend, "a", "tuned")
                .is_some()
        );
        assert!(
            snapshot
                .custom_resource(ResourceKind::Global, "a", "tuned")
                .is_none()
        );
    }
}
