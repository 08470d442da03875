use serde::{Deserialize, Serialize};

use crate::Annotations;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    #[default]
    ClusterIP,
    NodePort,
    LoadBalancer,
    ExternalName,
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceType::ClusterIP => write!(f, "ClusterIP"),
            ServiceType::NodePort => write!(f, "NodePort"),
            ServiceType::LoadBalancer => write!(f, "LoadBalancer"),
            ServiceType::ExternalName => write!(f, "ExternalName"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    #[serde(default)]
    pub name: String,
    pub port: u16,
    #[serde(default)]
    pub target_port: u16,
}

impl ServicePort {
    /// Identifier used in backend names: the port name, or its number when unnamed.
    pub fn identifier(&self) -> String {
        if self.name.is_empty() {
            self.port.to_string()
        } else {
            self.name.clone()
        }
    }

    /// Port the endpoints actually listen on.
    pub fn effective_target_port(&self) -> u16 {
        if self.target_port == 0 {
            self.port
        } else {
            self.target_port
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSpec {
    #[serde(default)]
    pub ports: Vec<ServicePort>,
    #[serde(default)]
    pub service_type: ServiceType,
    /// DNS target for `ExternalName` services.
    #[serde(default)]
    pub external_name: Option<String>,
}

/// Read-only view of a Kubernetes Service for the duration of a pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default)]
    pub spec: ServiceSpec,
}

impl Service {
    pub fn ports(&self) -> &[ServicePort] {
        &self.spec.ports
    }

    /// External DNS target, if the Service points outside the cluster.
    pub fn dns(&self) -> Option<&str> {
        self.spec
            .external_name
            .as_deref()
            .filter(|name| !name.is_empty())
    }
}
