use serde::{Deserialize, Serialize};

/// An address of a backend pod serving a Service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointAddress {
    pub ip: String,
    #[serde(default)]
    pub pod_name: Option<String>,
}

/// A port exposed by a backend pod.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointPort {
    #[serde(default)]
    pub name: String,
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "TCP".to_string()
}

/// Backend addresses of a Service, keyed by Service namespace/name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub service_name: String,
    pub namespace: String,
    #[serde(default)]
    pub addresses: Vec<EndpointAddress>,
    #[serde(default)]
    pub ports: Vec<EndpointPort>,
}

impl Endpoint {
    /// Port the pods expose for the given service port name, falling back to `target_port`.
    pub fn port_for(&self, port_name: &str, target_port: u16) -> u16 {
        self.ports
            .iter()
            .find(|p| p.name == port_name)
            .map(|p| p.port)
            .unwrap_or(target_port)
    }
}
