use serde::{Deserialize, Serialize};

use crate::service::ServicePort;

/// Selects a Service port either by number or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortSelector {
    Number(u16),
    Name(String),
}

impl PortSelector {
    /// Parse a selector from free text: digits select by number, anything else by name.
    pub fn parse(value: &str) -> Self {
        match value.parse::<u16>() {
            Ok(port) => PortSelector::Number(port),
            Err(_) => PortSelector::Name(value.to_string()),
        }
    }

    pub fn matches(&self, port: &ServicePort) -> bool {
        match self {
            PortSelector::Number(n) => port.port == *n,
            PortSelector::Name(name) => !port.name.is_empty() && port.name == *name,
        }
    }
}

impl std::fmt::Display for PortSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortSelector::Number(n) => write!(f, "{}", n),
            PortSelector::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Desired binding of a Service port to a load-balancer backend.
///
/// Created per Ingress rule path or per default-backend configuration.
/// `resolved_port` is filled in once the backend name has been derived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngressPath {
    pub svc_namespace: String,
    pub svc_name: String,
    pub port: Option<PortSelector>,
    pub resolved_port: Option<ServicePort>,
    pub is_default_backend: bool,
}

impl IngressPath {
    pub fn new(namespace: &str, name: &str, port: Option<PortSelector>) -> Self {
        Self {
            svc_namespace: namespace.to_string(),
            svc_name: name.to_string(),
            port,
            ..Default::default()
        }
    }

    pub fn default_backend(namespace: &str, name: &str, port: Option<PortSelector>) -> Self {
        Self {
            is_default_backend: true,
            ..Self::new(namespace, name, port)
        }
    }
}

/// Path matching type for Ingress rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PathType {
    #[default]
    Prefix,
    Exact,
}

/// Backend service target for an Ingress rule path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressBackend {
    pub service_name: String,
    #[serde(default)]
    pub service_port: Option<PortSelector>,
}

/// A single path rule within an Ingress HTTP rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HTTPIngressPath {
    pub path: String,
    #[serde(default)]
    pub path_type: PathType,
    pub backend: IngressBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressHTTP {
    pub paths: Vec<HTTPIngressPath>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressRule {
    #[serde(default)]
    pub host: String,
    pub http: IngressHTTP,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressSpec {
    #[serde(default)]
    pub rules: Vec<IngressRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingress {
    pub name: String,
    pub namespace: String,
    pub spec: IngressSpec,
}

impl Ingress {
    /// Service bindings requested by every rule path, in rule order.
    /// Backends always live in the Ingress namespace.
    pub fn paths(&self) -> Vec<IngressPath> {
        self.spec
            .rules
            .iter()
            .flat_map(|rule| rule.http.paths.iter())
            .map(|p| {
                IngressPath::new(
                    &self.namespace,
                    &p.backend.service_name,
                    p.backend.service_port.clone(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_parses_numbers_and_names() {
        assert_eq!(PortSelector::parse("8080"), PortSelector::Number(8080));
        assert_eq!(
            PortSelector::parse("http"),
            PortSelector::Name("http".to_string())
        );
    }

    #[test]
    fn name_selector_never_matches_unnamed_port() {
        let port = ServicePort {
            name: String::new(),
            port: 80,
            target_port: 8080,
        };
        assert!(!PortSelector::Name(String::new()).matches(&port));
        assert!(PortSelector::Number(80).matches(&port));
    }

    #[test]
    fn ingress_backend_port_accepts_number_or_name() {
        let ingress: Ingress = serde_json::from_str(
            r#"{
                "name": "web",
                "namespace": "ns",
                "spec": {"rules": [{"host": "a.example", "http": {"paths": [
                    {"path": "/", "backend": {"service_name": "app", "service_port": 8080}},
                    {"path": "/m", "backend": {"service_name": "app", "service_port": "metrics"}}
                ]}}]}
            }"#,
        )
        .unwrap();

        let paths = ingress.paths();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].svc_namespace, "ns");
        assert_eq!(paths[0].port, Some(PortSelector::Number(8080)));
        assert_eq!(paths[1].port, Some(PortSelector::Name("metrics".into())));
        assert!(!paths[0].is_default_backend);
    }
}
