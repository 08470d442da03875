use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::global::{Global, LogTargets};

/// Kinds of configuration custom resources understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Global,
    Defaults,
    Backend,
}

impl ResourceKind {
    /// Registry path segment for this kind.
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Global => "globals",
            ResourceKind::Defaults => "defaults",
            ResourceKind::Backend => "backends",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Global => write!(f, "Global"),
            ResourceKind::Defaults => write!(f, "Defaults"),
            ResourceKind::Backend => write!(f, "Backend"),
        }
    }
}

/// A cluster-stored configuration object. The spec stays untyped until a
/// scope asks for it, so a malformed resource only affects that scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomResource {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    pub spec: serde_json::Value,
}

impl CustomResource {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.spec.clone()).with_context(|| {
            format!(
                "{} custom resource {}/{} is malformed",
                self.kind, self.namespace, self.name
            )
        })
    }
}

/// Spec of a Global custom resource: the Global model and its log targets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalSpec {
    #[serde(default)]
    pub config: Global,
    #[serde(default)]
    pub log_targets: LogTargets,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, Mode};

    #[test]
    fn decodes_backend_spec() {
        let cr = CustomResource {
            kind: ResourceKind::Backend,
            namespace: "ns".into(),
            name: "tuned".into(),
            spec: serde_json::json!({"mode": "tcp", "balance": {"algorithm": "leastconn"}}),
        };
        let backend: Backend = cr.decode().unwrap();
        assert_eq!(backend.mode, Mode::Tcp);
        assert_eq!(backend.balance.unwrap().algorithm, "leastconn");
    }

    #[test]
    fn malformed_spec_names_the_resource() {
        let cr = CustomResource {
            kind: ResourceKind::Global,
            namespace: "ns".into(),
            name: "broken".into(),
            spec: serde_json::json!({"config": {"maxconn": "lots"}}),
        };
        let err = cr.decode::<GlobalSpec>().unwrap_err().to_string();
        assert!(err.contains("ns/broken"), "{}", err);
    }
}
