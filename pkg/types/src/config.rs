use serde::{Deserialize, Serialize};

use crate::Annotations;

/// Paths the load balancer process is started with. These Global fields are
/// owned by the controller, not by any annotation or custom resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default, alias = "pid-file")]
    pub pid_file: Option<String>,
    #[serde(default, alias = "runtime-socket")]
    pub runtime_socket: Option<String>,
    #[serde(default, alias = "server-state-base")]
    pub server_state_base: Option<String>,
}

/// Controller configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// pod-namespace: haproxy-controller
/// data-dir: /var/lib/lbsync
/// configmap: haproxy-controller/haproxy-kubernetes-ingress
/// sync-interval-secs: 5
/// default-backend-port: 6061
/// annotations:
///   timeout-connect: 5s
/// reload-hooks:
///   - systemctl reload haproxy
/// restart-hooks:
///   - systemctl restart haproxy
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfigFile {
    #[serde(default, alias = "pod-namespace")]
    pub pod_namespace: Option<String>,
    #[serde(default, alias = "data-dir")]
    pub data_dir: Option<String>,
    /// `namespace/name` of the main ConfigMap.
    #[serde(default)]
    pub configmap: Option<String>,
    #[serde(default, alias = "sync-interval-secs")]
    pub sync_interval_secs: Option<u64>,
    #[serde(default, alias = "pass-timeout-secs")]
    pub pass_timeout_secs: Option<u64>,
    #[serde(default, alias = "frontend-http")]
    pub frontend_http: Option<String>,
    #[serde(default, alias = "frontend-https")]
    pub frontend_https: Option<String>,
    #[serde(default, alias = "default-backend-service")]
    pub default_backend_service: Option<String>,
    #[serde(default, alias = "default-backend-port")]
    pub default_backend_port: Option<u16>,
    /// CLI-level annotation defaults; lowest precedence.
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default, alias = "reload-hooks")]
    pub reload_hooks: Vec<String>,
    #[serde(default, alias = "restart-hooks")]
    pub restart_hooks: Vec<String>,
    #[serde(default, alias = "hook-timeout-secs")]
    pub hook_timeout_secs: Option<u64>,
    #[serde(default, alias = "dry-run")]
    pub dry_run: Option<bool>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}
