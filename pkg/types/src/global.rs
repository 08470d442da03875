use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuneOptions {
    #[serde(default)]
    pub ssl_default_dh_param: Option<u32>,
    #[serde(default)]
    pub bufsize: Option<u32>,
}

/// Process-wide settings of the load balancer. Any change requires a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Global {
    #[serde(default)]
    pub nbthread: Option<u32>,
    #[serde(default)]
    pub maxconn: Option<u32>,
    /// Milliseconds.
    #[serde(default)]
    pub hard_stop_after: Option<u64>,
    #[serde(default)]
    pub ssl_default_bind_ciphers: Option<String>,
    #[serde(default)]
    pub ssl_default_bind_options: Option<String>,
    #[serde(default)]
    pub tune: Option<TuneOptions>,
    // Controller-owned, always overwritten from the environment.
    #[serde(default)]
    pub pidfile: Option<String>,
    #[serde(default)]
    pub runtime_socket: Option<String>,
    #[serde(default)]
    pub server_state_base: Option<String>,
}

/// A syslog destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTarget {
    pub address: String,
    #[serde(default)]
    pub facility: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

/// Global log targets, in declaration order.
pub type LogTargets = Vec<LogTarget>;
