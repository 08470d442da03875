use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFile {
    pub code: u16,
    pub file: String,
}

/// Settings inherited by every front end and backend. Timeouts in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub http_request_timeout: Option<u64>,
    #[serde(default)]
    pub connect_timeout: Option<u64>,
    #[serde(default)]
    pub client_timeout: Option<u64>,
    #[serde(default)]
    pub queue_timeout: Option<u64>,
    #[serde(default)]
    pub server_timeout: Option<u64>,
    #[serde(default)]
    pub tunnel_timeout: Option<u64>,
    #[serde(default)]
    pub http_keep_alive_timeout: Option<u64>,
    #[serde(default)]
    pub log_format: Option<String>,
    #[serde(default)]
    pub dontlognull: bool,
    #[serde(default)]
    pub logasap: bool,
    /// Owned by the error-page subsystem; carried over from the live model.
    #[serde(default)]
    pub error_files: Vec<ErrorFile>,
}
