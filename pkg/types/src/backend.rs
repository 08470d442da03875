use serde::{Deserialize, Serialize};

/// Proxy mode of a backend or front end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Http,
    Tcp,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Http => write!(f, "http"),
            Mode::Tcp => write!(f, "tcp"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub algorithm: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpCheck {
    pub method: String,
    pub uri: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    #[serde(default)]
    pub dynamic: bool,
    #[serde(default)]
    pub cookie_type: Option<String>,
    #[serde(default)]
    pub indirect: bool,
    #[serde(default)]
    pub nocache: bool,
}

/// Settings applied to every server of a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultServer {
    #[serde(default)]
    pub init_addr: Option<String>,
    #[serde(default)]
    pub check: bool,
    /// Health-check interval, milliseconds.
    #[serde(default)]
    pub inter: Option<u64>,
}

/// A named pool of servers. Identity is `name`; `id` is assigned by the
/// load balancer and never part of the desired state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub balance: Option<Balance>,
    #[serde(default)]
    pub httpchk: Option<HttpCheck>,
    /// Milliseconds.
    #[serde(default)]
    pub check_timeout: Option<u64>,
    #[serde(default)]
    pub cookie: Option<Cookie>,
    #[serde(default)]
    pub dynamic_cookie_key: Option<String>,
    #[serde(default)]
    pub default_server: Option<DefaultServer>,
    #[serde(default)]
    pub forwardfor: bool,
}

impl Backend {
    pub fn named(name: &str, mode: Mode) -> Self {
        Self {
            name: name.to_string(),
            mode,
            ..Default::default()
        }
    }
}

/// A member of a backend's server pool.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Server {
    pub name: String,
    pub address: String,
    pub port: u16,
}
