//! Load-balancer entity names and built-in values.

/// Front end receiving plain HTTP traffic.
pub const FRONTEND_HTTP: &str = "http";

/// Front end receiving TLS traffic.
pub const FRONTEND_HTTPS: &str = "https";

/// Statistics front end (only touched by config snippets).
pub const FRONTEND_STATS: &str = "stats";

/// Name of the backend synthesized for `default-backend-port`.
pub const DEFAULT_LOCAL_BACKEND: &str = "default_local_backend";

/// Address of the synthesized local default backend server.
pub const LOCAL_BACKEND_ADDRESS: &str = "127.0.0.1";

/// Fallback dynamic-cookie key used when persistence is dynamic but no key
/// was supplied. Fixed literal: changing it breaks session affinity of
/// deployed clusters. Not secret-strength.
pub const DYNAMIC_COOKIE_KEY: &str = "ohph7OoGhong";

/// Built-in `tune.ssl.default-dh-param` applied when no custom resource exists.
pub const DEFAULT_DH_PARAM: u32 = 2048;

/// `init-addr` policy forced on backends whose Service is an external DNS name.
pub const DNS_INIT_ADDR: &str = "last,libc,none";
