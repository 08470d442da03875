//! Filesystem path and environment defaults.

/// Default config file path for the controller.
pub const DEFAULT_CONFIG: &str = "/etc/lbsync/config.yaml";

/// Default data directory for the state store.
pub const DEFAULT_DATA_DIR: &str = "/tmp/lbsync-data";

/// Default pid file written by the load balancer.
pub const DEFAULT_PID_FILE: &str = "/var/run/haproxy.pid";

/// Default runtime API socket of the load balancer.
pub const DEFAULT_RUNTIME_SOCKET: &str = "/var/run/haproxy-runtime-api.sock";

/// Default directory for server-state files.
pub const DEFAULT_SERVER_STATE_BASE: &str = "/var/state/haproxy/";
