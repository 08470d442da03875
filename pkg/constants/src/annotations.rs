//! Well-known option keys read from Service, ConfigMap and CLI-level annotations.

// ─── Custom resource references ───────────────────────────────────────────

/// Names the custom resource holding the Global model (and its log targets).
pub const CR_GLOBAL: &str = "cr-global";

/// Names the custom resource holding the Defaults model.
pub const CR_DEFAULTS: &str = "cr-defaults";

/// Names the custom resource holding a Backend model.
pub const CR_BACKEND: &str = "cr-backend";

// ─── Global ───────────────────────────────────────────────────────────────

pub const NBTHREAD: &str = "nbthread";
pub const MAXCONN: &str = "maxconn";
pub const HARD_STOP_AFTER: &str = "hard-stop-after";
pub const SSL_DEFAULT_BIND_CIPHERS: &str = "ssl-default-bind-ciphers";
pub const SSL_DEFAULT_BIND_OPTIONS: &str = "ssl-default-bind-options";
pub const TUNE_BUFSIZE: &str = "tune-bufsize";
pub const SYSLOG_SERVER: &str = "syslog-server";

// ─── Defaults ─────────────────────────────────────────────────────────────

pub const TIMEOUT_HTTP_REQUEST: &str = "timeout-http-request";
pub const TIMEOUT_CONNECT: &str = "timeout-connect";
pub const TIMEOUT_CLIENT: &str = "timeout-client";
pub const TIMEOUT_QUEUE: &str = "timeout-queue";
pub const TIMEOUT_SERVER: &str = "timeout-server";
pub const TIMEOUT_TUNNEL: &str = "timeout-tunnel";
pub const TIMEOUT_HTTP_KEEP_ALIVE: &str = "timeout-http-keep-alive";
pub const LOG_FORMAT: &str = "log-format";
pub const DONTLOGNULL: &str = "dontlognull";
pub const LOGASAP: &str = "logasap";

// ─── Backend ──────────────────────────────────────────────────────────────

pub const LOAD_BALANCE: &str = "load-balance";
pub const CHECK: &str = "check";
pub const CHECK_INTERVAL: &str = "check-interval";
pub const CHECK_HTTP: &str = "check-http";
pub const TIMEOUT_CHECK: &str = "timeout-check";
pub const COOKIE_PERSISTENCE: &str = "cookie-persistence";
pub const FORWARDED_FOR: &str = "forwarded-for";

// ─── Config snippets ──────────────────────────────────────────────────────

pub const GLOBAL_CONFIG_SNIPPET: &str = "global-config-snippet";
pub const FRONTEND_CONFIG_SNIPPET: &str = "frontend-config-snippet";
pub const BACKEND_CONFIG_SNIPPET: &str = "backend-config-snippet";

// ─── Default backend / certificate ────────────────────────────────────────

/// `namespace/name` of the Service used for unmatched traffic.
pub const DEFAULT_BACKEND_SERVICE: &str = "default-backend-service";

/// Local port served by the synthesized default backend.
pub const DEFAULT_BACKEND_PORT: &str = "default-backend-port";

/// `namespace/name` of the Secret holding the fallback TLS certificate.
pub const SSL_CERTIFICATE: &str = "ssl-certificate";
