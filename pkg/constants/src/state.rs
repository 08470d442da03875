//! State store key prefixes and controller timing.

/// Cluster objects live under this prefix, `/registry/<kind>/<ns>/<name>`.
pub const REGISTRY_PREFIX: &str = "/registry/";

/// Load-balancer configuration persisted by the stored API.
pub const LB_PREFIX: &str = "/lb/";

/// Default interval between reconciliation passes, in seconds.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 5;

/// Default upper bound for a single pass, in seconds.
pub const DEFAULT_PASS_TIMEOUT_SECS: u64 = 30;

/// Default timeout for reload/restart hooks, in seconds.
pub const DEFAULT_HOOK_TIMEOUT_SECS: u64 = 30;

/// Key of the lease that grants the right to run reconciliation passes.
pub const PASS_LEASE_KEY: &str = "/lb/leases/reconciler";

/// How long a pass lease stays valid without renewal, in seconds.
pub const PASS_LEASE_TTL_SECS: u64 = 15;

/// A held pass lease is renewed every `TTL / divisor` while a pass runs.
pub const PASS_LEASE_RENEW_DIVISOR: u32 = 3;
