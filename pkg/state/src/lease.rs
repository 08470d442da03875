use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::client::StateStore;

use pkg_constants::state::{PASS_LEASE_KEY, PASS_LEASE_RENEW_DIVISOR, PASS_LEASE_TTL_SECS};

/// Record of which controller instance may currently write load-balancer config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub holder_id: String,
    pub acquired_at: DateTime<Utc>,
    pub renew_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl Lease {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let expiry = self.renew_at + chrono::Duration::seconds(self.ttl_seconds as i64);
        now > expiry
    }
}

/// Single-writer guard for reconciliation passes.
///
/// Every pass calls [`PassLease::try_acquire`] first and is skipped when
/// another instance holds an unexpired lease. A running pass renews the
/// lease every [`PassLease::renew_interval`] so it cannot lapse mid-pass.
pub struct PassLease {
    store: StateStore,
    holder_id: String,
    ttl: Duration,
}

impl PassLease {
    pub fn new(store: StateStore, holder_id: String) -> Self {
        Self {
            store,
            holder_id,
            ttl: Duration::from_secs(PASS_LEASE_TTL_SECS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn renew_interval(&self) -> Duration {
        (self.ttl / PASS_LEASE_RENEW_DIVISOR).max(Duration::from_millis(100))
    }

    /// Acquire or renew the lease. Returns true if this instance holds it.
    pub async fn try_acquire(&self) -> anyhow::Result<bool> {
        let now = Utc::now();
        let current: Option<Lease> = self.store.get_json(PASS_LEASE_KEY).await?;

        let next = match current {
            Some(lease) if lease.holder_id == self.holder_id => Lease {
                renew_at: now,
                ..lease
            },
            Some(lease) if !lease.is_expired_at(now) => return Ok(false),
            Some(lease) => {
                info!(
                    "Pass lease expired (held by {}), acquiring for {}",
                    lease.holder_id, self.holder_id
                );
                self.fresh(now)
            }
            None => {
                info!("No pass lease found, acquiring for {}", self.holder_id);
                self.fresh(now)
            }
        };
        self.store.put_json(PASS_LEASE_KEY, &next).await?;
        Ok(true)
    }

    fn fresh(&self, now: DateTime<Utc>) -> Lease {
        Lease {
            holder_id: self.holder_id.clone(),
            acquired_at: now,
            renew_at: now,
            ttl_seconds: self.ttl.as_secs().max(1),
        }
    }
}
