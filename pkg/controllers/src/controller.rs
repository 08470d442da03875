use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use pkg_constants::state::{DEFAULT_PASS_TIMEOUT_SECS, DEFAULT_SYNC_INTERVAL_SECS};
use pkg_lbapi::LoadBalancerApi;
use pkg_state::client::StateStore;
use pkg_state::lease::PassLease;
use pkg_state::snapshot::ClusterSnapshot;

use crate::endpoints::{EndpointSync, EndpointSyncer};
use crate::locks::NameLocks;
use crate::pass::{ControllerSettings, PassReport, run_pass};

/// Controller that reconciles the registry into load-balancer configuration.
/// Every pass works on a fresh snapshot; reports that changed something are
/// sent to the caller, which decides between reload and restart.
pub struct LoadBalancerController {
    store: StateStore,
    lb: Arc<dyn LoadBalancerApi>,
    endpoints: Arc<dyn EndpointSync>,
    settings: ControllerSettings,
    locks: NameLocks,
    lease: Option<PassLease>,
    check_interval: Duration,
    pass_timeout: Duration,
}

impl LoadBalancerController {
    pub fn new(
        store: StateStore,
        lb: Arc<dyn LoadBalancerApi>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            store,
            lb,
            endpoints: Arc::new(EndpointSyncer::new()),
            settings,
            locks: NameLocks::new(),
            lease: None,
            check_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            pass_timeout: Duration::from_secs(DEFAULT_PASS_TIMEOUT_SECS),
        }
    }

    pub fn with_intervals(mut self, check_interval: Duration, pass_timeout: Duration) -> Self {
        self.check_interval = check_interval;
        self.pass_timeout = pass_timeout;
        self
    }

    pub fn with_endpoint_sync(mut self, endpoints: Arc<dyn EndpointSync>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Only run passes while holding the shared pass lease.
    pub fn with_lease(mut self, lease: PassLease) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn start(self, reports: mpsc::Sender<PassReport>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "LoadBalancerController started (interval={}s, timeout={}s)",
                self.check_interval.as_secs(),
                self.pass_timeout.as_secs()
            );
            let mut interval = tokio::time::interval(self.check_interval);
            loop {
                interval.tick().await;
                match self.reconcile().await {
                    Ok(Some(report)) if report.changed => {
                        if reports.send(report).await.is_err() {
                            info!("Report receiver closed, stopping LoadBalancerController");
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!("LoadBalancerController reconcile error: {}", e),
                }
            }
        })
    }

    /// Run a single pass. `None` when another instance holds the pass lease.
    pub async fn reconcile(&self) -> anyhow::Result<Option<PassReport>> {
        if let Some(lease) = &self.lease {
            if !lease.try_acquire().await? {
                debug!("Pass lease held elsewhere, skipping pass");
                return Ok(None);
            }
        }

        let snapshot = ClusterSnapshot::load(&self.store).await?;
        let pass = run_pass(
            &snapshot,
            self.lb.as_ref(),
            self.endpoints.as_ref(),
            &self.settings,
            &self.locks,
        );
        let report = self.drive(pass).await?;

        if report.changed {
            info!(
                "Pass applied {} changes, action={}",
                report.changes.len(),
                report.action
            );
        }
        Ok(Some(report))
    }

    /// Poll the pass to completion under the pass timeout, renewing the
    /// lease meanwhile. Losing the lease drops the pass where it stands.
    async fn drive(&self, pass: impl Future<Output = PassReport>) -> anyhow::Result<PassReport> {
        tokio::pin!(pass);
        let deadline = tokio::time::sleep(self.pass_timeout);
        tokio::pin!(deadline);
        let period = self
            .lease
            .as_ref()
            .map_or(Duration::from_secs(1), PassLease::renew_interval);
        let mut renew = tokio::time::interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                report = &mut pass => return Ok(report),
                _ = &mut deadline => anyhow::bail!(
                    "pass timed out after {}s, remaining entities converge next pass",
                    self.pass_timeout.as_secs()
                ),
                _ = renew.tick(), if self.lease.is_some() => {
                    if let Some(lease) = &self.lease {
                        if !lease.try_acquire().await? {
                            anyhow::bail!("pass lease lost mid-pass, abandoning pass");
                        }
                    }
                }
            }
        }
    }
}
