//! One reconciliation pass: global, defaults, ingress backends, default
//! certificate and default backend, in that order.

use serde::Serialize;
use tracing::{debug, warn};

use pkg_constants::lb::{FRONTEND_HTTP, FRONTEND_HTTPS};
use pkg_lbapi::LoadBalancerApi;
use pkg_state::snapshot::ClusterState;
use pkg_types::Annotations;
use pkg_types::config::EnvironmentConfig;
use pkg_types::service::Service;

use crate::annotations::AnnotationSources;
use crate::backend::sync_ingress_backends;
use crate::classifier::{Action, Change, Outcome};
use crate::default_backend::{handle_default_backend, handle_default_certificate};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::endpoints::EndpointSync;
use crate::global::{sync_defaults, sync_global};
use crate::locks::NameLocks;

static NO_ANNOTATIONS: Annotations = Annotations::new();

/// Static controller settings shared by every pass.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Namespace of the controller; scope of Global/Defaults resources.
    pub pod_namespace: String,
    /// Main ConfigMap as `(namespace, name)`.
    pub configmap: Option<(String, String)>,
    pub frontend_http: String,
    pub frontend_https: String,
    /// Lowest-precedence annotation source.
    pub cli_annotations: Annotations,
    pub environment: EnvironmentConfig,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            pod_namespace: "default".to_string(),
            configmap: None,
            frontend_http: FRONTEND_HTTP.to_string(),
            frontend_https: FRONTEND_HTTPS.to_string(),
            cli_annotations: Annotations::new(),
            environment: EnvironmentConfig::default(),
        }
    }
}

impl ControllerSettings {
    /// Front ends the default backend is wired into; the first one decides its mode.
    pub fn default_backend_frontends(&self) -> Vec<String> {
        vec![self.frontend_http.clone(), self.frontend_https.clone()]
    }
}

/// Everything a component needs during one pass. Cluster state is read-only.
pub struct PassContext<'a> {
    pub cluster: &'a dyn ClusterState,
    pub lb: &'a dyn LoadBalancerApi,
    pub endpoints: &'a dyn EndpointSync,
    pub settings: &'a ControllerSettings,
    pub diagnostics: &'a Diagnostics,
    pub locks: &'a NameLocks,
    configmap: &'a Annotations,
}

impl<'a> PassContext<'a> {
    pub fn new(
        cluster: &'a dyn ClusterState,
        lb: &'a dyn LoadBalancerApi,
        endpoints: &'a dyn EndpointSync,
        settings: &'a ControllerSettings,
        diagnostics: &'a Diagnostics,
        locks: &'a NameLocks,
    ) -> Self {
        let configmap = match &settings.configmap {
            Some((ns, name)) => match cluster.config_map(ns, name) {
                Some(cm) => &cm.data,
                None => {
                    diagnostics.warn("configmap", format!("{}/{} not found", ns, name));
                    &NO_ANNOTATIONS
                }
            },
            None => &NO_ANNOTATIONS,
        };
        Self {
            cluster,
            lb,
            endpoints,
            settings,
            diagnostics,
            locks,
            configmap,
        }
    }

    /// ConfigMap, then CLI-level annotations.
    pub fn global_sources(&self) -> AnnotationSources<'a> {
        AnnotationSources::new(vec![self.configmap, &self.settings.cli_annotations])
    }

    /// The Service's own annotations ahead of the global sources.
    pub fn service_sources(&self, service: &'a Service) -> AnnotationSources<'a> {
        AnnotationSources::new(vec![
            &service.annotations,
            self.configmap,
            &self.settings.cli_annotations,
        ])
    }
}

/// Aggregated result of a pass, handed to the surrounding controller.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub changed: bool,
    pub action: Action,
    pub changes: Vec<Change>,
    pub diagnostics: Vec<Diagnostic>,
}

pub async fn run_pass(
    cluster: &dyn ClusterState,
    lb: &dyn LoadBalancerApi,
    endpoints: &dyn EndpointSync,
    settings: &ControllerSettings,
    locks: &NameLocks,
) -> PassReport {
    let diagnostics = Diagnostics::new();
    let outcome = {
        let ctx = PassContext::new(cluster, lb, endpoints, settings, &diagnostics, locks);
        let mut outcome = Outcome::default();
        outcome.merge(sync_global(&ctx).await);
        outcome.merge(sync_defaults(&ctx).await);
        outcome.merge(sync_ingress_backends(&ctx).await);
        outcome.merge(handle_default_certificate(&ctx).await);
        outcome.merge(handle_default_backend(&ctx).await);
        outcome
    };
    debug!(
        "Pass finished: action={} changes={}",
        outcome.action,
        outcome.changes.len()
    );
    if diagnostics.has_errors() {
        warn!("Pass left some entities unconverged, they are retried next pass");
    }
    PassReport {
        changed: outcome.changed(),
        action: outcome.action,
        changes: outcome.changes,
        diagnostics: diagnostics.into_entries(),
    }
}
