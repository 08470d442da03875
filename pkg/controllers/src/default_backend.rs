//! Default backend and default certificate.
//!
//! The default backend is either a Service (`default-backend-service`) or a
//! backend synthesized on a local port (`default-backend-port`). The Service
//! wins when both are configured; with neither, nothing is installed.

use tracing::{debug, info};

use pkg_constants::annotations::{DEFAULT_BACKEND_PORT, DEFAULT_BACKEND_SERVICE, SSL_CERTIFICATE};
use pkg_lbapi::CertSlot;
use pkg_types::backend::Mode;
use pkg_types::ingress::{IngressPath, PortSelector};
use pkg_types::validate::parse_k8s_path;

use crate::backend::{BackendBinding, sync_servers};
use crate::classifier::{EntityKind, Outcome, classify};
use crate::error::{ResolutionError, SyncError};
use crate::pass::PassContext;

const SCOPE: &str = "default-backend";
const CERT_SCOPE: &str = "default-certificate";

/// Pick the configured default backend, if any, and wire it into the
/// default-backend front ends.
pub async fn handle_default_backend(ctx: &PassContext<'_>) -> Outcome {
    let sources = ctx.global_sources();
    let service = sources.get_non_empty(DEFAULT_BACKEND_SERVICE);
    let port = sources.get_non_empty(DEFAULT_BACKEND_PORT);

    let binding = match (service, port) {
        (Some(service), port) => {
            if port.is_some() {
                ctx.diagnostics.warn(
                    SCOPE,
                    format!(
                        "both {} and {} are set, using service {}",
                        DEFAULT_BACKEND_SERVICE, DEFAULT_BACKEND_PORT, service
                    ),
                );
            }
            let (ns, name) = match parse_k8s_path(service, &ctx.settings.pod_namespace) {
                Ok(reference) => reference,
                Err(e) => {
                    ctx.diagnostics.error(
                        SCOPE,
                        ResolutionError::Reference {
                            key: DEFAULT_BACKEND_SERVICE,
                            value: service.to_string(),
                            message: e.to_string(),
                        },
                    );
                    return Outcome::default();
                }
            };
            let path = IngressPath::default_backend(&ns, &name, None);
            match BackendBinding::new(ctx.cluster, path, Mode::Http) {
                Ok(binding) => binding,
                Err(e) => {
                    ctx.diagnostics.error(SCOPE, e);
                    return Outcome::default();
                }
            }
        }
        (None, Some(port)) => match port.parse::<u16>() {
            Ok(port) if port > 0 => BackendBinding::local(port, Mode::Http),
            _ => {
                ctx.diagnostics.error(
                    SCOPE,
                    ResolutionError::Annotation {
                        key: DEFAULT_BACKEND_PORT,
                        message: format!("invalid port '{}'", port),
                    },
                );
                return Outcome::default();
            }
        },
        (None, None) => {
            debug!("No default backend configured");
            return Outcome::default();
        }
    };

    let frontends = ctx.settings.default_backend_frontends();
    match set_default_backend(ctx, binding, &frontends).await {
        Ok(outcome) => outcome,
        Err(e) => {
            ctx.diagnostics.error(SCOPE, e);
            Outcome::default()
        }
    }
}

/// Bind `binding` as the default backend of every front end in `frontends`.
///
/// The first front end decides the backend mode and must be readable before
/// anything is written. A Service without an explicit port is bound on its
/// first declared port.
pub async fn set_default_backend<'a>(
    ctx: &PassContext<'a>,
    mut binding: BackendBinding<'a>,
    frontends: &[String],
) -> Result<Outcome, SyncError> {
    if !binding.path.is_default_backend {
        return Err(SyncError::precondition(format!(
            "{}/{} is not marked as default backend",
            binding.path.svc_namespace, binding.path.svc_name
        )));
    }
    let Some(first) = frontends.first() else {
        return Err(SyncError::precondition(
            "no front end to attach the default backend to",
        ));
    };
    let first_frontend = ctx.lb.frontend_get(first).await?;
    binding.set_mode(first_frontend.mode);

    if binding.path.port.is_none() {
        if let Some(service) = binding.service() {
            let port = service.ports().first().ok_or_else(|| {
                SyncError::precondition(format!(
                    "service {}/{} declares no ports",
                    service.namespace, service.name
                ))
            })?;
            binding.path.port = Some(PortSelector::Number(port.port));
        }
    }

    let mut outcome = binding.handle_backend(ctx).await?;
    let backend = binding.backend_name()?;

    for name in frontends {
        let live = if name == first {
            first_frontend.clone()
        } else {
            match ctx.lb.frontend_get(name).await {
                Ok(fe) => fe,
                Err(e) => {
                    ctx.diagnostics.error(&format!("frontend {}", name), e);
                    continue;
                }
            }
        };
        let mut desired = live.clone();
        desired.default_backend = Some(backend.clone());
        let c = classify(EntityKind::Frontend, &desired, &live);
        if !c.changed {
            continue;
        }
        match ctx.lb.frontend_edit(&desired).await {
            Ok(()) => {
                info!("Frontend {}: default backend set to {}", name, backend);
                outcome.record(EntityKind::Frontend, name, c.fields);
            }
            Err(e) => ctx.diagnostics.error(&format!("frontend {}", name), e),
        }
    }

    outcome.merge(sync_servers(ctx, &mut binding).await);
    Ok(outcome)
}

/// Install the Secret named by `ssl-certificate` into the default
/// certificate slot when its bundle differs from the installed one.
/// Any failure leaves the installed certificate alone.
pub async fn handle_default_certificate(ctx: &PassContext<'_>) -> Outcome {
    let mut outcome = Outcome::default();
    let Some(value) = ctx.global_sources().get_non_empty(SSL_CERTIFICATE) else {
        return outcome;
    };
    let (ns, name) = match parse_k8s_path(value, &ctx.settings.pod_namespace) {
        Ok(reference) => reference,
        Err(e) => {
            ctx.diagnostics.warn(CERT_SCOPE, e);
            return outcome;
        }
    };
    let Some(secret) = ctx.cluster.secret(&ns, &name) else {
        ctx.diagnostics
            .warn(CERT_SCOPE, format!("secret {}/{} not found", ns, name));
        return outcome;
    };
    let bundle = match secret.certificate_bundle() {
        Ok(bundle) => bundle,
        Err(e) => {
            ctx.diagnostics.warn(CERT_SCOPE, format!("{:#}", e));
            return outcome;
        }
    };

    let slot = CertSlot::DefaultCert;
    match ctx.lb.certificate_get(slot).await {
        Ok(Some(live)) if live == bundle => return outcome,
        Ok(_) => {}
        Err(e) => {
            ctx.diagnostics.error(CERT_SCOPE, e);
            return outcome;
        }
    }
    match ctx.lb.install_certificate(&bundle, slot).await {
        Ok(()) => {
            info!("Default certificate installed from {}/{}", ns, name);
            outcome.record(EntityKind::Certificate, &slot.to_string(), vec!["pem"]);
        }
        Err(e) => ctx.diagnostics.error(CERT_SCOPE, e),
    }
    outcome
}
