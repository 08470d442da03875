//! Backend identity and binding: from a Service port to a stable backend
//! name, and from a resolved Backend model to the live configuration.

use futures_util::future::join_all;
use std::collections::HashSet;
use tracing::{debug, info};

use pkg_constants::annotations::BACKEND_CONFIG_SNIPPET;
use pkg_constants::lb::{DEFAULT_LOCAL_BACKEND, DNS_INIT_ADDR, DYNAMIC_COOKIE_KEY};
use pkg_lbapi::SnippetScope;
use pkg_state::snapshot::ClusterState;
use pkg_types::backend::{Backend, DefaultServer, Mode};
use pkg_types::ingress::{IngressPath, PortSelector};
use pkg_types::service::{Service, ServicePort};

use crate::annotations::AnnotationSources;
use crate::classifier::{EntityKind, Outcome, classify};
use crate::error::SyncError;
use crate::pass::PassContext;
use crate::resolver::resolve;
use crate::snippets::sync_snippet;

/// Derive the backend name for `path` on `service`.
///
/// The first declared port matching the selector wins and is stored on the
/// path as its resolved port. The name is `{namespace}_{service}_{port}`
/// where `port` is the port name, or its number when unnamed.
pub fn get_backend_name(path: &mut IngressPath, service: &Service) -> Result<String, SyncError> {
    let not_found = |selector: String| SyncError::PortNotFound {
        service: format!("{}/{}", service.namespace, service.name),
        selector,
    };
    let selector = path
        .port
        .as_ref()
        .ok_or_else(|| not_found("<unset>".to_string()))?;
    let port = service
        .ports()
        .iter()
        .find(|p| selector.matches(p))
        .ok_or_else(|| not_found(selector.to_string()))?;

    let name = format!(
        "{}_{}_{}",
        service.namespace,
        service.name,
        port.identifier()
    );
    path.resolved_port = Some(port.clone());
    Ok(name)
}

/// What a backend routes to.
#[derive(Debug, Clone, Copy)]
pub enum BindingTarget<'a> {
    Service(&'a Service),
    /// Synthesized backend served by the balancer host itself.
    Local { port: u16 },
}

/// One desired backend for the current pass.
#[derive(Debug, Clone)]
pub struct BackendBinding<'a> {
    pub path: IngressPath,
    pub target: BindingTarget<'a>,
    pub mode: Mode,
    /// Set once the backend had to be created in this pass.
    pub new_backend: bool,
    name: Option<String>,
}

impl<'a> BackendBinding<'a> {
    pub fn new(
        cluster: &'a dyn ClusterState,
        path: IngressPath,
        mode: Mode,
    ) -> Result<Self, SyncError> {
        let service = cluster
            .service(&path.svc_namespace, &path.svc_name)
            .ok_or_else(|| SyncError::ServiceNotFound {
                namespace: path.svc_namespace.clone(),
                name: path.svc_name.clone(),
            })?;
        Ok(Self {
            path,
            target: BindingTarget::Service(service),
            mode,
            new_backend: false,
            name: None,
        })
    }

    /// Default backend served on a local port, with no Service behind it.
    pub fn local(port: u16, mode: Mode) -> Self {
        let mut path = IngressPath::default_backend(
            "",
            DEFAULT_LOCAL_BACKEND,
            Some(PortSelector::Number(port)),
        );
        path.resolved_port = Some(ServicePort {
            name: String::new(),
            port,
            target_port: port,
        });
        Self {
            path,
            target: BindingTarget::Local { port },
            mode,
            new_backend: false,
            name: Some(DEFAULT_LOCAL_BACKEND.to_string()),
        }
    }

    pub fn service(&self) -> Option<&'a Service> {
        match self.target {
            BindingTarget::Service(svc) => Some(svc),
            BindingTarget::Local { .. } => None,
        }
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn backend_name(&mut self) -> Result<String, SyncError> {
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }
        let BindingTarget::Service(service) = self.target else {
            return Ok(DEFAULT_LOCAL_BACKEND.to_string());
        };
        let name = get_backend_name(&mut self.path, service)?;
        self.name = Some(name.clone());
        Ok(name)
    }

    fn sources(&self, ctx: &PassContext<'a>) -> AnnotationSources<'a> {
        match self.target {
            BindingTarget::Service(svc) => ctx.service_sources(svc),
            BindingTarget::Local { .. } => ctx.global_sources(),
        }
    }

    /// Fields the binding owns whatever the model source said.
    fn finalize(&self, mut backend: Backend, name: &str) -> Backend {
        backend.id = None;
        backend.name = name.to_string();
        backend.mode = self.mode;
        if self.service().is_some_and(|svc| svc.dns().is_some()) {
            let server = backend
                .default_server
                .get_or_insert_with(DefaultServer::default);
            if server.init_addr.is_none() {
                server.init_addr = Some(DNS_INIT_ADDR.to_string());
            }
        }
        let dynamic_cookie = backend.cookie.as_ref().is_some_and(|c| c.dynamic);
        if dynamic_cookie && backend.dynamic_cookie_key.is_none() {
            backend.dynamic_cookie_key = Some(DYNAMIC_COOKIE_KEY.to_string());
        }
        backend
    }

    /// Resolve the Backend model and create or update the live backend,
    /// then attach its config snippet.
    pub async fn handle_backend(&mut self, ctx: &PassContext<'a>) -> Result<Outcome, SyncError> {
        let name = self.backend_name()?;
        let scope = format!("backend {}", name);
        let sources = self.sources(ctx);
        let namespace = match self.target {
            BindingTarget::Service(svc) => svc.namespace.as_str(),
            BindingTarget::Local { .. } => ctx.settings.pod_namespace.as_str(),
        };
        let resolved =
            resolve::<Backend>(ctx.cluster, namespace, &sources, &scope, ctx.diagnostics);
        let desired = self.finalize(resolved.model, &name);

        let mut outcome = Outcome::default();
        {
            let _guard = ctx.locks.lock(&name).await;
            match ctx.lb.backend_get(&name).await {
                Ok(live) => {
                    if live.mode != desired.mode {
                        return Err(SyncError::ModeConflict {
                            name,
                            live: live.mode,
                            desired: desired.mode,
                        });
                    }
                    let c = classify(EntityKind::Backend, &desired, &live);
                    if c.changed {
                        ctx.lb.backend_edit(&desired).await?;
                        info!("Backend {} updated ({})", name, c.fields.join(", "));
                        outcome.record(EntityKind::Backend, &name, c.fields);
                    }
                }
                Err(e) if e.is_not_found() => {
                    ctx.lb.backend_create(&desired).await?;
                    self.new_backend = true;
                    info!("Backend {} created (mode={})", name, desired.mode);
                    outcome.record(EntityKind::Backend, &name, Vec::new());
                }
                Err(e) => return Err(e.into()),
            }
        }

        outcome.merge(
            sync_snippet(
                ctx.lb,
                SnippetScope::Backend(name.clone()),
                sources.get(BACKEND_CONFIG_SNIPPET),
                EntityKind::Snippet,
                ctx.diagnostics,
            )
            .await,
        );
        Ok(outcome)
    }
}

/// Server-pool sync for a binding whose backend exists.
pub(crate) async fn sync_servers<'a>(
    ctx: &PassContext<'a>,
    binding: &mut BackendBinding<'a>,
) -> Outcome {
    let mut outcome = Outcome::default();
    let name = match binding.backend_name() {
        Ok(name) => name,
        Err(e) => {
            ctx.diagnostics.error("servers", e);
            return outcome;
        }
    };
    match ctx
        .endpoints
        .sync_servers(ctx.lb, ctx.cluster, &name, binding)
        .await
    {
        Ok(true) => outcome.record(EntityKind::Servers, &name, vec!["servers"]),
        Ok(false) => {}
        Err(e) => ctx.diagnostics.error(&format!("servers {}", name), e),
    }
    outcome
}

async fn sync_binding<'a>(
    ctx: &PassContext<'a>,
    binding: &mut BackendBinding<'a>,
) -> Result<Outcome, SyncError> {
    let mut outcome = binding.handle_backend(ctx).await?;
    outcome.merge(sync_servers(ctx, binding).await);
    Ok(outcome)
}

/// Sync a backend for every distinct Service port referenced by an Ingress.
/// Bindings run concurrently; a failing binding only loses itself.
pub async fn sync_ingress_backends(ctx: &PassContext<'_>) -> Outcome {
    let mut seen = HashSet::new();
    let mut bindings = Vec::new();
    for ingress in ctx.cluster.ingresses() {
        let scope = format!("ingress {}/{}", ingress.namespace, ingress.name);
        for path in ingress.paths() {
            let mut binding = match BackendBinding::new(ctx.cluster, path, Mode::Http) {
                Ok(b) => b,
                Err(e) => {
                    ctx.diagnostics.error(&scope, e);
                    continue;
                }
            };
            match binding.backend_name() {
                Ok(name) if seen.insert(name.clone()) => bindings.push(binding),
                Ok(name) => debug!("{}: backend {} already bound", scope, name),
                Err(e) => ctx.diagnostics.error(&scope, e),
            }
        }
    }

    let results = join_all(bindings.into_iter().map(|mut binding| async move {
        let result = sync_binding(ctx, &mut binding).await;
        (binding, result)
    }))
    .await;

    let mut outcome = Outcome::default();
    for (mut binding, result) in results {
        match result {
            Ok(o) => outcome.merge(o),
            Err(e) => {
                let name = binding.backend_name().unwrap_or_default();
                ctx.diagnostics.error(&format!("backend {}", name), e);
            }
        }
    }
    outcome
}
