//! Model resolution: custom resource, then annotations over built-in
//! defaults. Sources are tried in [`PRECEDENCE`] order and the first one
//! that yields a model wins.

use serde::Serialize;
use tracing::debug;

use pkg_constants::annotations::{CR_BACKEND, CR_DEFAULTS, CR_GLOBAL};
use pkg_constants::lb::DEFAULT_DH_PARAM;
use pkg_state::snapshot::ClusterState;
use pkg_types::backend::Backend;
use pkg_types::custom_resource::{CustomResource, GlobalSpec, ResourceKind};
use pkg_types::defaults::Defaults;
use pkg_types::global::{Global, TuneOptions};
use pkg_types::validate::parse_k8s_path;

use crate::annotations::{
    AnnotationSources, BACKEND_SETTERS, DEFAULTS_SETTERS, GLOBAL_SETTERS, LOG_TARGET_SETTERS,
    apply_setters,
};
use crate::diagnostics::Diagnostics;
use crate::error::ResolutionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    CustomResource,
    /// Annotation setters applied over the built-in defaults.
    Annotations,
}

pub const PRECEDENCE: [Source; 2] = [Source::CustomResource, Source::Annotations];

/// A model kind the resolver can produce.
pub trait Resolvable: Clone + Sized {
    const RESOURCE: ResourceKind;
    /// Annotation naming the custom resource for a scope.
    const CR_KEY: &'static str;

    fn builtin() -> Self;
    /// Built-in defaults with every annotation setter applied.
    fn from_annotations(
        sources: &AnnotationSources<'_>,
        scope: &str,
        diag: &Diagnostics,
    ) -> Self;
    fn from_resource(cr: &CustomResource) -> anyhow::Result<Self>;
}

/// Global and its log targets come from the same resource and are resolved
/// together, so a bad resource is decoded and reported once.
impl Resolvable for GlobalSpec {
    const RESOURCE: ResourceKind = ResourceKind::Global;
    const CR_KEY: &'static str = CR_GLOBAL;

    fn builtin() -> Self {
        GlobalSpec {
            config: Global {
                tune: Some(TuneOptions {
                    ssl_default_dh_param: Some(DEFAULT_DH_PARAM),
                    bufsize: None,
                }),
                ..Default::default()
            },
            log_targets: Vec::new(),
        }
    }

    fn from_annotations(
        sources: &AnnotationSources<'_>,
        scope: &str,
        diag: &Diagnostics,
    ) -> Self {
        let GlobalSpec {
            config,
            log_targets,
        } = Self::builtin();
        GlobalSpec {
            config: apply_setters(config, GLOBAL_SETTERS, sources, scope, diag),
            log_targets: apply_setters(log_targets, LOG_TARGET_SETTERS, sources, scope, diag),
        }
    }

    fn from_resource(cr: &CustomResource) -> anyhow::Result<Self> {
        cr.decode()
    }
}

impl Resolvable for Defaults {
    const RESOURCE: ResourceKind = ResourceKind::Defaults;
    const CR_KEY: &'static str = CR_DEFAULTS;

    fn builtin() -> Self {
        Defaults::default()
    }

    fn from_annotations(
        sources: &AnnotationSources<'_>,
        scope: &str,
        diag: &Diagnostics,
    ) -> Self {
        apply_setters(Self::builtin(), DEFAULTS_SETTERS, sources, scope, diag)
    }

    fn from_resource(cr: &CustomResource) -> anyhow::Result<Self> {
        cr.decode()
    }
}

impl Resolvable for Backend {
    const RESOURCE: ResourceKind = ResourceKind::Backend;
    const CR_KEY: &'static str = CR_BACKEND;

    fn builtin() -> Self {
        Backend::default()
    }

    fn from_annotations(
        sources: &AnnotationSources<'_>,
        scope: &str,
        diag: &Diagnostics,
    ) -> Self {
        apply_setters(Self::builtin(), BACKEND_SETTERS, sources, scope, diag)
    }

    fn from_resource(cr: &CustomResource) -> anyhow::Result<Self> {
        cr.decode()
    }
}

#[derive(Debug, Clone)]
pub struct Resolved<M> {
    pub model: M,
    pub source: Source,
}

impl<M> Resolved<M> {
    pub fn from_custom_resource(&self) -> bool {
        self.source == Source::CustomResource
    }
}

/// Resolve the model of kind `M` for `namespace`. Problems with any source
/// are recorded under `scope` and resolution falls through to the next one.
pub fn resolve<M: Resolvable>(
    cluster: &dyn ClusterState,
    namespace: &str,
    sources: &AnnotationSources<'_>,
    scope: &str,
    diag: &Diagnostics,
) -> Resolved<M> {
    for source in PRECEDENCE {
        let attempt = match source {
            Source::CustomResource => from_custom_resource::<M>(cluster, namespace, sources),
            Source::Annotations => Ok(Some(M::from_annotations(sources, scope, diag))),
        };
        match attempt {
            Ok(Some(model)) => {
                debug!("{}: resolved from {:?}", scope, source);
                return Resolved { model, source };
            }
            Ok(None) => {}
            Err(e) => diag.warn(scope, e),
        }
    }
    Resolved {
        model: M::builtin(),
        source: Source::Annotations,
    }
}

fn from_custom_resource<M: Resolvable>(
    cluster: &dyn ClusterState,
    namespace: &str,
    sources: &AnnotationSources<'_>,
) -> Result<Option<M>, ResolutionError> {
    let Some(value) = sources.get_non_empty(M::CR_KEY) else {
        return Ok(None);
    };
    let reference = |message: String| ResolutionError::Reference {
        key: M::CR_KEY,
        value: value.to_string(),
        message,
    };
    let (ns, name) = parse_k8s_path(value, namespace).map_err(|e| reference(e.to_string()))?;
    let cr = cluster
        .custom_resource(M::RESOURCE, &ns, &name)
        .ok_or_else(|| reference(format!("{} custom resource not found", M::RESOURCE)))?;
    M::from_resource(cr)
        .map(Some)
        .map_err(|e| ResolutionError::CustomResource(format!("{:#}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_state::snapshot::ClusterSnapshot;
    use pkg_types::Annotations;
    use pkg_types::backend::Mode;

    fn annotations(pairs: &[(&str, &str)]) -> Annotations {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn backend_cr(spec: serde_json::Value) -> CustomResource {
        CustomResource {
            kind: ResourceKind::Backend,
            namespace: "ns".into(),
            name: "tuned".into(),
            spec,
        }
    }

    #[test]
    fn builtin_defaults_without_sources() {
        let cluster = ClusterSnapshot::new();
        let diag = Diagnostics::new();
        let resolved: Resolved<GlobalSpec> =
            resolve(&cluster, "lb", &AnnotationSources::default(), "global", &diag);
        assert_eq!(resolved.source, Source::Annotations);
        assert!(resolved.model.log_targets.is_empty());
        assert_eq!(
            resolved.model.config.tune.unwrap().ssl_default_dh_param,
            Some(DEFAULT_DH_PARAM)
        );
    }

    #[test]
    fn custom_resource_beats_annotations() {
        let cluster = ClusterSnapshot::new().with_custom_resource(backend_cr(
            serde_json::json!({"balance": {"algorithm": "source"}}),
        ));
        let svc = annotations(&[("cr-backend", "tuned"), ("load-balance", "leastconn")]);
        let diag = Diagnostics::new();

        let resolved: Resolved<Backend> = resolve(
            &cluster,
            "ns",
            &AnnotationSources::new(vec![&svc]),
            "backend ns_app_http",
            &diag,
        );
        assert!(resolved.from_custom_resource());
        assert_eq!(resolved.model.balance.unwrap().algorithm, "source");
        assert!(diag.is_empty());
    }

    #[test]
    fn malformed_custom_resource_falls_back() {
        let cluster = ClusterSnapshot::new()
            .with_custom_resource(backend_cr(serde_json::json!({"mode": "udp"})));
        let svc = annotations(&[("cr-backend", "ns/tuned"), ("load-balance", "leastconn")]);
        let diag = Diagnostics::new();

        let resolved: Resolved<Backend> = resolve(
            &cluster,
            "ns",
            &AnnotationSources::new(vec![&svc]),
            "backend ns_app_http",
            &diag,
        );
        assert_eq!(resolved.source, Source::Annotations);
        assert_eq!(resolved.model.balance.unwrap().algorithm, "leastconn");
        assert_eq!(resolved.model.mode, Mode::Http);
        assert_eq!(diag.entries().len(), 1);
    }

    #[test]
    fn missing_custom_resource_is_reported() {
        let cluster = ClusterSnapshot::new();
        let cm = annotations(&[("cr-defaults", "gone"), ("timeout-connect", "5s")]);
        let diag = Diagnostics::new();

        let resolved: Resolved<Defaults> =
            resolve(&cluster, "lb", &AnnotationSources::new(vec![&cm]), "defaults", &diag);
        assert_eq!(resolved.model.connect_timeout, Some(5_000));
        assert!(diag.entries()[0].message.contains("not found"));
    }

    #[test]
    fn global_resource_carries_log_targets() {
        let cluster = ClusterSnapshot::new().with_custom_resource(CustomResource {
            kind: ResourceKind::Global,
            namespace: "lb".into(),
            name: "main".into(),
            spec: serde_json::json!({
                "config": {"maxconn": 5000},
                "log_targets": [{"address": "10.0.0.9:514"}]
            }),
        });
        let cm = annotations(&[("cr-global", "main"), ("syslog-server", "address:stdout")]);
        let sources = AnnotationSources::new(vec![&cm]);
        let diag = Diagnostics::new();

        let global: Resolved<GlobalSpec> = resolve(&cluster, "lb", &sources, "global", &diag);
        assert_eq!(global.model.config.maxconn, Some(5000));
        assert_eq!(global.model.log_targets[0].address, "10.0.0.9:514");
    }

    #[test]
    fn malformed_global_resource_is_reported_once() {
        let cluster = ClusterSnapshot::new().with_custom_resource(CustomResource {
            kind: ResourceKind::Global,
            namespace: "lb".into(),
            name: "main".into(),
            spec: serde_json::json!({"config": {"maxconn": "lots"}}),
        });
        let cm = annotations(&[("cr-global", "main"), ("maxconn", "2000")]);
        let diag = Diagnostics::new();

        let global: Resolved<GlobalSpec> =
            resolve(&cluster, "lb", &AnnotationSources::new(vec![&cm]), "global", &diag);
        assert_eq!(global.source, Source::Annotations);
        assert_eq!(global.model.config.maxconn, Some(2000));
        assert_eq!(diag.entries().len(), 1);
    }
}
