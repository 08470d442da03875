use base64::Engine;
use std::collections::BTreeMap;

use pkg_controllers::backend::BackendBinding;
use pkg_controllers::classifier::Action;
use pkg_controllers::default_backend::set_default_backend;
use pkg_controllers::diagnostics::Diagnostics;
use pkg_controllers::endpoints::EndpointSyncer;
use pkg_controllers::error::SyncError;
use pkg_controllers::locks::NameLocks;
use pkg_controllers::pass::PassContext;
use pkg_controllers::{ControllerSettings, PassReport, run_pass};
use pkg_lbapi::{CertSlot, LoadBalancerApi, MemoryLoadBalancer};
use pkg_state::snapshot::ClusterSnapshot;
use pkg_types::backend::Mode;
use pkg_types::configmap::ConfigMap;
use pkg_types::custom_resource::{CustomResource, ResourceKind};
use pkg_types::frontend::Frontend;
use pkg_types::ingress::{
    HTTPIngressPath, Ingress, IngressBackend, IngressHTTP, IngressPath, IngressRule, IngressSpec,
    PathType, PortSelector,
};
use pkg_types::secret::Secret;
use pkg_types::service::{Service, ServicePort};

fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn app_service(service_annotations: &[(&str, &str)]) -> Service {
    let mut svc = Service {
        name: "app".into(),
        namespace: "ns".into(),
        annotations: annotations(service_annotations),
        ..Default::default()
    };
    svc.spec.ports = vec![
        ServicePort {
            name: "http".into(),
            port: 8080,
            target_port: 80,
        },
        ServicePort {
            name: "metrics".into(),
            port: 9090,
            target_port: 9090,
        },
    ];
    svc
}

fn ingress_to(service: &str, port: PortSelector) -> Ingress {
    Ingress {
        name: "web".into(),
        namespace: "ns".into(),
        spec: IngressSpec {
            rules: vec![IngressRule {
                host: "example.com".into(),
                http: IngressHTTP {
                    paths: vec![HTTPIngressPath {
                        path: "/".into(),
                        path_type: PathType::Prefix,
                        backend: IngressBackend {
                            service_name: service.into(),
                            service_port: Some(port),
                        },
                    }],
                },
            }],
        },
    }
}

fn configmap(pairs: &[(&str, &str)]) -> ConfigMap {
    ConfigMap {
        name: "lb-config".into(),
        namespace: "lb".into(),
        data: annotations(pairs),
    }
}

fn settings() -> ControllerSettings {
    ControllerSettings {
        pod_namespace: "lb".into(),
        configmap: Some(("lb".into(), "lb-config".into())),
        ..Default::default()
    }
}

async fn pass(cluster: &ClusterSnapshot, lb: &MemoryLoadBalancer) -> PassReport {
    run_pass(
        cluster,
        lb,
        &EndpointSyncer::new(),
        &settings(),
        &NameLocks::new(),
    )
    .await
}

/// Run once to settle built-in defaults, then forget the writes.
async fn settled(cluster: &ClusterSnapshot, lb: &MemoryLoadBalancer) {
    pass(cluster, lb).await;
    lb.clear_writes();
}

#[tokio::test]
async fn ingress_port_number_binds_named_backend() {
    let cluster = ClusterSnapshot::new()
        .with_config_map(configmap(&[]))
        .with_service(app_service(&[]))
        .with_ingress(ingress_to("app", PortSelector::Number(8080)));
    let lb = MemoryLoadBalancer::new();

    let report = pass(&cluster, &lb).await;
    let backend = lb.backend_get("ns_app_http").await.unwrap();
    assert_eq!(backend.mode, Mode::Http);
    assert!(report.changed);
    assert!(report.diagnostics.is_empty());
}

#[tokio::test]
async fn unknown_port_fails_only_that_binding() {
    let mut second = ingress_to("app", PortSelector::Number(9090));
    second.name = "metrics".into();
    let cluster = ClusterSnapshot::new()
        .with_config_map(configmap(&[]))
        .with_service(app_service(&[]))
        .with_ingress(ingress_to("app", PortSelector::Number(9999)))
        .with_ingress(second);
    let lb = MemoryLoadBalancer::new();

    let report = pass(&cluster, &lb).await;
    assert_eq!(lb.backend_names(), vec!["ns_app_metrics".to_string()]);
    assert_eq!(report.diagnostics.len(), 1);
    assert!(report.diagnostics[0].message.contains("9999"));
}

#[tokio::test]
async fn second_pass_is_idempotent() {
    let cluster = ClusterSnapshot::new()
        .with_config_map(configmap(&[
            ("maxconn", "3000"),
            ("timeout-connect", "5s"),
            ("syslog-server", "address:127.0.0.1, port:514, facility:local0"),
            ("frontend-config-snippet", "option forwardfor"),
            ("default-backend-port", "8081"),
        ]))
        .with_service(app_service(&[("load-balance", "leastconn")]))
        .with_ingress(ingress_to("app", PortSelector::parse("http")));
    let lb = MemoryLoadBalancer::new();

    let first = pass(&cluster, &lb).await;
    assert_eq!(first.action, Action::Restart);

    lb.clear_writes();
    let second = pass(&cluster, &lb).await;
    assert!(!second.changed);
    assert_eq!(second.action, Action::None);
    assert!(lb.writes().is_empty());
}

#[tokio::test]
async fn global_change_forces_restart() {
    let lb = MemoryLoadBalancer::new();
    let before = ClusterSnapshot::new()
        .with_config_map(configmap(&[("maxconn", "1000")]))
        .with_service(app_service(&[]))
        .with_ingress(ingress_to("app", PortSelector::Number(8080)));
    settled(&before, &lb).await;

    let after = ClusterSnapshot::new()
        .with_config_map(configmap(&[("maxconn", "2000")]))
        .with_service(app_service(&[]))
        .with_ingress(ingress_to("app", PortSelector::Number(8080)));
    let report = pass(&after, &lb).await;
    assert_eq!(report.action, Action::Restart);
    assert_eq!(lb.writes(), vec!["global_push:global".to_string()]);
}

#[tokio::test]
async fn backend_only_change_is_reload() {
    let lb = MemoryLoadBalancer::new();
    let before = ClusterSnapshot::new()
        .with_config_map(configmap(&[]))
        .with_service(app_service(&[]))
        .with_ingress(ingress_to("app", PortSelector::Number(8080)));
    settled(&before, &lb).await;

    let after = ClusterSnapshot::new()
        .with_config_map(configmap(&[]))
        .with_service(app_service(&[("check", "true"), ("timeout-check", "2s")]))
        .with_ingress(ingress_to("app", PortSelector::Number(8080)));
    let report = pass(&after, &lb).await;
    assert_eq!(report.action, Action::Reload);
    assert_eq!(lb.write_count("backend_edit"), 1);
}

#[tokio::test]
async fn custom_resource_wins_and_removal_falls_back() {
    let lb = MemoryLoadBalancer::new();
    let cr = CustomResource {
        kind: ResourceKind::Backend,
        namespace: "ns".into(),
        name: "tuned".into(),
        spec: serde_json::json!({"balance": {"algorithm": "source"}}),
    };
    let with_cr = ClusterSnapshot::new()
        .with_config_map(configmap(&[]))
        .with_custom_resource(cr)
        .with_service(app_service(&[
            ("cr-backend", "tuned"),
            ("load-balance", "leastconn"),
        ]))
        .with_ingress(ingress_to("app", PortSelector::Number(8080)));
    pass(&with_cr, &lb).await;
    let live = lb.backend_get("ns_app_http").await.unwrap();
    assert_eq!(live.balance.unwrap().algorithm, "source");

    let without_cr = ClusterSnapshot::new()
        .with_config_map(configmap(&[]))
        .with_service(app_service(&[
            ("cr-backend", "tuned"),
            ("load-balance", "leastconn"),
        ]))
        .with_ingress(ingress_to("app", PortSelector::Number(8080)));
    let report = pass(&without_cr, &lb).await;
    let live = lb.backend_get("ns_app_http").await.unwrap();
    assert_eq!(live.balance.unwrap().algorithm, "leastconn");
    assert_eq!(report.action, Action::Reload);
}

#[tokio::test]
async fn malformed_global_resource_warns_once_per_pass() {
    let lb = MemoryLoadBalancer::new();
    let cluster = ClusterSnapshot::new()
        .with_config_map(configmap(&[("cr-global", "main"), ("maxconn", "2000")]))
        .with_custom_resource(CustomResource {
            kind: ResourceKind::Global,
            namespace: "lb".into(),
            name: "main".into(),
            spec: serde_json::json!({"config": {"maxconn": "lots"}}),
        });

    let report = pass(&cluster, &lb).await;
    let global_diagnostics = report
        .diagnostics
        .iter()
        .filter(|d| d.scope == "global")
        .count();
    assert_eq!(global_diagnostics, 1);
    assert_eq!(lb.global_get().await.unwrap().maxconn, Some(2000));
}

#[tokio::test]
async fn no_default_backend_means_no_writes() {
    let lb = MemoryLoadBalancer::new();
    let cluster = ClusterSnapshot::new().with_config_map(configmap(&[]));
    settled(&cluster, &lb).await;

    let report = pass(&cluster, &lb).await;
    assert_eq!(report.action, Action::None);
    assert!(lb.writes().is_empty());
    assert_eq!(lb.frontend_get("http").await.unwrap().default_backend, None);
}

#[tokio::test]
async fn local_default_backend_is_created_once() {
    let lb = MemoryLoadBalancer::new();
    let plain = ClusterSnapshot::new().with_config_map(configmap(&[]));
    settled(&plain, &lb).await;

    let cluster =
        ClusterSnapshot::new().with_config_map(configmap(&[("default-backend-port", "8081")]));
    let report = pass(&cluster, &lb).await;
    assert_eq!(report.action, Action::Reload);
    assert_eq!(lb.write_count("backend_create"), 1);
    assert_eq!(lb.write_count("frontend_edit"), 2);
    for name in ["http", "https"] {
        let fe = lb.frontend_get(name).await.unwrap();
        assert_eq!(fe.default_backend.as_deref(), Some("default_local_backend"));
    }

    lb.clear_writes();
    let rerun = pass(&cluster, &lb).await;
    assert_eq!(rerun.action, Action::None);
    assert!(lb.writes().is_empty());
}

#[tokio::test]
async fn default_service_beats_local_port() {
    let lb = MemoryLoadBalancer::new();
    let cluster = ClusterSnapshot::new()
        .with_config_map(configmap(&[
            ("default-backend-service", "ns/app"),
            ("default-backend-port", "8081"),
        ]))
        .with_service(app_service(&[]));

    let report = pass(&cluster, &lb).await;
    assert_eq!(lb.backend_names(), vec!["ns_app_http".to_string()]);
    let fe = lb.frontend_get("https").await.unwrap();
    assert_eq!(fe.default_backend.as_deref(), Some("ns_app_http"));
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.message.contains("using service"))
    );
}

#[tokio::test]
async fn default_backend_takes_first_frontend_mode() {
    let lb = MemoryLoadBalancer::new();
    lb.insert_frontend(Frontend {
        name: "http".into(),
        mode: Mode::Tcp,
        ..Default::default()
    });
    let cluster = ClusterSnapshot::new()
        .with_config_map(configmap(&[("default-backend-service", "ns/app")]))
        .with_service(app_service(&[]));

    pass(&cluster, &lb).await;
    assert_eq!(lb.backend_get("ns_app_http").await.unwrap().mode, Mode::Tcp);
}

#[tokio::test]
async fn unreadable_first_frontend_writes_nothing() {
    let cluster = ClusterSnapshot::new().with_service(app_service(&[]));
    let lb = MemoryLoadBalancer::new();
    let settings = settings();
    let diag = Diagnostics::new();
    let locks = NameLocks::new();
    let syncer = EndpointSyncer::new();
    let ctx = PassContext::new(&cluster, &lb, &syncer, &settings, &diag, &locks);

    let path = IngressPath::default_backend("ns", "app", None);
    let binding = BackendBinding::new(&cluster, path, Mode::Http).unwrap();
    let frontends = ["missing".to_string(), "http".to_string()];
    let result = set_default_backend(&ctx, binding, &frontends).await;

    assert!(matches!(result, Err(SyncError::Api(ref e)) if e.is_not_found()));
    assert!(lb.writes().is_empty());
}

#[tokio::test]
async fn default_backend_preconditions() {
    let cluster = ClusterSnapshot::new().with_service(app_service(&[]));
    let lb = MemoryLoadBalancer::new();
    let settings = settings();
    let diag = Diagnostics::new();
    let locks = NameLocks::new();
    let syncer = EndpointSyncer::new();
    let ctx = PassContext::new(&cluster, &lb, &syncer, &settings, &diag, &locks);

    let plain = IngressPath::new("ns", "app", Some(PortSelector::Number(8080)));
    let binding = BackendBinding::new(&cluster, plain, Mode::Http).unwrap();
    let result = set_default_backend(&ctx, binding, &["http".to_string()]).await;
    assert!(matches!(result, Err(SyncError::Precondition(_))));

    let path = IngressPath::default_backend("ns", "app", None);
    let binding = BackendBinding::new(&cluster, path, Mode::Http).unwrap();
    let result = set_default_backend(&ctx, binding, &[]).await;
    assert!(matches!(result, Err(SyncError::Precondition(_))));
    assert!(lb.writes().is_empty());
}

#[tokio::test]
async fn rejected_write_is_retried_next_pass() {
    let lb = MemoryLoadBalancer::new();
    let cluster = ClusterSnapshot::new().with_config_map(configmap(&[("maxconn", "500")]));
    lb.reject("global_push");

    let failed = pass(&cluster, &lb).await;
    assert!(failed.diagnostics.iter().any(|d| d.scope == "global"));
    assert!(
        !failed
            .changes
            .iter()
            .any(|c| c.name == "global" && c.fields.contains(&"maxconn"))
    );

    lb.accept_all();
    let retried = pass(&cluster, &lb).await;
    assert_eq!(retried.action, Action::Restart);
    assert_eq!(lb.global_get().await.unwrap().maxconn, Some(500));
}

#[tokio::test]
async fn mode_is_fixed_once_created() {
    let lb = MemoryLoadBalancer::new();
    let cluster = ClusterSnapshot::new()
        .with_config_map(configmap(&[("default-backend-service", "ns/app")]))
        .with_service(app_service(&[]));
    pass(&cluster, &lb).await;

    lb.insert_frontend(Frontend {
        name: "http".into(),
        mode: Mode::Tcp,
        ..Default::default()
    });
    let report = pass(&cluster, &lb).await;
    assert_eq!(lb.backend_get("ns_app_http").await.unwrap().mode, Mode::Http);
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.message.contains("refusing to switch"))
    );
}

fn tls_secret(crt: &str, key: &str) -> Secret {
    let encode = |s: &str| base64::engine::general_purpose::STANDARD.encode(s);
    Secret {
        name: "default-tls".into(),
        namespace: "lb".into(),
        data: [
            ("tls.crt".to_string(), encode(crt)),
            ("tls.key".to_string(), encode(key)),
        ]
        .into(),
    }
}

fn with_default_tls(secret: Secret) -> ClusterSnapshot {
    ClusterSnapshot::new()
        .with_config_map(configmap(&[("ssl-certificate", "default-tls")]))
        .with_secret(secret)
}

#[tokio::test]
async fn default_certificate_is_installed() {
    let cluster = with_default_tls(tls_secret("CERT", "KEY\n"));
    let lb = MemoryLoadBalancer::new();

    let report = pass(&cluster, &lb).await;
    assert_eq!(
        lb.certificate(CertSlot::DefaultCert).unwrap(),
        b"CERT\nKEY\n".to_vec()
    );
    assert!(report.changes.iter().any(|c| c.name == "default-cert"));
}

#[tokio::test]
async fn rotated_certificate_forces_reload() {
    let lb = MemoryLoadBalancer::new();
    settled(&with_default_tls(tls_secret("OLD", "KEY\n")), &lb).await;

    let report = pass(&with_default_tls(tls_secret("OLD", "KEY\n")), &lb).await;
    assert!(!report.changed);
    assert_eq!(lb.write_count("install_certificate"), 0);

    let report = pass(&with_default_tls(tls_secret("NEW", "KEY\n")), &lb).await;
    assert!(report.changed);
    assert_eq!(report.action, Action::Reload);
    assert_eq!(lb.write_count("install_certificate"), 1);
    assert_eq!(
        lb.certificate(CertSlot::DefaultCert).unwrap(),
        b"NEW\nKEY\n".to_vec()
    );
}

#[tokio::test]
async fn missing_certificate_secret_keeps_previous() {
    let lb = MemoryLoadBalancer::new();
    lb.install_certificate(b"OLD", CertSlot::DefaultCert)
        .await
        .unwrap();
    let cluster =
        ClusterSnapshot::new().with_config_map(configmap(&[("ssl-certificate", "lb/absent")]));

    let report = pass(&cluster, &lb).await;
    assert_eq!(lb.certificate(CertSlot::DefaultCert).unwrap(), b"OLD".to_vec());
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.scope == "default-certificate")
    );
}
