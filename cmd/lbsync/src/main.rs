mod hooks;

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pkg_constants::annotations::{DEFAULT_BACKEND_PORT, DEFAULT_BACKEND_SERVICE};
use pkg_constants::lb::{FRONTEND_HTTP, FRONTEND_HTTPS, FRONTEND_STATS};
use pkg_constants::paths::{DEFAULT_CONFIG, DEFAULT_DATA_DIR};
use pkg_constants::state::{
    DEFAULT_HOOK_TIMEOUT_SECS, DEFAULT_PASS_TIMEOUT_SECS, DEFAULT_SYNC_INTERVAL_SECS,
};
use pkg_controllers::{ControllerSettings, LoadBalancerController};
use pkg_lbapi::{LoadBalancerApi, MemoryLoadBalancer, StoredLoadBalancer};
use pkg_state::client::StateStore;
use pkg_state::lease::PassLease;
use pkg_types::backend::Mode;
use pkg_types::config::{ControllerConfigFile, load_config_file};
use pkg_types::validate::parse_k8s_path;

use crate::hooks::HookExecutor;

#[derive(Parser, Debug)]
#[command(name = "lbsync", about = "Syncs cluster state into load balancer configuration")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_CONFIG)]
    config: String,

    /// Directory for SlateDB state storage
    #[arg(long)]
    data_dir: Option<String>,

    /// Namespace the controller runs in
    #[arg(long)]
    pod_namespace: Option<String>,

    /// Main ConfigMap as namespace/name
    #[arg(long)]
    configmap: Option<String>,

    /// Default backend Service as namespace/name
    #[arg(long)]
    default_backend_service: Option<String>,

    /// Local port of the synthesized default backend
    #[arg(long)]
    default_backend_port: Option<u16>,

    /// Seconds between reconciliation passes
    #[arg(long)]
    sync_interval_secs: Option<u64>,

    /// Apply to an in-memory load balancer only; no hooks are run
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Run a single pass, print its report and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    // Load config file (returns defaults if file not found)
    let file_cfg: ControllerConfigFile = load_config_file(&cli.config)?;
    info!("Config file: {}", cli.config);

    // Merge: CLI args > config file > defaults
    let data_dir = cli
        .data_dir
        .or(file_cfg.data_dir)
        .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
    let pod_namespace = cli
        .pod_namespace
        .or(file_cfg.pod_namespace)
        .unwrap_or_else(|| "default".to_string());
    let configmap = match cli.configmap.or(file_cfg.configmap) {
        Some(reference) => Some(parse_k8s_path(&reference, &pod_namespace)?),
        None => None,
    };
    let sync_interval = cli
        .sync_interval_secs
        .or(file_cfg.sync_interval_secs)
        .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS);
    let pass_timeout = file_cfg
        .pass_timeout_secs
        .unwrap_or(DEFAULT_PASS_TIMEOUT_SECS);
    let dry_run = cli.dry_run || file_cfg.dry_run.unwrap_or(false);

    // The default backend is read from the CLI-level annotation source.
    let mut cli_annotations = file_cfg.annotations;
    if let Some(service) = cli
        .default_backend_service
        .or(file_cfg.default_backend_service)
    {
        cli_annotations.insert(DEFAULT_BACKEND_SERVICE.to_string(), service);
    }
    if let Some(port) = cli.default_backend_port.or(file_cfg.default_backend_port) {
        cli_annotations.insert(DEFAULT_BACKEND_PORT.to_string(), port.to_string());
    }

    let settings = ControllerSettings {
        pod_namespace,
        configmap,
        frontend_http: file_cfg
            .frontend_http
            .unwrap_or_else(|| FRONTEND_HTTP.to_string()),
        frontend_https: file_cfg
            .frontend_https
            .unwrap_or_else(|| FRONTEND_HTTPS.to_string()),
        cli_annotations,
        environment: file_cfg.environment,
    };

    info!("Starting lbsync");
    info!("  Data dir:   {}", data_dir);
    info!("  Namespace:  {}", settings.pod_namespace);
    info!("  Interval:   {}s", sync_interval);
    info!("  Dry run:    {}", dry_run);

    let store = StateStore::new(&data_dir).await?;
    let lb: Arc<dyn LoadBalancerApi> = if dry_run {
        Arc::new(MemoryLoadBalancer::new())
    } else {
        let stored = StoredLoadBalancer::new(store.clone());
        stored
            .bootstrap_frontends(
                &[
                    settings.frontend_http.as_str(),
                    settings.frontend_https.as_str(),
                    FRONTEND_STATS,
                ],
                Mode::Http,
            )
            .await?;
        Arc::new(stored)
    };

    let holder_id = std::env::var("HOSTNAME")
        .unwrap_or_else(|_| format!("lbsync-{}", std::process::id()));
    let mut controller = LoadBalancerController::new(store.clone(), lb, settings).with_intervals(
        Duration::from_secs(sync_interval),
        Duration::from_secs(pass_timeout),
    );
    if !dry_run {
        controller = controller.with_lease(PassLease::new(store.clone(), holder_id));
    }

    if cli.once {
        match controller.reconcile().await? {
            Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
            None => warn!("Pass lease is held by another instance, nothing done"),
        }
        drop(controller);
        return store.close().await;
    }

    let hooks = HookExecutor::new(
        file_cfg.reload_hooks,
        file_cfg.restart_hooks,
        file_cfg
            .hook_timeout_secs
            .unwrap_or(DEFAULT_HOOK_TIMEOUT_SECS),
    );
    let (tx, mut rx) = mpsc::channel(16);
    let handle = controller.start(tx);

    tokio::spawn(async move {
        while let Some(report) = rx.recv().await {
            if dry_run {
                info!(
                    "Dry run: {} changes would need a {}",
                    report.changes.len(),
                    report.action
                );
                continue;
            }
            let failed = hooks.run(report.action, report.changes.len()).await;
            if failed > 0 {
                warn!("{} {} hooks failed", failed, report.action);
            }
        }
    });

    // Block until Ctrl-C
    info!("lbsync is running. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down lbsync");
    handle.abort();
    if let Err(e) = handle.await {
        if !e.is_cancelled() {
            warn!("Controller task ended abnormally: {}", e);
        }
    }
    store.close().await
}
