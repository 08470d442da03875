//! Global and Defaults sync, run once per pass.

use tracing::info;

use pkg_constants::annotations::{FRONTEND_CONFIG_SNIPPET, GLOBAL_CONFIG_SNIPPET};
use pkg_constants::lb::FRONTEND_STATS;
use pkg_constants::paths::{DEFAULT_PID_FILE, DEFAULT_RUNTIME_SOCKET, DEFAULT_SERVER_STATE_BASE};
use pkg_lbapi::SnippetScope;
use pkg_types::config::EnvironmentConfig;
use pkg_types::defaults::Defaults;
use pkg_types::custom_resource::GlobalSpec;
use pkg_types::global::Global;

use crate::classifier::{EntityKind, Outcome, classify};
use crate::pass::PassContext;
use crate::resolver::resolve;
use crate::snippets::sync_snippet;

const GLOBAL: &str = "global";
const DEFAULTS: &str = "defaults";

/// Controller-owned Global fields, set regardless of the model source.
pub fn apply_environment(global: &mut Global, env: &EnvironmentConfig) {
    let or_default = |value: &Option<String>, default: &str| {
        Some(value.clone().unwrap_or_else(|| default.to_string()))
    };
    global.pidfile = or_default(&env.pid_file, DEFAULT_PID_FILE);
    global.runtime_socket = or_default(&env.runtime_socket, DEFAULT_RUNTIME_SOCKET);
    global.server_state_base = or_default(&env.server_state_base, DEFAULT_SERVER_STATE_BASE);
}

/// Sync Global, its log targets and the global and front-end snippets.
/// Global and log-target changes require a restart.
pub async fn sync_global(ctx: &PassContext<'_>) -> Outcome {
    let sources = ctx.global_sources();
    let namespace = ctx.settings.pod_namespace.as_str();
    let mut outcome = Outcome::default();

    let GlobalSpec {
        config: mut desired,
        log_targets: targets,
    } = resolve::<GlobalSpec>(ctx.cluster, namespace, &sources, GLOBAL, ctx.diagnostics).model;
    apply_environment(&mut desired, &ctx.settings.environment);
    match ctx.lb.global_get().await {
        Ok(live) => {
            let c = classify(EntityKind::Global, &desired, &live);
            if c.changed {
                match ctx.lb.global_push(&desired).await {
                    Ok(()) => {
                        info!("Global updated ({})", c.fields.join(", "));
                        outcome.record(EntityKind::Global, GLOBAL, c.fields);
                    }
                    Err(e) => ctx.diagnostics.error(GLOBAL, e),
                }
            }
        }
        Err(e) => ctx.diagnostics.error(GLOBAL, e),
    }

    match ctx.lb.global_get_log_targets().await {
        Ok(live) => {
            let c = classify(EntityKind::LogTargets, &targets, &live);
            if c.changed {
                match ctx.lb.global_push_log_targets(&targets).await {
                    Ok(()) => {
                        info!("Log targets updated ({} targets)", targets.len());
                        outcome.record(EntityKind::LogTargets, GLOBAL, c.fields);
                    }
                    Err(e) => ctx.diagnostics.error(GLOBAL, e),
                }
            }
        }
        Err(e) => ctx.diagnostics.error(GLOBAL, e),
    }

    outcome.merge(
        sync_snippet(
            ctx.lb,
            SnippetScope::Global,
            sources.get(GLOBAL_CONFIG_SNIPPET),
            EntityKind::GlobalSnippet,
            ctx.diagnostics,
        )
        .await,
    );

    let frontend_snippet = sources.get(FRONTEND_CONFIG_SNIPPET);
    for frontend in [
        ctx.settings.frontend_http.as_str(),
        ctx.settings.frontend_https.as_str(),
        FRONTEND_STATS,
    ] {
        outcome.merge(
            sync_snippet(
                ctx.lb,
                SnippetScope::Frontend(frontend.to_string()),
                frontend_snippet,
                EntityKind::Snippet,
                ctx.diagnostics,
            )
            .await,
        );
    }
    outcome
}

/// Sync Defaults. Error files are managed elsewhere and carried over from
/// the live model.
pub async fn sync_defaults(ctx: &PassContext<'_>) -> Outcome {
    let mut outcome = Outcome::default();
    let live = match ctx.lb.defaults_get().await {
        Ok(live) => live,
        Err(e) => {
            ctx.diagnostics.error(DEFAULTS, e);
            return outcome;
        }
    };
    let mut desired = resolve::<Defaults>(
        ctx.cluster,
        &ctx.settings.pod_namespace,
        &ctx.global_sources(),
        DEFAULTS,
        ctx.diagnostics,
    )
    .model;
    desired.error_files = live.error_files.clone();

    let c = classify(EntityKind::Defaults, &desired, &live);
    if c.changed {
        match ctx.lb.defaults_push(&desired).await {
            Ok(()) => {
                info!("Defaults updated ({})", c.fields.join(", "));
                outcome.record(EntityKind::Defaults, DEFAULTS, c.fields);
            }
            Err(e) => ctx.diagnostics.error(DEFAULTS, e),
        }
    }
    outcome
}
