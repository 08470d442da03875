//! Change detection between desired and live models, and the convergence
//! action each change forces on the load-balancer process.
//!
//! Comparison is explicit and field by field per entity kind. Fields the
//! balancer assigns itself (`id`) are left out of the comparison, which is
//! the whole of the normalization step.

use serde::Serialize;

use pkg_types::backend::{Backend, Server};
use pkg_types::defaults::Defaults;
use pkg_types::frontend::Frontend;
use pkg_types::global::{Global, LogTarget};

/// What the balancer process must do to pick up a change.
/// Ordered: `Restart` dominates `Reload` dominates `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    None,
    Reload,
    Restart,
}

impl Action {
    pub fn merge(self, other: Action) -> Action {
        self.max(other)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::None => write!(f, "none"),
            Action::Reload => write!(f, "reload"),
            Action::Restart => write!(f, "restart"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Global,
    LogTargets,
    GlobalSnippet,
    Defaults,
    Backend,
    Frontend,
    Snippet,
    Servers,
    Certificate,
}

impl EntityKind {
    /// Static action policy: process-wide listeners and logging pipelines
    /// cannot be swapped live, everything else can.
    pub fn action_on_change(self) -> Action {
        match self {
            EntityKind::Global | EntityKind::LogTargets | EntityKind::GlobalSnippet => {
                Action::Restart
            }
            EntityKind::Defaults
            | EntityKind::Backend
            | EntityKind::Frontend
            | EntityKind::Snippet
            | EntityKind::Servers
            | EntityKind::Certificate => Action::Reload,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityKind::Global => "global",
            EntityKind::LogTargets => "log-targets",
            EntityKind::GlobalSnippet => "global-snippet",
            EntityKind::Defaults => "defaults",
            EntityKind::Backend => "backend",
            EntityKind::Frontend => "frontend",
            EntityKind::Snippet => "snippet",
            EntityKind::Servers => "servers",
            EntityKind::Certificate => "certificate",
        };
        write!(f, "{}", s)
    }
}

/// Names of the fields that differ between two models.
pub trait Diff {
    fn diff(&self, live: &Self) -> Vec<&'static str>;
}

#[derive(Default)]
struct Fields(Vec<&'static str>);

impl Fields {
    fn check<T: PartialEq>(mut self, name: &'static str, desired: &T, live: &T) -> Self {
        if desired != live {
            self.0.push(name);
        }
        self
    }

    fn done(self) -> Vec<&'static str> {
        self.0
    }
}

impl Diff for Global {
    fn diff(&self, live: &Self) -> Vec<&'static str> {
        Fields::default()
            .check("nbthread", &self.nbthread, &live.nbthread)
            .check("maxconn", &self.maxconn, &live.maxconn)
            .check("hard_stop_after", &self.hard_stop_after, &live.hard_stop_after)
            .check(
                "ssl_default_bind_ciphers",
                &self.ssl_default_bind_ciphers,
                &live.ssl_default_bind_ciphers,
            )
            .check(
                "ssl_default_bind_options",
                &self.ssl_default_bind_options,
                &live.ssl_default_bind_options,
            )
            .check("tune", &self.tune, &live.tune)
            .check("pidfile", &self.pidfile, &live.pidfile)
            .check("runtime_socket", &self.runtime_socket, &live.runtime_socket)
            .check(
                "server_state_base",
                &self.server_state_base,
                &live.server_state_base,
            )
            .done()
    }
}

impl Diff for Vec<LogTarget> {
    fn diff(&self, live: &Self) -> Vec<&'static str> {
        Fields::default().check("log_targets", self, live).done()
    }
}

impl Diff for Defaults {
    fn diff(&self, live: &Self) -> Vec<&'static str> {
        Fields::default()
            .check(
                "http_request_timeout",
                &self.http_request_timeout,
                &live.http_request_timeout,
            )
            .check("connect_timeout", &self.connect_timeout, &live.connect_timeout)
            .check("client_timeout", &self.client_timeout, &live.client_timeout)
            .check("queue_timeout", &self.queue_timeout, &live.queue_timeout)
            .check("server_timeout", &self.server_timeout, &live.server_timeout)
            .check("tunnel_timeout", &self.tunnel_timeout, &live.tunnel_timeout)
            .check(
                "http_keep_alive_timeout",
                &self.http_keep_alive_timeout,
                &live.http_keep_alive_timeout,
            )
            .check("log_format", &self.log_format, &live.log_format)
            .check("dontlognull", &self.dontlognull, &live.dontlognull)
            .check("logasap", &self.logasap, &live.logasap)
            .check("error_files", &self.error_files, &live.error_files)
            .done()
    }
}

impl Diff for Backend {
    fn diff(&self, live: &Self) -> Vec<&'static str> {
        Fields::default()
            .check("name", &self.name, &live.name)
            .check("mode", &self.mode, &live.mode)
            .check("balance", &self.balance, &live.balance)
            .check("httpchk", &self.httpchk, &live.httpchk)
            .check("check_timeout", &self.check_timeout, &live.check_timeout)
            .check("cookie", &self.cookie, &live.cookie)
            .check(
                "dynamic_cookie_key",
                &self.dynamic_cookie_key,
                &live.dynamic_cookie_key,
            )
            .check("default_server", &self.default_server, &live.default_server)
            .check("forwardfor", &self.forwardfor, &live.forwardfor)
            .done()
    }
}

impl Diff for Frontend {
    fn diff(&self, live: &Self) -> Vec<&'static str> {
        Fields::default()
            .check("name", &self.name, &live.name)
            .check("mode", &self.mode, &live.mode)
            .check("default_backend", &self.default_backend, &live.default_backend)
            .done()
    }
}

/// Snippet lines.
impl Diff for Vec<String> {
    fn diff(&self, live: &Self) -> Vec<&'static str> {
        Fields::default().check("lines", self, live).done()
    }
}

/// Server pools compare as sets.
impl Diff for Vec<Server> {
    fn diff(&self, live: &Self) -> Vec<&'static str> {
        let mut desired = self.clone();
        let mut live = live.clone();
        desired.sort();
        live.sort();
        Fields::default().check("servers", &desired, &live).done()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub changed: bool,
    pub action: Action,
    pub fields: Vec<&'static str>,
}

/// Compare `desired` against `live`. Any difference in an entity of a
/// restart class forces a restart, however small.
pub fn classify<T: Diff>(kind: EntityKind, desired: &T, live: &T) -> Classification {
    let fields = desired.diff(live);
    let changed = !fields.is_empty();
    Classification {
        changed,
        action: if changed {
            kind.action_on_change()
        } else {
            Action::None
        },
        fields,
    }
}

/// One applied change.
#[derive(Debug, Clone, Serialize)]
pub struct Change {
    pub kind: EntityKind,
    pub name: String,
    pub action: Action,
    pub fields: Vec<&'static str>,
}

/// Changes applied by part of a pass and the action they add up to.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Outcome {
    pub action: Action,
    pub changes: Vec<Change>,
}

impl Outcome {
    /// Record a change that was successfully written to the balancer.
    pub fn record(&mut self, kind: EntityKind, name: &str, fields: Vec<&'static str>) {
        let action = kind.action_on_change();
        self.action = self.action.merge(action);
        self.changes.push(Change {
            kind,
            name: name.to_string(),
            action,
            fields,
        });
    }

    pub fn merge(&mut self, other: Outcome) {
        self.action = self.action.merge(other.action);
        self.changes.extend(other.changes);
    }

    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }
}
