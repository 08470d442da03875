//! Annotation-driven field setters.
//!
//! Each setter owns one option key and is a pure `(model, raw) -> model`
//! function. Registries are applied in their declared order so resolution
//! is deterministic; a failing setter is reported and skipped without
//! touching the model.

use pkg_constants::annotations as keys;
use pkg_types::Annotations;
use pkg_types::backend::{Backend, Balance, Cookie, DefaultServer, HttpCheck};
use pkg_types::defaults::Defaults;
use pkg_types::global::{Global, LogTarget, LogTargets, TuneOptions};

use crate::diagnostics::Diagnostics;
use crate::error::ResolutionError;

/// Annotation maps ordered by precedence, highest first
/// (object-level, then ConfigMap, then CLI-level).
#[derive(Debug, Clone, Default)]
pub struct AnnotationSources<'a> {
    sources: Vec<&'a Annotations>,
}

impl<'a> AnnotationSources<'a> {
    pub fn new(sources: Vec<&'a Annotations>) -> Self {
        Self { sources }
    }

    /// Value of `key` from the first source that defines it.
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.sources
            .iter()
            .find_map(|source| source.get(key))
            .map(String::as_str)
    }

    /// Like [`get`](Self::get), treating blank values as absent.
    pub fn get_non_empty(&self, key: &str) -> Option<&'a str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }
}

pub type SetterFn<M> = fn(M, &str) -> Result<M, String>;

pub struct FieldSetter<M> {
    pub key: &'static str,
    pub apply: SetterFn<M>,
}

/// Run `setters` over `model`, in order, for every key present in `sources`.
pub fn apply_setters<M: Clone>(
    mut model: M,
    setters: &[FieldSetter<M>],
    sources: &AnnotationSources<'_>,
    scope: &str,
    diag: &Diagnostics,
) -> M {
    for setter in setters {
        let Some(raw) = sources.get(setter.key) else {
            continue;
        };
        match (setter.apply)(model.clone(), raw.trim()) {
            Ok(updated) => model = updated,
            Err(message) => diag.warn(
                scope,
                ResolutionError::Annotation {
                    key: setter.key,
                    message,
                },
            ),
        }
    }
    model
}

// ─── Value parsers ────────────────────────────────────────────────────────

/// Duration in milliseconds. Accepts `ms`, `s`, `m`, `h` and `d` suffixes;
/// a bare number is milliseconds.
pub fn parse_duration(value: &str) -> Result<u64, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration '{}'", value))?;
    let factor = match unit {
        "" | "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        other => return Err(format!("unknown duration unit '{}' in '{}'", other, value)),
    };
    number
        .checked_mul(factor)
        .ok_or_else(|| format!("duration '{}' overflows", value))
}

pub fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "enabled" | "on" => Ok(true),
        "false" | "disabled" | "off" => Ok(false),
        other => Err(format!("expected true/false, got '{}'", other)),
    }
}

fn parse_u32(value: &str) -> Result<u32, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("expected an unsigned integer, got '{}'", value))
}

fn non_empty(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        Err("value must not be empty".to_string())
    } else {
        Ok(value.trim().to_string())
    }
}

// ─── Global ───────────────────────────────────────────────────────────────

pub static GLOBAL_SETTERS: &[FieldSetter<Global>] = &[
    FieldSetter {
        key: keys::NBTHREAD,
        apply: |mut g, v| {
            let n = parse_u32(v)?;
            if n == 0 {
                return Err("nbthread must be at least 1".into());
            }
            g.nbthread = Some(n);
            Ok(g)
        },
    },
    FieldSetter {
        key: keys::MAXCONN,
        apply: |mut g, v| {
            g.maxconn = Some(parse_u32(v)?);
            Ok(g)
        },
    },
    FieldSetter {
        key: keys::HARD_STOP_AFTER,
        apply: |mut g, v| {
            g.hard_stop_after = Some(parse_duration(v)?);
            Ok(g)
        },
    },
    FieldSetter {
        key: keys::SSL_DEFAULT_BIND_CIPHERS,
        apply: |mut g, v| {
            g.ssl_default_bind_ciphers = Some(non_empty(v)?);
            Ok(g)
        },
    },
    FieldSetter {
        key: keys::SSL_DEFAULT_BIND_OPTIONS,
        apply: |mut g, v| {
            g.ssl_default_bind_options = Some(non_empty(v)?);
            Ok(g)
        },
    },
    FieldSetter {
        key: keys::TUNE_BUFSIZE,
        apply: |mut g, v| {
            let size = parse_u32(v)?;
            g.tune.get_or_insert_with(TuneOptions::default).bufsize = Some(size);
            Ok(g)
        },
    },
];

pub static LOG_TARGET_SETTERS: &[FieldSetter<LogTargets>] = &[FieldSetter {
    key: keys::SYSLOG_SERVER,
    apply: |_, v| parse_syslog_servers(v),
}];

/// One log target per line:
/// `address:127.0.0.1, port:514, facility:local0, level:notice, format:raw`.
pub fn parse_syslog_servers(value: &str) -> Result<LogTargets, String> {
    let mut targets = Vec::new();
    for line in value.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut target = LogTarget::default();
        let mut port = None;
        for part in line.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (k, v) = part
                .split_once(':')
                .ok_or_else(|| format!("expected 'key:value', got '{}'", part))?;
            let v = v.trim().to_string();
            match k.trim() {
                "address" => target.address = v,
                "port" => {
                    let p: u16 = v
                        .parse()
                        .map_err(|_| format!("invalid syslog port '{}'", v))?;
                    port = Some(p);
                }
                "facility" => target.facility = Some(v),
                "level" => target.level = Some(v),
                "format" => target.format = Some(v),
                other => return Err(format!("unknown syslog parameter '{}'", other)),
            }
        }
        if target.address.is_empty() {
            return Err(format!("syslog entry '{}' has no address", line));
        }
        if let Some(p) = port {
            target.address = format!("{}:{}", target.address, p);
        }
        targets.push(target);
    }
    Ok(targets)
}

// ─── Defaults ─────────────────────────────────────────────────────────────

pub static DEFAULTS_SETTERS: &[FieldSetter<Defaults>] = &[
    FieldSetter {
        key: keys::TIMEOUT_HTTP_REQUEST,
        apply: |mut d, v| {
            d.http_request_timeout = Some(parse_duration(v)?);
            Ok(d)
        },
    },
    FieldSetter {
        key: keys::TIMEOUT_CONNECT,
        apply: |mut d, v| {
            d.connect_timeout = Some(parse_duration(v)?);
            Ok(d)
        },
    },
    FieldSetter {
        key: keys::TIMEOUT_CLIENT,
        apply: |mut d, v| {
            d.client_timeout = Some(parse_duration(v)?);
            Ok(d)
        },
    },
    FieldSetter {
        key: keys::TIMEOUT_QUEUE,
        apply: |mut d, v| {
            d.queue_timeout = Some(parse_duration(v)?);
            Ok(d)
        },
    },
    FieldSetter {
        key: keys::TIMEOUT_SERVER,
        apply: |mut d, v| {
            d.server_timeout = Some(parse_duration(v)?);
            Ok(d)
        },
    },
    FieldSetter {
        key: keys::TIMEOUT_TUNNEL,
        apply: |mut d, v| {
            d.tunnel_timeout = Some(parse_duration(v)?);
            Ok(d)
        },
    },
    FieldSetter {
        key: keys::TIMEOUT_HTTP_KEEP_ALIVE,
        apply: |mut d, v| {
            d.http_keep_alive_timeout = Some(parse_duration(v)?);
            Ok(d)
        },
    },
    FieldSetter {
        key: keys::LOG_FORMAT,
        apply: |mut d, v| {
            d.log_format = Some(non_empty(v)?);
            Ok(d)
        },
    },
    FieldSetter {
        key: keys::DONTLOGNULL,
        apply: |mut d, v| {
            d.dontlognull = parse_bool(v)?;
            Ok(d)
        },
    },
    FieldSetter {
        key: keys::LOGASAP,
        apply: |mut d, v| {
            d.logasap = parse_bool(v)?;
            Ok(d)
        },
    },
];

// ─── Backend ──────────────────────────────────────────────────────────────

const BALANCE_ALGORITHMS: &[&str] = &[
    "roundrobin",
    "static-rr",
    "leastconn",
    "first",
    "source",
    "random",
    "uri",
    "url_param",
    "rdp-cookie",
];

fn parse_balance(value: &str) -> Result<Balance, String> {
    let algorithm = value.split_whitespace().next().unwrap_or_default();
    let known = BALANCE_ALGORITHMS.contains(&algorithm)
        || (algorithm.starts_with("hdr(") && algorithm.ends_with(')'));
    if !known {
        return Err(format!("unknown load-balance algorithm '{}'", value));
    }
    Ok(Balance {
        algorithm: value.split_whitespace().collect::<Vec<_>>().join(" "),
    })
}

/// `uri` or `METHOD uri [VERSION]`.
fn parse_http_check(value: &str) -> Result<HttpCheck, String> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    match parts.as_slice() {
        [uri] => Ok(HttpCheck {
            method: "GET".to_string(),
            uri: uri.to_string(),
            version: None,
        }),
        [method, uri] => Ok(HttpCheck {
            method: method.to_ascii_uppercase(),
            uri: uri.to_string(),
            version: None,
        }),
        [method, uri, version] => Ok(HttpCheck {
            method: method.to_ascii_uppercase(),
            uri: uri.to_string(),
            version: Some(version.to_string()),
        }),
        _ => Err(format!("invalid check-http value '{}'", value)),
    }
}

pub static BACKEND_SETTERS: &[FieldSetter<Backend>] = &[
    FieldSetter {
        key: keys::LOAD_BALANCE,
        apply: |mut b, v| {
            b.balance = Some(parse_balance(v)?);
            Ok(b)
        },
    },
    FieldSetter {
        key: keys::CHECK,
        apply: |mut b, v| {
            b.default_server
                .get_or_insert_with(DefaultServer::default)
                .check = parse_bool(v)?;
            Ok(b)
        },
    },
    FieldSetter {
        key: keys::CHECK_INTERVAL,
        apply: |mut b, v| {
            b.default_server
                .get_or_insert_with(DefaultServer::default)
                .inter = Some(parse_duration(v)?);
            Ok(b)
        },
    },
    FieldSetter {
        key: keys::CHECK_HTTP,
        apply: |mut b, v| {
            b.httpchk = Some(parse_http_check(v)?);
            Ok(b)
        },
    },
    FieldSetter {
        key: keys::TIMEOUT_CHECK,
        apply: |mut b, v| {
            b.check_timeout = Some(parse_duration(v)?);
            Ok(b)
        },
    },
    FieldSetter {
        key: keys::COOKIE_PERSISTENCE,
        apply: |mut b, v| {
            b.cookie = Some(Cookie {
                name: non_empty(v)?,
                dynamic: true,
                cookie_type: Some("insert".to_string()),
                indirect: true,
                nocache: true,
            });
            Ok(b)
        },
    },
    FieldSetter {
        key: keys::FORWARDED_FOR,
        apply: |mut b, v| {
            b.forwardfor = parse_bool(v)?;
            Ok(b)
        },
    },
];
