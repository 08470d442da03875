use thiserror::Error;

use pkg_lbapi::ApiError;
use pkg_types::backend::Mode;

/// A single source value could not be turned into model fields. Always
/// absorbed: logged, recorded, and resolution moves on.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("annotation '{key}': {message}")]
    Annotation { key: &'static str, message: String },

    #[error("{0}")]
    CustomResource(String),

    #[error("'{key}' references '{value}': {message}")]
    Reference {
        key: &'static str,
        value: String,
        message: String,
    },
}

/// Failure of one binding or one entity sync. Never aborts the whole pass.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("service {namespace}/{name} not found")]
    ServiceNotFound { namespace: String, name: String },

    #[error("service {service}: no service port matching '{selector}'")]
    PortNotFound { service: String, selector: String },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("load balancer API: {0}")]
    Api(#[from] ApiError),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("backend '{name}' was created in {live} mode, refusing to switch it to {desired}")]
    ModeConflict {
        name: String,
        live: Mode,
        desired: Mode,
    },
}

impl SyncError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }
}
