//! Caller-owned sink for non-fatal problems found during a pass.

use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Entity or subsystem the entry is about, e.g. `backend ns_app_http`.
    pub scope: String,
    pub message: String,
}

/// Accumulates structured entries and mirrors each one to the log.
/// Shared by concurrent backend tasks of one pass.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries_mut(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn warn(&self, scope: &str, message: impl std::fmt::Display) {
        warn!("{}: {}", scope, message);
        self.push(Severity::Warning, scope, message.to_string());
    }

    pub fn error(&self, scope: &str, message: impl std::fmt::Display) {
        error!("{}: {}", scope, message);
        self.push(Severity::Error, scope, message.to_string());
    }

    fn push(&self, severity: Severity, scope: &str, message: String) {
        self.entries_mut().push(Diagnostic {
            severity,
            scope: scope.to_string(),
            message,
        });
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries_mut().clone()
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    pub fn has_errors(&self) -> bool {
        self.entries_mut()
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.entries_mut().is_empty()
    }
}
