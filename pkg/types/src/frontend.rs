use serde::{Deserialize, Serialize};

use crate::backend::Mode;

/// A named listener entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frontend {
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub mode: Mode,
    /// Backend selected when no routing rule matches.
    #[serde(default)]
    pub default_backend: Option<String>,
}
