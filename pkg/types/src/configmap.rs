use serde::{Deserialize, Serialize};

use crate::Annotations;

/// ConfigMap whose data doubles as controller-wide annotations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigMap {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub data: Annotations,
}
