use anyhow::{Context, Result, bail};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key of the PEM certificate chain in a TLS Secret.
pub const TLS_CRT: &str = "tls.crt";

/// Key of the PEM private key in a TLS Secret.
pub const TLS_KEY: &str = "tls.key";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    pub namespace: String,
    /// Secret data stored as base64-encoded values.
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl Secret {
    fn decode(&self, key: &str) -> Result<Vec<u8>> {
        let Some(encoded) = self.data.get(key) else {
            bail!("secret {}/{}: missing key '{}'", self.namespace, self.name, key);
        };
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .with_context(|| format!("secret {}/{}: key '{}'", self.namespace, self.name, key))
    }

    /// PEM bundle (certificate chain followed by private key) as the load
    /// balancer expects it in a certificate slot.
    pub fn certificate_bundle(&self) -> Result<Vec<u8>> {
        let mut bundle = self.decode(TLS_CRT)?;
        if !bundle.ends_with(b"\n") {
            bundle.push(b'\n');
        }
        bundle.extend(self.decode(TLS_KEY)?);
        Ok(bundle)
    }
}
