use anyhow::{Result, bail};

/// Validate a Kubernetes-style object name.
/// Rules: lowercase `[a-z0-9.-]`, max 253 chars, must start and end alphanumeric.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("name must not be empty");
    }
    if name.len() > 253 {
        bail!("name '{}' exceeds 253 characters (got {})", name, name.len());
    }
    let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !edge_ok(name.chars().next()) || !edge_ok(name.chars().last()) {
        bail!("name '{}' must start and end with a letter or digit", name);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        bail!(
            "name '{}' must contain only lowercase letters, digits, '-' and '.'",
            name
        );
    }
    Ok(())
}

/// Parse an object reference of the form `namespace/name` or `name`.
/// A bare name is placed in `default_namespace`.
pub fn parse_k8s_path(value: &str, default_namespace: &str) -> Result<(String, String)> {
    let value = value.trim();
    let (namespace, name) = match value.split_once('/') {
        Some((ns, name)) => (ns, name),
        None => (default_namespace, value),
    };
    if name.contains('/') {
        bail!("invalid object reference '{}'", value);
    }
    validate_name(namespace)?;
    validate_name(name)?;
    Ok((namespace.to_string(), name.to_string()))
}
