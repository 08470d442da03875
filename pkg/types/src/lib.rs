//! Data types shared by the lbsync crates.
//!
//! Cluster-side objects (Services, Ingresses, ConfigMaps, Secrets, Endpoints,
//! custom resources) and the load-balancer configuration models they are
//! reconciled into.

pub mod backend;
pub mod config;
pub mod configmap;
pub mod custom_resource;
pub mod defaults;
pub mod endpoint;
pub mod frontend;
pub mod global;
pub mod ingress;
pub mod secret;
pub mod service;
pub mod validate;

/// Ordered string map used for annotations and ConfigMap data.
pub type Annotations = std::collections::BTreeMap<String, String>;
