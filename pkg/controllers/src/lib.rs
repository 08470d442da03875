//! Reconciliation core: turns a cluster snapshot into load-balancer
//! configuration and reports whether the balancer must reload or restart.

pub mod annotations;
pub mod backend;
pub mod classifier;
pub mod controller;
pub mod default_backend;
pub mod diagnostics;
pub mod endpoints;
pub mod error;
pub mod global;
pub mod locks;
pub mod pass;
pub mod resolver;
pub mod snippets;

pub use classifier::Action;
pub use controller::LoadBalancerController;
pub use pass::{ControllerSettings, PassReport, run_pass};
