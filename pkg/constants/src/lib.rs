//! Centralized constants for lbsync.
//!
//! Option keys, load-balancer entity names and built-in defaults live here.
//! Change a value in one place and it applies everywhere.

pub mod annotations;
pub mod lb;
pub mod paths;
pub mod state;
