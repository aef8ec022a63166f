//! Jobboard - authentication and authorization core
//!
//! Credential store, two-secret JWT session tokens with refresh rotation,
//! a role/permission registry and the per-request gate that enforces it.

pub mod app;
pub mod core;
