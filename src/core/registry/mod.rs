//! Role/Permission registry
//!
//! Persisted roles and the (method, path) permission records they own, plus
//! the admin-facing endpoints that manage them.

pub mod api;
pub mod service;

pub use api::{RegistryApiState, registry_api_router};
pub use service::{
    ADMIN_ROLE, CreatePermission, CreateRole, RegistryError, RegistryService, USER_ROLE,
};
