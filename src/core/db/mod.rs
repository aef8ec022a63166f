//! Database module for the job board auth core
//!
//! This module provides database connectivity, models, and the store traits
//! with their PostgreSQL and in-memory implementations.

pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used items
pub use models::*;
pub use pool::{DbConfig, DbError, connect};
pub use repositories::{
    PermissionStore, RepositoryError, RoleStore, Stores, UserStore,
};

// Re-export sqlx types that might be needed
pub use sqlx::PgPool;
