//! Repositories for the credential store and the role/permission registry
//!
//! Each store is a trait so services can run against PostgreSQL in production
//! and against the in-memory implementation in tests and database-less
//! development. Every lookup ignores soft-deleted rows.

pub mod memory;
pub mod permission;
pub mod role;
pub mod user;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::{
    Actor, HttpMethod, NewPermission, NewRole, NewUser, Permission, PermissionChanges, Role,
    RoleChanges, User,
};

pub use memory::{MemoryPermissionStore, MemoryRoleStore, MemoryUserStore};
pub use permission::PermissionRepository;
pub use role::RoleRepository;
pub use user::UserRepository;

/// SQL predicate selecting rows that have not been soft-deleted
pub(crate) const LIVE: &str = "is_deleted = FALSE";

/// Repository error types
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Duplicate {0}")]
    Duplicate(&'static str),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl RepositoryError {
    /// Map unique-index violations onto `Duplicate`
    pub(crate) fn from_insert(err: sqlx::Error, what: &'static str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Duplicate(what)
            }
            _ => RepositoryError::DatabaseError(err),
        }
    }
}

/// Persisted user records
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    /// Find the user currently holding `token` as its refresh token
    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<User>, RepositoryError>;

    /// Overwrite (or clear) the stored refresh token
    async fn set_refresh_token(
        &self,
        id: Uuid,
        token: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Replace the stored refresh token only if it still equals `current`.
    /// Returns false when another writer got there first.
    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        current: &str,
        next: &str,
    ) -> Result<bool, RepositoryError>;

    async fn soft_delete(&self, id: Uuid, by: &Actor) -> Result<bool, RepositoryError>;
}

/// Persisted roles
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn insert(&self, role: NewRole) -> Result<Role, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Role>, RepositoryError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Role>, RepositoryError>;

    async fn update(
        &self,
        id: Uuid,
        changes: &RoleChanges,
        by: &Actor,
    ) -> Result<Role, RepositoryError>;

    async fn soft_delete(&self, id: Uuid, by: &Actor) -> Result<bool, RepositoryError>;
}

/// Persisted permission records
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn insert(&self, permission: NewPermission) -> Result<Permission, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Permission>, RepositoryError>;

    /// Live permissions among `ids`, in the order given
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Permission>, RepositoryError>;

    async fn find_by_route(
        &self,
        api_path: &str,
        method: HttpMethod,
    ) -> Result<Option<Permission>, RepositoryError>;

    async fn list(&self) -> Result<Vec<Permission>, RepositoryError>;

    async fn update(
        &self,
        id: Uuid,
        changes: &PermissionChanges,
        by: &Actor,
    ) -> Result<Permission, RepositoryError>;

    async fn soft_delete(&self, id: Uuid, by: &Actor) -> Result<bool, RepositoryError>;
}

/// The three stores the auth core works with
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub roles: Arc<dyn RoleStore>,
    pub permissions: Arc<dyn PermissionStore>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(UserRepository::new(pool.clone())),
            roles: Arc::new(RoleRepository::new(pool.clone())),
            permissions: Arc::new(PermissionRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        let roles = Arc::new(MemoryRoleStore::default());
        Self {
            users: Arc::new(MemoryUserStore::new(roles.clone())),
            roles,
            permissions: Arc::new(MemoryPermissionStore::default()),
        }
    }
}

/// Order `found` by the position of each id in `ids`, dropping unknown ids
pub(crate) fn order_by_ids(ids: &[Uuid], mut found: Vec<Permission>) -> Vec<Permission> {
    let mut ordered = Vec::with_capacity(found.len());
    for id in ids {
        if let Some(pos) = found.iter().position(|p| p.id == *id) {
            ordered.push(found.swap_remove(pos));
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn permission(id: Uuid) -> Permission {
        Permission {
            id,
            name: id.to_string(),
            api_path: "/api/v1/jobs".to_string(),
            method: HttpMethod::Get,
            module: "JOBS".to_string(),
            created_by: None,
            updated_by: None,
            deleted_by: None,
            is_deleted: false,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_order_by_ids_follows_requested_order() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let found = vec![permission(a), permission(b), permission(c)];

        let ordered = order_by_ids(&[c, a, Uuid::new_v4(), b], found);
        let ids: Vec<Uuid> = ordered.iter().map(|p| p.id).collect();

        assert_eq!(ids, vec![c, a, b]);
    }

    #[test]
    fn test_repository_error_display() {
        assert_eq!(RepositoryError::NotFound.to_string(), "Record not found");
        assert_eq!(
            RepositoryError::Duplicate("email").to_string(),
            "Duplicate email"
        );
    }
}
