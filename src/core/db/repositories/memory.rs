//! In-memory stores
//!
//! Used by tests and when no `DATABASE_URL` is configured. They mirror the
//! PostgreSQL repositories: soft-deleted rows are invisible, uniqueness only
//! applies to live rows, and refresh-token rotation is a compare-and-swap.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sqlx::types::Json;
use uuid::Uuid;

use super::{PermissionStore, RepositoryError, RoleStore, UserStore, order_by_ids};
use crate::core::db::models::{
    Actor, HttpMethod, NewPermission, NewRole, NewUser, Permission, PermissionChanges, Role,
    RoleChanges, SoftDelete, User,
};

// ============================================================================
// Roles
// ============================================================================

#[derive(Default)]
pub struct MemoryRoleStore {
    roles: DashMap<Uuid, Role>,
}

impl MemoryRoleStore {
    fn name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        self.roles
            .iter()
            .any(|r| !r.is_deleted() && r.name == name && Some(r.id) != except)
    }

    fn live_name(&self, id: Uuid) -> Option<String> {
        self.roles
            .get(&id)
            .filter(|r| !r.is_deleted())
            .map(|r| r.name.clone())
    }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    async fn insert(&self, role: NewRole) -> Result<Role, RepositoryError> {
        if self.name_taken(&role.name, None) {
            return Err(RepositoryError::Duplicate("role name"));
        }

        let now = Utc::now();
        let role = Role {
            id: Uuid::new_v4(),
            name: role.name,
            description: role.description,
            is_active: role.is_active,
            permission_ids: role.permission_ids,
            created_by: role.created_by.map(Json),
            updated_by: None,
            deleted_by: None,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.roles.insert(role.id, role.clone());

        Ok(role)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Role>, RepositoryError> {
        Ok(self
            .roles
            .get(&id)
            .filter(|r| !r.is_deleted())
            .map(|r| r.clone()))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Role>, RepositoryError> {
        Ok(self
            .roles
            .iter()
            .find(|r| !r.is_deleted() && r.name == name)
            .map(|r| r.clone()))
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &RoleChanges,
        by: &Actor,
    ) -> Result<Role, RepositoryError> {
        if let Some(name) = &changes.name
            && self.name_taken(name, Some(id))
        {
            return Err(RepositoryError::Duplicate("role name"));
        }

        let mut role = self
            .roles
            .get_mut(&id)
            .filter(|r| !r.is_deleted())
            .ok_or(RepositoryError::NotFound)?;

        if let Some(name) = &changes.name {
            role.name = name.clone();
        }
        if let Some(description) = &changes.description {
            role.description = description.clone();
        }
        if let Some(is_active) = changes.is_active {
            role.is_active = is_active;
        }
        if let Some(permissions) = &changes.permissions {
            role.permission_ids = permissions.clone();
        }
        role.updated_by = Some(Json(by.clone()));
        role.updated_at = Utc::now();

        Ok(role.clone())
    }

    async fn soft_delete(&self, id: Uuid, by: &Actor) -> Result<bool, RepositoryError> {
        Ok(mark_deleted(self.roles.get_mut(&id).as_deref_mut(), by))
    }
}

// ============================================================================
// Users
// ============================================================================

/// User store; role names are read through the role store like a join
pub struct MemoryUserStore {
    users: DashMap<Uuid, User>,
    roles: Arc<MemoryRoleStore>,
}

impl MemoryUserStore {
    pub fn new(roles: Arc<MemoryRoleStore>) -> Self {
        Self {
            users: DashMap::new(),
            roles,
        }
    }

    fn find_live(&self, matches: impl Fn(&User) -> bool) -> Option<User> {
        let mut user = self
            .users
            .iter()
            .find(|u| !u.is_deleted() && matches(u))
            .map(|u| u.clone())?;
        user.role_name = user.role_id.and_then(|id| self.roles.live_name(id));
        Some(user)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, RepositoryError> {
        if self.find_live(|u| u.email == user.email).is_some() {
            return Err(RepositoryError::Duplicate("email"));
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        let record = User {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            age: user.age,
            gender: user.gender,
            address: user.address,
            role_id: user.role.as_ref().map(|r| r.id),
            role_name: None,
            company_id: user.company.as_ref().map(|c| c.id),
            company_name: user.company.map(|c| c.name),
            refresh_token: None,
            created_by: user.created_by.map(Json),
            updated_by: None,
            deleted_by: None,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(id, record);

        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.find_live(|u| u.id == id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self.find_live(|u| u.email == email))
    }

    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self.find_live(|u| u.refresh_token.as_deref() == Some(token)))
    }

    async fn set_refresh_token(
        &self,
        id: Uuid,
        token: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut user = self
            .users
            .get_mut(&id)
            .filter(|u| !u.is_deleted())
            .ok_or(RepositoryError::NotFound)?;
        user.refresh_token = token.map(str::to_string);

        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        current: &str,
        next: &str,
    ) -> Result<bool, RepositoryError> {
        // The entry guard holds the shard lock across compare and swap
        let Some(mut user) = self.users.get_mut(&id) else {
            return Ok(false);
        };
        if user.is_deleted() || user.refresh_token.as_deref() != Some(current) {
            return Ok(false);
        }
        user.refresh_token = Some(next.to_string());

        Ok(true)
    }

    async fn soft_delete(&self, id: Uuid, by: &Actor) -> Result<bool, RepositoryError> {
        let mut entry = self.users.get_mut(&id);
        let deleted = mark_deleted(entry.as_deref_mut(), by);
        if deleted && let Some(user) = entry.as_deref_mut() {
            user.refresh_token = None;
        }

        Ok(deleted)
    }
}

// ============================================================================
// Permissions
// ============================================================================

#[derive(Default)]
pub struct MemoryPermissionStore {
    permissions: DashMap<Uuid, Permission>,
}

impl MemoryPermissionStore {
    fn route_taken(&self, api_path: &str, method: HttpMethod, except: Option<Uuid>) -> bool {
        self.permissions.iter().any(|p| {
            !p.is_deleted() && p.api_path == api_path && p.method == method && Some(p.id) != except
        })
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn insert(&self, permission: NewPermission) -> Result<Permission, RepositoryError> {
        if self.route_taken(&permission.api_path, permission.method, None) {
            return Err(RepositoryError::Duplicate("permission route"));
        }

        let now = Utc::now();
        let permission = Permission {
            id: Uuid::new_v4(),
            name: permission.name,
            api_path: permission.api_path,
            method: permission.method,
            module: permission.module,
            created_by: permission.created_by.map(Json),
            updated_by: None,
            deleted_by: None,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.permissions.insert(permission.id, permission.clone());

        Ok(permission)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Permission>, RepositoryError> {
        Ok(self
            .permissions
            .get(&id)
            .filter(|p| !p.is_deleted())
            .map(|p| p.clone()))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Permission>, RepositoryError> {
        let found = ids
            .iter()
            .filter_map(|id| self.permissions.get(id))
            .filter(|p| !p.is_deleted())
            .map(|p| p.clone())
            .collect();

        Ok(order_by_ids(ids, found))
    }

    async fn find_by_route(
        &self,
        api_path: &str,
        method: HttpMethod,
    ) -> Result<Option<Permission>, RepositoryError> {
        Ok(self
            .permissions
            .iter()
            .find(|p| !p.is_deleted() && p.api_path == api_path && p.method == method)
            .map(|p| p.clone()))
    }

    async fn list(&self) -> Result<Vec<Permission>, RepositoryError> {
        let mut permissions: Vec<Permission> = self
            .permissions
            .iter()
            .filter(|p| !p.is_deleted())
            .map(|p| p.clone())
            .collect();
        permissions.sort_by_key(|p| p.created_at);

        Ok(permissions)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &PermissionChanges,
        by: &Actor,
    ) -> Result<Permission, RepositoryError> {
        let current = self
            .find_by_id(id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let api_path = changes.api_path.as_deref().unwrap_or(&current.api_path);
        let method = changes.method.unwrap_or(current.method);
        if self.route_taken(api_path, method, Some(id)) {
            return Err(RepositoryError::Duplicate("permission route"));
        }

        let mut permission = self
            .permissions
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        if let Some(name) = &changes.name {
            permission.name = name.clone();
        }
        if let Some(api_path) = &changes.api_path {
            permission.api_path = api_path.clone();
        }
        if let Some(method) = changes.method {
            permission.method = method;
        }
        if let Some(module) = &changes.module {
            permission.module = module.clone();
        }
        permission.updated_by = Some(Json(by.clone()));
        permission.updated_at = Utc::now();

        Ok(permission.clone())
    }

    async fn soft_delete(&self, id: Uuid, by: &Actor) -> Result<bool, RepositoryError> {
        Ok(mark_deleted(self.permissions.get_mut(&id).as_deref_mut(), by))
    }
}

/// Soft-delete a live record; false if it was absent or already deleted
fn mark_deleted<T: SoftDelete>(record: Option<&mut T>, by: &Actor) -> bool {
    match record {
        Some(record) if !record.is_deleted() => {
            record.mark_deleted(by, Utc::now());
            true
        }
        _ => false,
    }
}
