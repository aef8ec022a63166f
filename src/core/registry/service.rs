//! Role/Permission registry service
//!
//! Roles own an ordered list of permission ids. The gate and the token flows
//! resolve those ids to live permission summaries on every call, so a
//! permission change is visible on the next request.

use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use uuid::Uuid;

use crate::core::db::models::{
    Actor, HttpMethod, NewPermission, NewRole, Permission, PermissionChanges, PermissionSummary,
    Role, RoleChanges, RoleRef, RoleWithPermissions,
};
use crate::core::db::repositories::{PermissionStore, RepositoryError, RoleStore};
use crate::core::http::{ErrorKind, error_response, parse_id};

/// Role that can never be removed or renamed
pub const ADMIN_ROLE: &str = "ADMIN";

/// Role assigned to self-registered users
pub const USER_ROLE: &str = "NORMAL_USER";

/// Registry error types
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Protected(String),

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::InvalidId(_) => ErrorKind::InvalidId,
            RegistryError::NotFound(_) => ErrorKind::NotFound,
            RegistryError::Conflict(_) => ErrorKind::Conflict,
            RegistryError::Protected(_) => ErrorKind::Protected,
            RegistryError::Validation(_) => ErrorKind::BadRequest,
            RegistryError::InternalError(_) => ErrorKind::Internal,
        }
    }

    fn from_store(err: RepositoryError, what: &str) -> Self {
        match err {
            RepositoryError::NotFound => RegistryError::NotFound(format!("{what} not found")),
            RepositoryError::Duplicate(field) => {
                RegistryError::Conflict(format!("{what} with this {field} already exists"))
            }
            RepositoryError::DatabaseError(e) => RegistryError::InternalError(e.to_string()),
        }
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        error_response(self.kind(), self.to_string())
    }
}

/// Request for creating a role
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRole {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub permissions: Vec<Uuid>,
}

fn default_active() -> bool {
    true
}

/// Request for creating a permission
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermission {
    pub name: String,
    pub api_path: String,
    pub method: HttpMethod,
    pub module: String,
}

/// Role and permission registry
#[derive(Clone)]
pub struct RegistryService {
    roles: Arc<dyn RoleStore>,
    permissions: Arc<dyn PermissionStore>,
}

impl RegistryService {
    pub fn new(roles: Arc<dyn RoleStore>, permissions: Arc<dyn PermissionStore>) -> Self {
        Self { roles, permissions }
    }

    fn parse(raw: &str) -> Result<Uuid, RegistryError> {
        parse_id(raw).ok_or_else(|| RegistryError::InvalidId(raw.to_string()))
    }

    fn require(field: &str, value: &str) -> Result<(), RegistryError> {
        if value.trim().is_empty() {
            return Err(RegistryError::Validation(format!("{field} must not be empty")));
        }
        Ok(())
    }

    // ========================================================================
    // Roles
    // ========================================================================

    /// Role with its permissions resolved to summaries
    pub async fn find_role(&self, id: &str) -> Result<RoleWithPermissions, RegistryError> {
        let id = Self::parse(id)?;
        let role = self.live_role(id).await?;
        let permissions = self.summaries(&role.permission_ids).await?;

        Ok(RoleWithPermissions {
            id: role.id,
            name: role.name,
            description: role.description,
            is_active: role.is_active,
            permissions,
        })
    }

    pub async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, RegistryError> {
        self.roles
            .find_by_name(name)
            .await
            .map_err(|e| RegistryError::from_store(e, "Role"))
    }

    /// Live permissions of `role`. A missing or deleted role grants nothing.
    pub async fn role_permissions(
        &self,
        role: Option<&RoleRef>,
    ) -> Result<Vec<PermissionSummary>, RegistryError> {
        let Some(role) = role else {
            return Ok(Vec::new());
        };

        let found = self
            .roles
            .find_by_id(role.id)
            .await
            .map_err(|e| RegistryError::from_store(e, "Role"))?;

        match found {
            Some(role) => self.summaries(&role.permission_ids).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn create_role(&self, request: CreateRole, by: &Actor) -> Result<Role, RegistryError> {
        Self::require("name", &request.name)?;

        let role = self
            .roles
            .insert(NewRole {
                name: request.name.trim().to_string(),
                description: request.description,
                is_active: request.is_active,
                permission_ids: request.permissions,
                created_by: Some(by.clone()),
            })
            .await
            .map_err(|e| RegistryError::from_store(e, "Role"))?;

        tracing::info!("Role created: {} by {}", role.name, by.email);

        Ok(role)
    }

    pub async fn update_role(
        &self,
        id: &str,
        mut changes: RoleChanges,
        by: &Actor,
    ) -> Result<Role, RegistryError> {
        let id = Self::parse(id)?;
        let current = self.live_role(id).await?;

        if let Some(name) = changes.name.as_mut() {
            Self::require("name", name)?;
            *name = name.trim().to_string();
            if current.name == ADMIN_ROLE && name != ADMIN_ROLE {
                return Err(RegistryError::Protected(
                    "Can not rename role admin".to_string(),
                ));
            }
        }

        let role = self
            .roles
            .update(id, &changes, by)
            .await
            .map_err(|e| RegistryError::from_store(e, "Role"))?;

        tracing::info!("Role updated: {} by {}", role.name, by.email);

        Ok(role)
    }

    pub async fn remove_role(&self, id: &str, by: &Actor) -> Result<(), RegistryError> {
        let id = Self::parse(id)?;
        let role = self.live_role(id).await?;

        if role.name == ADMIN_ROLE {
            return Err(RegistryError::Protected(
                "Can not remove role admin".to_string(),
            ));
        }

        let removed = self
            .roles
            .soft_delete(id, by)
            .await
            .map_err(|e| RegistryError::from_store(e, "Role"))?;
        if !removed {
            return Err(RegistryError::NotFound("Role not found".to_string()));
        }

        tracing::info!("Role removed: {} by {}", role.name, by.email);

        Ok(())
    }

    async fn live_role(&self, id: Uuid) -> Result<Role, RegistryError> {
        self.roles
            .find_by_id(id)
            .await
            .map_err(|e| RegistryError::from_store(e, "Role"))?
            .ok_or_else(|| RegistryError::NotFound("Role not found".to_string()))
    }

    async fn summaries(&self, ids: &[Uuid]) -> Result<Vec<PermissionSummary>, RegistryError> {
        let permissions = self
            .permissions
            .find_by_ids(ids)
            .await
            .map_err(|e| RegistryError::from_store(e, "Permission"))?;

        Ok(permissions.iter().map(PermissionSummary::from).collect())
    }

    // ========================================================================
    // Permissions
    // ========================================================================

    pub async fn create_permission(
        &self,
        request: CreatePermission,
        by: &Actor,
    ) -> Result<Permission, RegistryError> {
        Self::require("name", &request.name)?;
        Self::require("apiPath", &request.api_path)?;
        Self::require("module", &request.module)?;

        let permission = self
            .permissions
            .insert(NewPermission {
                name: request.name,
                api_path: request.api_path.trim().to_string(),
                method: request.method,
                module: request.module,
                created_by: Some(by.clone()),
            })
            .await
            .map_err(|e| RegistryError::from_store(e, "Permission"))?;

        tracing::info!(
            "Permission created: {} {} by {}",
            permission.method,
            permission.api_path,
            by.email
        );

        Ok(permission)
    }

    pub async fn find_permission(&self, id: &str) -> Result<Permission, RegistryError> {
        let id = Self::parse(id)?;

        self.permissions
            .find_by_id(id)
            .await
            .map_err(|e| RegistryError::from_store(e, "Permission"))?
            .ok_or_else(|| RegistryError::NotFound("Permission not found".to_string()))
    }

    pub async fn list_permissions(&self) -> Result<Vec<Permission>, RegistryError> {
        self.permissions
            .list()
            .await
            .map_err(|e| RegistryError::from_store(e, "Permission"))
    }

    pub async fn update_permission(
        &self,
        id: &str,
        changes: PermissionChanges,
        by: &Actor,
    ) -> Result<Permission, RegistryError> {
        let id = Self::parse(id)?;
        if let Some(path) = &changes.api_path {
            Self::require("apiPath", path)?;
        }

        let permission = self
            .permissions
            .update(id, &changes, by)
            .await
            .map_err(|e| RegistryError::from_store(e, "Permission"))?;

        tracing::info!("Permission updated: {} by {}", permission.id, by.email);

        Ok(permission)
    }

    pub async fn remove_permission(&self, id: &str, by: &Actor) -> Result<(), RegistryError> {
        let id = Self::parse(id)?;

        let removed = self
            .permissions
            .soft_delete(id, by)
            .await
            .map_err(|e| RegistryError::from_store(e, "Permission"))?;
        if !removed {
            return Err(RegistryError::NotFound("Permission not found".to_string()));
        }

        tracing::info!("Permission removed: {} by {}", id, by.email);

        Ok(())
    }
}
