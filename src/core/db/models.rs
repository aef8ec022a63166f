//! Database models for the job board
//!
//! This module defines the records the auth core reads and writes. Every table
//! carries the same audit fields and an explicit soft-delete triple
//! (`is_deleted`, `deleted_at`, `deleted_by`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

// ============================================================================
// Shared value types
// ============================================================================

/// Acting identity recorded in audit fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub email: String,
}

impl Actor {
    pub fn new(id: Uuid, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
        }
    }
}

/// Company summary embedded in a user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
}

/// Point-in-time reference to a role, as carried in token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRef {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
}

/// HTTP methods a permission can grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Map a request method; methods no permission can grant yield `None`
    pub fn from_method(method: &axum::http::Method) -> Option<Self> {
        method.as_str().parse().ok()
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PATCH" => Ok(HttpMethod::Patch),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(format!("Invalid method: {}", s)),
        }
    }
}

/// Records that are never physically removed
pub trait SoftDelete {
    fn is_deleted(&self) -> bool;

    fn mark_deleted(&mut self, by: &Actor, at: DateTime<Utc>);
}

macro_rules! impl_soft_delete {
    ($($ty:ty),*) => {
        $(
            impl SoftDelete for $ty {
                fn is_deleted(&self) -> bool {
                    self.is_deleted
                }

                fn mark_deleted(&mut self, by: &Actor, at: DateTime<Utc>) {
                    self.is_deleted = true;
                    self.deleted_at = Some(at);
                    self.deleted_by = Some(Json(by.clone()));
                }
            }
        )*
    };
}

// ============================================================================
// User Model
// ============================================================================

/// User entity; `role_name` is joined from the roles table
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub role_id: Option<Uuid>,
    pub role_name: Option<String>,
    pub company_id: Option<Uuid>,
    pub company_name: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub created_by: Option<Json<Actor>>,
    pub updated_by: Option<Json<Actor>>,
    pub deleted_by: Option<Json<Actor>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Option<RoleRef> {
        match (self.role_id, &self.role_name) {
            (Some(id), Some(name)) => Some(RoleRef {
                id,
                name: name.clone(),
            }),
            _ => None,
        }
    }

    pub fn company(&self) -> Option<CompanySummary> {
        match (self.company_id, &self.company_name) {
            (Some(id), Some(name)) => Some(CompanySummary {
                id,
                name: name.clone(),
            }),
            _ => None,
        }
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.email.clone())
    }
}

/// User data for creation (password must already be hashed)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub role: Option<RoleRef>,
    pub company: Option<CompanySummary>,
    pub created_by: Option<Actor>,
}

/// User without credentials (for API responses)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub role: Option<RoleRef>,
    pub company: Option<CompanySummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            role: user.role(),
            company: user.company(),
            id: user.id,
            name: user.name,
            email: user.email,
            age: user.age,
            gender: user.gender,
            address: user.address,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// ============================================================================
// Role Model
// ============================================================================

/// Role entity owning an ordered list of permission ids
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub permission_ids: Vec<Uuid>,
    pub created_by: Option<Json<Actor>>,
    pub updated_by: Option<Json<Actor>>,
    pub deleted_by: Option<Json<Actor>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn reference(&self) -> RoleRef {
        RoleRef {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// Role data for creation
#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub permission_ids: Vec<Uuid>,
    pub created_by: Option<Actor>,
}

/// Role data for updates
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RoleChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub permissions: Option<Vec<Uuid>>,
}

/// Role with its permissions resolved to summaries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleWithPermissions {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub permissions: Vec<PermissionSummary>,
}

// ============================================================================
// Permission Model
// ============================================================================

/// Permission entity: one authorizable (method, path) endpoint
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub api_path: String,
    pub method: HttpMethod,
    pub module: String,
    pub created_by: Option<Json<Actor>>,
    pub updated_by: Option<Json<Actor>>,
    pub deleted_by: Option<Json<Actor>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Permission data for creation
#[derive(Debug, Clone)]
pub struct NewPermission {
    pub name: String,
    pub api_path: String,
    pub method: HttpMethod,
    pub module: String,
    pub created_by: Option<Actor>,
}

/// Permission data for updates
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PermissionChanges {
    pub name: Option<String>,
    pub api_path: Option<String>,
    pub method: Option<HttpMethod>,
    pub module: Option<String>,
}

/// Projection of a permission attached to identities and roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub api_path: String,
    pub method: HttpMethod,
    pub module: String,
}

impl From<&Permission> for PermissionSummary {
    fn from(permission: &Permission) -> Self {
        Self {
            id: permission.id,
            name: permission.name.clone(),
            api_path: permission.api_path.clone(),
            method: permission.method,
            module: permission.module.clone(),
        }
    }
}

impl_soft_delete!(User, Role, Permission);

// ============================================================================
// Tests
// ============================================================================
