//! Request identity
//!
//! The gate attaches an [`Identity`] to the request extensions once the access
//! token is validated and the role's live permissions are resolved. Handlers
//! read it back with the [`CurrentUser`] extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::auth::service::AuthError;
use crate::core::db::models::{Actor, PermissionSummary, RoleRef, User};

/// Authenticated caller with its role's current permissions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Option<RoleRef>,
    #[serde(default)]
    pub permissions: Vec<PermissionSummary>,
}

impl Identity {
    /// Identity of a stored user; permissions are resolved separately
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role(),
            permissions: Vec::new(),
        }
    }

    pub fn with_permissions(mut self, permissions: Vec<PermissionSummary>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Audit actor for records this identity creates or changes
    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.email.clone())
    }
}

/// Extractor for the identity the gate attached to the request
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AuthError::Unauthorized)
    }
}
