//! User service
//!
//! Owns the credential store: registration, admin-facing user management and
//! the refresh-token bookkeeping the auth flows rely on.

use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use uuid::Uuid;

use crate::core::auth::password::{MAX_PASSWORD_BYTES, PasswordError, PasswordHasher};
use crate::core::db::models::{Actor, CompanySummary, NewUser, RoleRef, User, UserResponse};
use crate::core::db::repositories::{RepositoryError, RoleStore, UserStore};
use crate::core::http::{ErrorKind, error_response, parse_id};
use crate::core::registry::USER_ROLE;

/// User service error types
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Email {0} already exists, please use another email")]
    EmailTaken(String),

    #[error("{0}")]
    Protected(String),

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl UserError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UserError::InvalidId(_) => ErrorKind::InvalidId,
            UserError::NotFound(_) => ErrorKind::NotFound,
            UserError::EmailTaken(_) => ErrorKind::Conflict,
            UserError::Protected(_) => ErrorKind::Protected,
            UserError::Validation(_) => ErrorKind::BadRequest,
            UserError::InternalError(_) => ErrorKind::Internal,
        }
    }
}

impl From<RepositoryError> for UserError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => UserError::NotFound("User not found".to_string()),
            RepositoryError::Duplicate(field) => {
                UserError::Validation(format!("Duplicate {field}"))
            }
            RepositoryError::DatabaseError(e) => UserError::InternalError(e.to_string()),
        }
    }
}

impl From<PasswordError> for UserError {
    fn from(err: PasswordError) -> Self {
        UserError::InternalError(err.to_string())
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        error_response(self.kind(), self.to_string())
    }
}

/// Self-registration request
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub address: Option<String>,
}

/// Admin-facing user creation request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub role: Uuid,
    pub company: Option<CompanySummary>,
}

/// User service
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
    hasher: PasswordHasher,
    admin_email: Option<String>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RoleStore>,
        hasher: PasswordHasher,
        admin_email: Option<String>,
    ) -> Self {
        Self {
            users,
            roles,
            hasher,
            admin_email,
        }
    }

    /// Validate email format
    fn validate_email(email: &str) -> Result<(), UserError> {
        let invalid = || UserError::Validation(format!("Invalid email: {email}"));

        let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
        if local.is_empty() || domain.contains('@') || email.contains(char::is_whitespace) {
            return Err(invalid());
        }

        // Domain needs at least one dot and no empty labels
        if !domain.contains('.') || domain.split('.').any(str::is_empty) {
            return Err(invalid());
        }

        Ok(())
    }

    fn validate_new_user(name: &str, email: &str, password: &str) -> Result<(), UserError> {
        if name.trim().is_empty() {
            return Err(UserError::Validation("Name must not be empty".to_string()));
        }
        Self::validate_email(email)?;
        if password.is_empty() {
            return Err(UserError::Validation(
                "Password must not be empty".to_string(),
            ));
        }
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(UserError::Validation(format!(
                "Password must be at most {MAX_PASSWORD_BYTES} bytes"
            )));
        }
        Ok(())
    }

    async fn insert(&self, user: NewUser) -> Result<User, UserError> {
        let email = user.email.clone();
        self.users.insert(user).await.map_err(|e| match e {
            RepositoryError::Duplicate(_) => UserError::EmailTaken(email),
            other => other.into(),
        })
    }

    /// Register a user with the default role
    pub async fn register(&self, request: RegisterUser) -> Result<User, UserError> {
        let email = request.email.trim().to_string();
        Self::validate_new_user(&request.name, &email, &request.password)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(UserError::EmailTaken(email));
        }

        let role = self.roles.find_by_name(USER_ROLE).await?;
        if role.is_none() {
            tracing::warn!("Default role {} is missing, registering without a role", USER_ROLE);
        }

        let user = self
            .insert(NewUser {
                name: request.name.trim().to_string(),
                email,
                password_hash: self.hasher.hash(&request.password)?,
                age: request.age,
                gender: request.gender,
                address: request.address,
                role: role.map(|r| r.reference()),
                company: None,
                created_by: None,
            })
            .await?;

        tracing::info!("User registered: {}", user.email);

        Ok(user)
    }

    /// Create a user on behalf of an administrator
    pub async fn create_user(&self, request: CreateUser, by: &Actor) -> Result<User, UserError> {
        let email = request.email.trim().to_string();
        Self::validate_new_user(&request.name, &email, &request.password)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(UserError::EmailTaken(email));
        }

        let role = self
            .roles
            .find_by_id(request.role)
            .await?
            .ok_or_else(|| UserError::Validation(format!("Role {} not found", request.role)))?;

        let user = self
            .insert(NewUser {
                name: request.name.trim().to_string(),
                email,
                password_hash: self.hasher.hash(&request.password)?,
                age: request.age,
                gender: request.gender,
                address: request.address,
                role: Some(RoleRef {
                    id: role.id,
                    name: role.name,
                }),
                company: request.company,
                created_by: Some(by.clone()),
            })
            .await?;

        tracing::info!("User created: {} by {}", user.email, by.email);

        Ok(user)
    }

    /// User without credentials
    pub async fn find_user(&self, id: &str) -> Result<UserResponse, UserError> {
        let id = parse_id(id).ok_or_else(|| UserError::InvalidId(id.to_string()))?;

        self.users
            .find_by_id(id)
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| UserError::NotFound("User not found".to_string()))
    }

    /// Soft-delete a user; the configured admin account is protected
    pub async fn remove_user(&self, id: &str, by: &Actor) -> Result<(), UserError> {
        let id = parse_id(id).ok_or_else(|| UserError::InvalidId(id.to_string()))?;
        let user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| UserError::NotFound("User not found".to_string()))?;

        if self.admin_email.as_deref() == Some(user.email.as_str()) {
            return Err(UserError::Protected(
                "Can not remove account admin!".to_string(),
            ));
        }

        if !self.users.soft_delete(id, by).await? {
            return Err(UserError::NotFound("User not found".to_string()));
        }

        tracing::info!("User removed: {} by {}", user.email, by.email);

        Ok(())
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        Ok(self.users.find_by_email(email.trim()).await?)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserError> {
        Ok(self.users.find_by_id(id).await?)
    }

    pub fn is_valid_password(&self, password: &str, user: &User) -> bool {
        self.hasher.verify(password, &user.password_hash)
    }

    pub async fn find_by_refresh_token(&self, token: &str) -> Result<Option<User>, UserError> {
        Ok(self.users.find_by_refresh_token(token).await?)
    }

    pub async fn update_refresh_token(
        &self,
        id: Uuid,
        token: Option<&str>,
    ) -> Result<(), UserError> {
        Ok(self.users.set_refresh_token(id, token).await?)
    }

    /// Swap the stored refresh token; false when `current` is no longer stored
    pub async fn rotate_refresh_token(
        &self,
        id: Uuid,
        current: &str,
        next: &str,
    ) -> Result<bool, UserError> {
        Ok(self.users.rotate_refresh_token(id, current, next).await?)
    }
}
