//! Registry API endpoints
//!
//! - POST /roles - Create a role
//! - GET /roles/{id} - Get a role with its permissions
//! - PATCH /roles/{id} - Update a role
//! - DELETE /roles/{id} - Soft-delete a role (never ADMIN)
//! - POST /permissions - Create a permission
//! - GET /permissions - List permissions
//! - GET /permissions/{id} - Get a permission
//! - PATCH /permissions/{id} - Update a permission
//! - DELETE /permissions/{id} - Soft-delete a permission

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::auth::CurrentUser;
use crate::core::db::models::{Permission, PermissionChanges, RoleChanges, RoleWithPermissions};
use crate::core::http::MessageResponse;
use crate::core::registry::service::{
    CreatePermission, CreateRole, RegistryError, RegistryService,
};

/// Registry API state
#[derive(Clone)]
pub struct RegistryApiState {
    pub registry: RegistryService,
}

/// Response for created records
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResponse {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Create the registry API router
pub fn registry_api_router(state: RegistryApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/roles", post(create_role_handler))
        .route(
            "/roles/{id}",
            get(get_role_handler)
                .patch(update_role_handler)
                .delete(delete_role_handler),
        )
        .route(
            "/permissions",
            post(create_permission_handler).get(list_permissions_handler),
        )
        .route(
            "/permissions/{id}",
            get(get_permission_handler)
                .patch(update_permission_handler)
                .delete(delete_permission_handler),
        )
        .with_state(state)
}

// ============================================================================
// Roles
// ============================================================================

async fn create_role_handler(
    State(state): State<Arc<RegistryApiState>>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateRole>,
) -> Result<(StatusCode, Json<CreatedResponse>), RegistryError> {
    let role = state.registry.create_role(request, &user.actor()).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id: role.id,
            created_at: role.created_at,
        }),
    ))
}

async fn get_role_handler(
    State(state): State<Arc<RegistryApiState>>,
    Path(id): Path<String>,
) -> Result<Json<RoleWithPermissions>, RegistryError> {
    Ok(Json(state.registry.find_role(&id).await?))
}

async fn update_role_handler(
    State(state): State<Arc<RegistryApiState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(changes): Json<RoleChanges>,
) -> Result<Json<RoleWithPermissions>, RegistryError> {
    let role = state
        .registry
        .update_role(&id, changes, &user.actor())
        .await?;

    Ok(Json(state.registry.find_role(&role.id.to_string()).await?))
}

async fn delete_role_handler(
    State(state): State<Arc<RegistryApiState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, RegistryError> {
    state.registry.remove_role(&id, &user.actor()).await?;

    Ok(Json(MessageResponse::new("Role removed")))
}

// ============================================================================
// Permissions
// ============================================================================

async fn create_permission_handler(
    State(state): State<Arc<RegistryApiState>>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreatePermission>,
) -> Result<(StatusCode, Json<CreatedResponse>), RegistryError> {
    let permission = state
        .registry
        .create_permission(request, &user.actor())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id: permission.id,
            created_at: permission.created_at,
        }),
    ))
}

async fn list_permissions_handler(
    State(state): State<Arc<RegistryApiState>>,
) -> Result<Json<Vec<Permission>>, RegistryError> {
    Ok(Json(state.registry.list_permissions().await?))
}

async fn get_permission_handler(
    State(state): State<Arc<RegistryApiState>>,
    Path(id): Path<String>,
) -> Result<Json<Permission>, RegistryError> {
    Ok(Json(state.registry.find_permission(&id).await?))
}

async fn update_permission_handler(
    State(state): State<Arc<RegistryApiState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(changes): Json<PermissionChanges>,
) -> Result<Json<Permission>, RegistryError> {
    let permission = state
        .registry
        .update_permission(&id, changes, &user.actor())
        .await?;

    Ok(Json(permission))
}

async fn delete_permission_handler(
    State(state): State<Arc<RegistryApiState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, RegistryError> {
    state
        .registry
        .remove_permission(&id, &user.actor())
        .await?;

    Ok(Json(MessageResponse::new("Permission removed")))
}
