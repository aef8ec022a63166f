//! User management API endpoints
//!
//! - POST /users - Create a user (admin)
//! - GET /users/{id} - Get a user
//! - DELETE /users/{id} - Soft-delete a user

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;

use crate::core::auth::CurrentUser;
use crate::core::db::models::UserResponse;
use crate::core::http::MessageResponse;
use crate::core::registry::api::CreatedResponse;
use crate::core::users::service::{CreateUser, UserError, UserService};

/// User API state
#[derive(Clone)]
pub struct UserApiState {
    pub user_service: UserService,
}

/// Create the user management router
pub fn user_api_router(state: UserApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/users", post(create_user_handler))
        .route(
            "/users/{id}",
            get(get_user_handler).delete(delete_user_handler),
        )
        .with_state(state)
}

async fn create_user_handler(
    State(state): State<Arc<UserApiState>>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateUser>,
) -> Result<(StatusCode, Json<CreatedResponse>), UserError> {
    let created = state
        .user_service
        .create_user(request, &user.actor())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id: created.id,
            created_at: created.created_at,
        }),
    ))
}

async fn get_user_handler(
    State(state): State<Arc<UserApiState>>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, UserError> {
    Ok(Json(state.user_service.find_user(&id).await?))
}

async fn delete_user_handler(
    State(state): State<Arc<UserApiState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, UserError> {
    state.user_service.remove_user(&id, &user.actor()).await?;

    Ok(Json(MessageResponse::new("User removed")))
}
