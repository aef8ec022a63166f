//! Auth API endpoints
//!
//! Provides REST API endpoints for authentication:
//! - POST /auth/login - Login, sets the `refresh_token` cookie
//! - POST /auth/register - Register a new user
//! - GET /auth/account - Current identity with live permissions
//! - GET /auth/refresh - Rotate the refresh token from the cookie
//! - POST /auth/logout - Revoke the refresh token and clear the cookie

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Serialize;
use std::sync::Arc;

use crate::core::auth::identity::{CurrentUser, Identity};
use crate::core::auth::service::{
    AuthError, AuthService, LoginRequest, RegisterResponse, Session,
};
use crate::core::http::{MessageResponse, error_response};
use crate::core::users::RegisterUser;

/// Name of the HTTP-only refresh token cookie
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Auth API state containing the auth service
#[derive(Clone)]
pub struct AuthApiState {
    pub auth_service: AuthService,
}

/// Convert AuthError to API response
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        error_response(self.kind(), self.to_string())
    }
}

/// Response for login and refresh
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(flatten)]
    pub user: Identity,
}

/// Response for the account endpoint
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub user: Identity,
}

/// Create the auth API router
pub fn auth_api_router(state: AuthApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/auth/login", post(login_handler))
        .route("/auth/register", post(register_handler))
        .route("/auth/account", get(account_handler))
        .route("/auth/refresh", get(refresh_handler))
        .route("/auth/logout", post(logout_handler))
        .with_state(state)
}

fn refresh_cookie(token: String, max_age: chrono::Duration) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .path("/")
        .max_age(time::Duration::seconds(max_age.num_seconds()))
        .build()
}

fn expired_refresh_cookie() -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE).path("/").build()
}

/// Hand the session's refresh token to the client as a cookie
fn session_response(
    state: &AuthApiState,
    jar: CookieJar,
    session: Session,
) -> (CookieJar, Json<LoginResponse>) {
    let max_age = state.auth_service.jwt().refresh_ttl();
    let jar = jar
        .remove(expired_refresh_cookie())
        .add(refresh_cookie(session.refresh_token, max_age));

    (
        jar,
        Json(LoginResponse {
            access_token: session.access_token,
            user: session.identity,
        }),
    )
}

/// POST /auth/login
async fn login_handler(
    State(state): State<Arc<AuthApiState>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AuthError> {
    tracing::info!("Login attempt for email: {}", request.username);

    let session = state.auth_service.authenticate(&request).await?;

    Ok(session_response(&state, jar, session))
}

/// POST /auth/register
async fn register_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(request): Json<RegisterUser>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    tracing::info!("Registration attempt for email: {}", request.email);

    let response = state.auth_service.register(request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /auth/account
async fn account_handler(
    State(state): State<Arc<AuthApiState>>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<AccountResponse>, AuthError> {
    let user = state.auth_service.account(identity).await?;

    Ok(Json(AccountResponse { user }))
}

/// GET /auth/refresh
async fn refresh_handler(
    State(state): State<Arc<AuthApiState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<LoginResponse>), AuthError> {
    tracing::debug!("Token refresh request");

    let presented = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(AuthError::refresh_invalid)?;

    let session = state.auth_service.refresh(&presented).await?;

    Ok(session_response(&state, jar, session))
}

/// POST /auth/logout
///
/// The cookie is cleared even when the store update fails.
async fn logout_handler(
    State(state): State<Arc<AuthApiState>>,
    CurrentUser(identity): CurrentUser,
    jar: CookieJar,
) -> Response {
    let jar = jar.remove(expired_refresh_cookie());

    match state.auth_service.logout(&identity).await {
        Ok(()) => (jar, Json(MessageResponse::new("ok"))).into_response(),
        Err(e) => (jar, e).into_response(),
    }
}
