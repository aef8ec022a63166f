//! Authentication service
//!
//! Provides business logic for login, registration, token refresh, logout and
//! the account view. Coordinates between the user service, the role registry
//! and the JWT service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::auth::identity::Identity;
use crate::core::auth::jwt::{JwtError, JwtService, TokenOrigin};
use crate::core::db::models::User;
use crate::core::http::ErrorKind;
use crate::core::registry::{RegistryError, RegistryService};
use crate::core::users::{RegisterUser, UserError, UserService};

const REFRESH_INVALID: &str = "Refresh token invalid, please login again";

/// Authentication service error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    InvalidToken(String),

    #[error("Token is invalid")]
    Unauthorized,

    #[error("You do not have permission to access this endpoint")]
    Forbidden,

    #[error(transparent)]
    User(#[from] UserError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredentials => ErrorKind::InvalidCredentials,
            AuthError::InvalidToken(_) => ErrorKind::InvalidToken,
            AuthError::Unauthorized => ErrorKind::Unauthorized,
            AuthError::Forbidden => ErrorKind::Forbidden,
            AuthError::User(err) => err.kind(),
            AuthError::Registry(err) => err.kind(),
            AuthError::InternalError(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn refresh_invalid() -> Self {
        AuthError::InvalidToken(REFRESH_INVALID.to_string())
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired | JwtError::InvalidToken | JwtError::InvalidTokenType => {
                AuthError::refresh_invalid()
            }
            _ => AuthError::InternalError(err.to_string()),
        }
    }
}

/// Login request data
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Result of login and refresh: the pair plus the caller's identity
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub identity: Identity,
}

/// Registration response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    users: UserService,
    registry: RegistryService,
    jwt: JwtService,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(users: UserService, registry: RegistryService, jwt: JwtService) -> Self {
        Self {
            users,
            registry,
            jwt,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Check credentials. Unknown email and wrong password are indistinguishable.
    pub async fn validate_user(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.users.is_valid_password(password, &user) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Issue a token pair and make its refresh token the only valid one
    pub async fn login(&self, user: &User) -> Result<Session, AuthError> {
        let identity = Identity::from_user(user);

        let access_token = self.jwt.issue_access_token(&identity, TokenOrigin::Login)?;
        let refresh_token = self.jwt.issue_refresh_token(&identity, TokenOrigin::Login)?;

        self.users
            .update_refresh_token(user.id, Some(&refresh_token))
            .await?;

        let permissions = self.registry.role_permissions(identity.role.as_ref()).await?;

        tracing::info!("User logged in: {}", user.email);

        Ok(Session {
            access_token,
            refresh_token,
            identity: identity.with_permissions(permissions),
        })
    }

    /// Validate credentials then log in
    pub async fn authenticate(&self, request: &LoginRequest) -> Result<Session, AuthError> {
        let user = self
            .validate_user(&request.username, &request.password)
            .await?;
        self.login(&user).await
    }

    /// Register a new user with the default role
    pub async fn register(&self, request: RegisterUser) -> Result<RegisterResponse, AuthError> {
        let user = self.users.register(request).await?;

        Ok(RegisterResponse {
            id: user.id,
            created_at: user.created_at,
        })
    }

    /// Exchange a stored refresh token for a new pair. The presented token is
    /// single-use: rotation only succeeds while it is still the stored value.
    pub async fn refresh(&self, presented: &str) -> Result<Session, AuthError> {
        if let Err(e) = self.jwt.validate_refresh_token(presented) {
            tracing::debug!("Refresh token rejected: {}", e);
            return Err(AuthError::refresh_invalid());
        }

        let user = self
            .users
            .find_by_refresh_token(presented)
            .await?
            .ok_or_else(AuthError::refresh_invalid)?;

        let identity = Identity::from_user(&user);
        let refresh_token = self
            .jwt
            .issue_refresh_token(&identity, TokenOrigin::Refresh)?;

        let rotated = self
            .users
            .rotate_refresh_token(user.id, presented, &refresh_token)
            .await?;
        if !rotated {
            tracing::debug!("Refresh token for {} was rotated concurrently", user.email);
            return Err(AuthError::refresh_invalid());
        }

        let access_token = self
            .jwt
            .issue_access_token(&identity, TokenOrigin::Refresh)?;
        let permissions = self.registry.role_permissions(identity.role.as_ref()).await?;

        tracing::info!("Refresh token rotated for {}", user.email);

        Ok(Session {
            access_token,
            refresh_token,
            identity: identity.with_permissions(permissions),
        })
    }

    /// Clear the stored refresh token. Repeating it is harmless, and so is a
    /// user removed since the access token was issued (removal already
    /// cleared the token).
    pub async fn logout(&self, identity: &Identity) -> Result<(), AuthError> {
        match self.users.update_refresh_token(identity.id, None).await {
            Ok(()) | Err(UserError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        tracing::info!("User logged out: {}", identity.email);

        Ok(())
    }

    /// The caller's identity with freshly resolved permissions
    pub async fn account(&self, identity: Identity) -> Result<Identity, AuthError> {
        let permissions = self.registry.role_permissions(identity.role.as_ref()).await?;
        Ok(identity.with_permissions(permissions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::jwt::JwtConfig;
    use crate::core::auth::password::PasswordHasher;
    use crate::core::db::models::{Actor, HttpMethod, NewPermission, NewRole};
    use crate::core::db::repositories::Stores;
    use crate::core::registry::USER_ROLE;

    async fn create_test_service() -> AuthService {
        let stores = Stores::in_memory();
        let permission = stores
            .permissions
            .insert(NewPermission {
                name: "List jobs".to_string(),
                api_path: "/jobs".to_string(),
                method: HttpMethod::Get,
                module: "JOBS".to_string(),
                created_by: None,
            })
            .await
            .unwrap();
        stores
            .roles
            .insert(NewRole {
                name: USER_ROLE.to_string(),
                description: String::new(),
                is_active: true,
                permission_ids: vec![permission.id],
                created_by: None,
            })
            .await
            .unwrap();

        let users = UserService::new(
            stores.users.clone(),
            stores.roles.clone(),
            PasswordHasher::new(4),
            None,
        );
        let registry = RegistryService::new(stores.roles, stores.permissions);
        let jwt = JwtService::new(JwtConfig::new("access-secret", "refresh-secret"));

        AuthService::new(users, registry, jwt)
    }

    fn register_user(email: &str, password: &str) -> RegisterUser {
        RegisterUser {
            name: "Ana".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            age: None,
            gender: None,
            address: None,
        }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: email.to_string(),
            password: password.to_string(),
        }
    }

    // ========================================================================
    // Error Tests
    // ========================================================================

    #[test]
    fn test_auth_error_kinds() {
        assert_eq!(AuthError::InvalidCredentials.kind(), ErrorKind::InvalidCredentials);
        assert_eq!(AuthError::Unauthorized.kind(), ErrorKind::Unauthorized);
        assert_eq!(AuthError::Forbidden.kind(), ErrorKind::Forbidden);
        assert_eq!(
            AuthError::from(UserError::EmailTaken("a@x.com".to_string())).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            AuthError::from(RegistryError::InvalidId("x".to_string())).kind(),
            ErrorKind::InvalidId
        );
    }

    #[test]
    fn test_jwt_error_conversion() {
        assert!(matches!(
            AuthError::from(JwtError::Expired),
            AuthError::InvalidToken(_)
        ));
        assert!(matches!(
            AuthError::from(JwtError::EncodingError("boom".to_string())),
            AuthError::InternalError(_)
        ));
        assert_eq!(AuthError::refresh_invalid().to_string(), REFRESH_INVALID);
    }

    // ========================================================================
    // Flow Tests
    // ========================================================================

    #[tokio::test]
    async fn test_login_after_register() {
        let service = create_test_service().await;
        service.register(register_user("a@x.com", "pw1")).await.unwrap();

        let session = service.authenticate(&login("a@x.com", "pw1")).await.unwrap();

        assert!(!session.access_token.is_empty());
        assert!(!session.refresh_token.is_empty());
        assert_eq!(session.identity.email, "a@x.com");
        assert_eq!(session.identity.permissions.len(), 1);
        assert_eq!(session.identity.permissions[0].api_path, "/jobs");

        let claims = service
            .jwt()
            .validate_access_token(&session.access_token)
            .unwrap();
        assert_eq!(claims.sub, "token login");
        assert_eq!(claims.role.map(|r| r.name), Some(USER_ROLE.to_string()));
    }

    #[tokio::test]
    async fn test_invalid_credentials_are_indistinguishable() {
        let service = create_test_service().await;
        service.register(register_user("a@x.com", "pw1")).await.unwrap();

        let wrong_password = service
            .authenticate(&login("a@x.com", "pw2"))
            .await
            .unwrap_err();
        let unknown_email = service
            .authenticate(&login("b@x.com", "pw1"))
            .await
            .unwrap_err();

        assert_eq!(wrong_password.kind(), ErrorKind::InvalidCredentials);
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert_eq!(unknown_email.kind(), ErrorKind::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_new_login_supersedes_previous_refresh_token() {
        let service = create_test_service().await;
        service.register(register_user("a@x.com", "pw1")).await.unwrap();

        let first = service.authenticate(&login("a@x.com", "pw1")).await.unwrap();
        let second = service.authenticate(&login("a@x.com", "pw1")).await.unwrap();

        let stale = service.refresh(&first.refresh_token).await.unwrap_err();
        assert_eq!(stale.kind(), ErrorKind::InvalidToken);
        assert!(service.refresh(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_rejects_replay() {
        let service = create_test_service().await;
        service.register(register_user("a@x.com", "pw1")).await.unwrap();
        let session = service.authenticate(&login("a@x.com", "pw1")).await.unwrap();

        let renewed = service.refresh(&session.refresh_token).await.unwrap();
        assert_ne!(renewed.refresh_token, session.refresh_token);
        assert_eq!(renewed.identity.permissions.len(), 1);

        let claims = service
            .jwt()
            .validate_refresh_token(&renewed.refresh_token)
            .unwrap();
        assert_eq!(claims.sub, "token refresh");

        let replay = service.refresh(&session.refresh_token).await.unwrap_err();
        assert_eq!(replay.kind(), ErrorKind::InvalidToken);
        assert_eq!(replay.to_string(), REFRESH_INVALID);
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token_and_garbage() {
        let service = create_test_service().await;
        service.register(register_user("a@x.com", "pw1")).await.unwrap();
        let session = service.authenticate(&login("a@x.com", "pw1")).await.unwrap();

        for token in [session.access_token.as_str(), "garbage", ""] {
            let err = service.refresh(token).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidToken);
        }
    }

    #[tokio::test]
    async fn test_concurrent_refresh_has_at_most_one_winner() {
        let service = create_test_service().await;
        service.register(register_user("a@x.com", "pw1")).await.unwrap();
        let session = service.authenticate(&login("a@x.com", "pw1")).await.unwrap();

        let (a, b) = tokio::join!(
            service.refresh(&session.refresh_token),
            service.refresh(&session.refresh_token)
        );

        assert!(a.is_ok() || b.is_ok());
        assert!(!(a.is_ok() && b.is_ok()));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent_and_revokes_refresh() {
        let service = create_test_service().await;
        service.register(register_user("a@x.com", "pw1")).await.unwrap();
        let session = service.authenticate(&login("a@x.com", "pw1")).await.unwrap();

        service.logout(&session.identity).await.unwrap();
        service.logout(&session.identity).await.unwrap();

        let err = service.refresh(&session.refresh_token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_logout_after_user_removed() {
        let service = create_test_service().await;
        service.register(register_user("a@x.com", "pw1")).await.unwrap();
        let session = service.authenticate(&login("a@x.com", "pw1")).await.unwrap();

        service
            .users
            .remove_user(
                &session.identity.id.to_string(),
                &Actor::new(Uuid::new_v4(), "root@x.com"),
            )
            .await
            .unwrap();

        service.logout(&session.identity).await.unwrap();
        service.logout(&session.identity).await.unwrap();

        let err = service.refresh(&session.refresh_token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_account_resolves_live_permissions() {
        let service = create_test_service().await;
        service.register(register_user("a@x.com", "pw1")).await.unwrap();
        let session = service.authenticate(&login("a@x.com", "pw1")).await.unwrap();

        let claims = service
            .jwt()
            .validate_access_token(&session.access_token)
            .unwrap();
        let account = service.account(claims.identity()).await.unwrap();

        assert_eq!(account.id, session.identity.id);
        assert_eq!(account.permissions, session.identity.permissions);
    }

    #[tokio::test]
    async fn test_deleted_user_cannot_login() {
        let service = create_test_service().await;
        service.register(register_user("a@x.com", "pw1")).await.unwrap();
        let user = service.validate_user("a@x.com", "pw1").await.unwrap();

        service
            .users
            .remove_user(&user.id.to_string(), &Actor::new(Uuid::new_v4(), "root@x.com"))
            .await
            .unwrap();

        let err = service.validate_user("a@x.com", "pw1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    }
}
