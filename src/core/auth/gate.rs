//! Authentication gate
//!
//! Runs once per request ahead of every handler:
//!
//! 1. public routes pass straight through
//! 2. the bearer access token is validated (missing or bad token: 401)
//! 3. the role's current permissions are resolved from the registry
//! 4. the request's (method, route) must match one of them, unless the route
//!    skips the check or lives under the auth prefix (otherwise: 403)
//!
//! On success the resolved [`Identity`] is attached to the request.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};

use crate::core::auth::identity::Identity;
use crate::core::auth::jwt::JwtService;
use crate::core::auth::service::AuthError;
use crate::core::db::models::{HttpMethod, PermissionSummary};
use crate::core::http::extract_bearer_token;
use crate::core::registry::RegistryService;

/// Per-route capability flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteFlags {
    /// No token required
    pub public: bool,
    /// Any authenticated caller may use the route
    pub skip_permission: bool,
}

/// Route metadata consulted by the gate, keyed by method and route template
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<(Method, String), RouteFlags>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a route as public
    pub fn public(mut self, method: Method, path: &str) -> Self {
        self.entry(method, path).public = true;
        self
    }

    /// Mark a route as exempt from the permission check
    pub fn skip_permission(mut self, method: Method, path: &str) -> Self {
        self.entry(method, path).skip_permission = true;
        self
    }

    fn entry(&mut self, method: Method, path: &str) -> &mut RouteFlags {
        self.routes
            .entry((method, normalize_path(path)))
            .or_default()
    }

    /// Flags for a route; unknown routes get the defaults
    pub fn flags(&self, method: &Method, path: &str) -> RouteFlags {
        self.routes
            .get(&(route_method(method), normalize_path(path)))
            .copied()
            .unwrap_or_default()
    }
}

/// Canonical form of a route template: `:id` and `{id}` segments are
/// equivalent and trailing or doubled slashes are dropped.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => s.to_string(),
        })
        .collect();

    format!("/{}", segments.join("/"))
}

/// `HEAD` is served by the `GET` handler, so it shares its flags and permissions
fn route_method(method: &Method) -> Method {
    if method == Method::HEAD {
        Method::GET
    } else {
        method.clone()
    }
}

/// True if some permission grants `method` on `route`
pub fn is_permitted(permissions: &[PermissionSummary], method: &Method, route: &str) -> bool {
    let Some(method) = HttpMethod::from_method(&route_method(method)) else {
        return false;
    };
    let route = normalize_path(route);

    permissions
        .iter()
        .any(|p| p.method == method && normalize_path(&p.api_path) == route)
}

/// Per-request authorization decision point
#[derive(Clone)]
pub struct AuthGate {
    jwt: JwtService,
    registry: RegistryService,
    routes: Arc<RouteTable>,
    auth_prefix: String,
}

impl AuthGate {
    pub fn new(
        jwt: JwtService,
        registry: RegistryService,
        routes: RouteTable,
        auth_prefix: &str,
    ) -> Self {
        Self {
            jwt,
            registry,
            routes: Arc::new(routes),
            auth_prefix: normalize_path(auth_prefix),
        }
    }

    fn under_auth_prefix(&self, route: &str) -> bool {
        route == self.auth_prefix
            || route
                .strip_prefix(&self.auth_prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Decide a request. `Ok(None)` means a public route with no identity.
    pub async fn authorize(
        &self,
        method: &Method,
        route: &str,
        headers: &HeaderMap,
    ) -> Result<Option<Identity>, AuthError> {
        let route = normalize_path(route);
        let flags = self.routes.flags(method, &route);
        if flags.public {
            return Ok(None);
        }

        let token = extract_bearer_token(headers).ok_or(AuthError::Unauthorized)?;
        let claims = self.jwt.validate_access_token(token).map_err(|e| {
            tracing::debug!("Access token rejected on {} {}: {}", method, route, e);
            AuthError::Unauthorized
        })?;

        let identity = claims.identity();
        let permissions = self
            .registry
            .role_permissions(identity.role.as_ref())
            .await?;

        let allowed = flags.skip_permission
            || self.under_auth_prefix(&route)
            || is_permitted(&permissions, method, &route);
        if !allowed {
            tracing::info!("Forbidden: {} {} for {}", method, route, identity.email);
            return Err(AuthError::Forbidden);
        }

        Ok(Some(identity.with_permissions(permissions)))
    }
}

/// Middleware running the gate; install with `route_layer` so the matched
/// route template is available.
pub async fn auth_middleware(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let route = match request.extensions().get::<MatchedPath>() {
        Some(path) => path.as_str().to_string(),
        None => request.uri().path().to_string(),
    };

    let method = request.method().clone();
    let headers = request.headers().clone();

    if let Some(identity) = gate.authorize(&method, &route, &headers).await? {
        request.extensions_mut().insert(identity);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::identity::CurrentUser;
    use crate::core::auth::jwt::{JwtConfig, TokenOrigin};
    use crate::core::db::models::{NewPermission, NewRole, RoleRef};
    use crate::core::db::repositories::Stores;
    use axum::{
        Router,
        body::Body,
        http::{StatusCode, header},
        middleware::from_fn_with_state,
        routing::get,
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    fn summary(method: HttpMethod, path: &str) -> PermissionSummary {
        PermissionSummary {
            id: Uuid::new_v4(),
            name: path.to_string(),
            api_path: path.to_string(),
            method,
            module: "JOBS".to_string(),
        }
    }

    // ========================================================================
    // Pure Tests
    // ========================================================================

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/jobs/"), "/jobs");
        assert_eq!(normalize_path("/jobs/:id"), "/jobs/{id}");
        assert_eq!(normalize_path("/jobs/{id}"), "/jobs/{id}");
        assert_eq!(normalize_path("//api//v1/jobs"), "/api/v1/jobs");
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn test_is_permitted() {
        let permissions = vec![
            summary(HttpMethod::Get, "/jobs"),
            summary(HttpMethod::Patch, "/jobs/:id"),
        ];

        assert!(is_permitted(&permissions, &Method::GET, "/jobs"));
        assert!(is_permitted(&permissions, &Method::GET, "/jobs/"));
        assert!(is_permitted(&permissions, &Method::PATCH, "/jobs/{id}"));
        assert!(!is_permitted(&permissions, &Method::DELETE, "/jobs"));
        assert!(!is_permitted(&permissions, &Method::GET, "/jobs/{id}"));
        assert!(is_permitted(&permissions, &Method::HEAD, "/jobs"));
        assert!(!is_permitted(&permissions, &Method::HEAD, "/jobs/{id}"));
        assert!(!is_permitted(&permissions, &Method::OPTIONS, "/jobs"));
        assert!(!is_permitted(&[], &Method::GET, "/jobs"));
    }

    #[test]
    fn test_route_table_flags() {
        let table = RouteTable::new()
            .public(Method::POST, "/auth/login")
            .public(Method::GET, "/auth/refresh")
            .skip_permission(Method::GET, "/roles/:id");

        assert!(table.flags(&Method::POST, "/auth/login/").public);
        assert!(!table.flags(&Method::GET, "/auth/login").public);
        assert!(table.flags(&Method::GET, "/roles/{id}").skip_permission);
        assert_eq!(table.flags(&Method::GET, "/jobs"), RouteFlags::default());

        assert!(table.flags(&Method::HEAD, "/auth/refresh").public);
        assert!(table.flags(&Method::HEAD, "/roles/{id}").skip_permission);
        assert!(!table.flags(&Method::HEAD, "/auth/login").public);
    }

    // ========================================================================
    // Gate Tests
    // ========================================================================

    struct Fixture {
        gate: AuthGate,
        jwt: JwtService,
        role: RoleRef,
    }

    async fn fixture() -> Fixture {
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
        let role = stores
            .roles
            .insert(NewRole {
                name: "NORMAL_USER".to_string(),
                description: String::new(),
                is_active: true,
                permission_ids: vec![permission.id],
                created_by: None,
            })
            .await
            .unwrap();

        let jwt = JwtService::new(JwtConfig::new("access-secret", "refresh-secret"));
        let registry = RegistryService::new(stores.roles, stores.permissions);
        let routes = RouteTable::new()
            .public(Method::POST, "/auth/login")
            .skip_permission(Method::GET, "/roles/{id}");

        Fixture {
            gate: AuthGate::new(jwt.clone(), registry, routes, "/auth"),
            jwt,
            role: role.reference(),
        }
    }

    fn token_for(fixture: &Fixture, role: Option<RoleRef>) -> String {
        let identity = Identity {
            id: Uuid::new_v4(),
            name: "Ana".to_string(),
            email: "a@x.com".to_string(),
            role,
            permissions: Vec::new(),
        };
        fixture
            .jwt
            .issue_access_token(&identity, TokenOrigin::Login)
            .unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_permitted_request_is_authorized() {
        let fixture = fixture().await;
        let headers = bearer(&token_for(&fixture, Some(fixture.role.clone())));

        let identity = fixture
            .gate
            .authorize(&Method::GET, "/jobs", &headers)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.permissions.len(), 1);
    }

    #[tokio::test]
    async fn test_unpermitted_method_is_forbidden() {
        let fixture = fixture().await;
        let headers = bearer(&token_for(&fixture, Some(fixture.role.clone())));

        let result = fixture
            .gate
            .authorize(&Method::DELETE, "/jobs", &headers)
            .await;
        assert!(matches!(result, Err(AuthError::Forbidden)));
    }

    #[tokio::test]
    async fn test_auth_prefix_is_always_allowed() {
        let fixture = fixture().await;
        let headers = bearer(&token_for(&fixture, None));

        for route in ["/auth/account", "/auth/logout", "/auth"] {
            let result = fixture.gate.authorize(&Method::POST, route, &headers).await;
            assert!(result.unwrap().is_some(), "{route} should be allowed");
        }

        let lookalike = fixture
            .gate
            .authorize(&Method::GET, "/authors", &headers)
            .await;
        assert!(matches!(lookalike, Err(AuthError::Forbidden)));
    }

    #[tokio::test]
    async fn test_skip_permission_route_needs_only_a_token() {
        let fixture = fixture().await;
        let headers = bearer(&token_for(&fixture, None));

        let identity = fixture
            .gate
            .authorize(&Method::GET, "/roles/{id}", &headers)
            .await
            .unwrap()
            .unwrap();
        assert!(identity.permissions.is_empty());

        let missing = fixture
            .gate
            .authorize(&Method::GET, "/roles/{id}", &HeaderMap::new())
            .await;
        assert!(matches!(missing, Err(AuthError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_public_route_needs_no_token() {
        let fixture = fixture().await;

        let result = fixture
            .gate
            .authorize(&Method::POST, "/auth/login", &HeaderMap::new())
            .await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_missing_or_invalid_token_is_unauthorized() {
        let fixture = fixture().await;

        let missing = fixture
            .gate
            .authorize(&Method::GET, "/jobs", &HeaderMap::new())
            .await;
        assert!(matches!(missing, Err(AuthError::Unauthorized)));

        let garbage = fixture
            .gate
            .authorize(&Method::GET, "/jobs", &bearer("not.a.token"))
            .await;
        assert!(matches!(garbage, Err(AuthError::Unauthorized)));

        let other = JwtService::new(JwtConfig::new("another-secret", "refresh-secret"));
        let forged = other
            .issue_access_token(
                &Identity {
                    id: Uuid::new_v4(),
                    name: "Eve".to_string(),
                    email: "e@x.com".to_string(),
                    role: Some(fixture.role.clone()),
                    permissions: Vec::new(),
                },
                TokenOrigin::Login,
            )
            .unwrap();
        let forged = fixture
            .gate
            .authorize(&Method::GET, "/jobs", &bearer(&forged))
            .await;
        assert!(matches!(forged, Err(AuthError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_unknown_role_has_no_permissions() {
        let fixture = fixture().await;
        let ghost = RoleRef {
            id: Uuid::new_v4(),
            name: "GHOST".to_string(),
        };
        let headers = bearer(&token_for(&fixture, Some(ghost)));

        let result = fixture.gate.authorize(&Method::GET, "/jobs", &headers).await;
        assert!(matches!(result, Err(AuthError::Forbidden)));
    }

    // ========================================================================
    // Middleware Tests
    // ========================================================================

    async fn whoami(CurrentUser(identity): CurrentUser) -> String {
        identity.email
    }

    fn create_test_app(gate: AuthGate) -> Router {
        Router::new()
            .route("/jobs", get(whoami).delete(whoami))
            .route("/auth/login", axum::routing::post(|| async { "public" }))
            .route_layer(from_fn_with_state(gate, auth_middleware))
    }

    #[tokio::test]
    async fn test_middleware_attaches_identity() {
        let fixture = fixture().await;
        let token = token_for(&fixture, Some(fixture.role.clone()));
        let app = create_test_app(fixture.gate.clone());

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/jobs")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        assert_eq!(&body[..], b"a@x.com");
    }

    #[tokio::test]
    async fn test_middleware_rejections() {
        let fixture = fixture().await;
        let token = token_for(&fixture, Some(fixture.role.clone()));
        let app = create_test_app(fixture.gate.clone());

        let forbidden = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::DELETE)
                    .uri("/jobs")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let head = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::HEAD)
                    .uri("/jobs")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(head.status(), StatusCode::OK);

        let unauthorized = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/jobs")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

        let public = app
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::POST)
                    .uri("/auth/login")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(public.status(), StatusCode::OK);
    }
}
