//! Application assembly
//!
//! Wires stores, services, route metadata and the HTTP router together.

use axum::{
    Router,
    http::{Method, header},
    middleware::from_fn_with_state,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::core::auth::{
    AuthApiState, AuthGate, AuthService, JwtService, PasswordHasher, RouteTable, auth_api_router,
    auth_middleware, normalize_path,
};
use crate::core::config::Config;
use crate::core::db::Stores;
use crate::core::registry::{RegistryApiState, RegistryService, registry_api_router};
use crate::core::users::{UserApiState, UserService, user_api_router};

/// Services shared by all request handlers
#[derive(Clone)]
pub struct AppServices {
    pub auth: AuthService,
    pub registry: RegistryService,
    pub users: UserService,
    pub jwt: JwtService,
}

impl AppServices {
    pub fn new(config: &Config, stores: &Stores, hasher: PasswordHasher) -> Self {
        let jwt = JwtService::new(config.jwt.clone());
        let registry = RegistryService::new(stores.roles.clone(), stores.permissions.clone());
        let users = UserService::new(
            stores.users.clone(),
            stores.roles.clone(),
            hasher,
            config.admin_email.clone(),
        );
        let auth = AuthService::new(users.clone(), registry.clone(), jwt.clone());

        Self {
            auth,
            registry,
            users,
            jwt,
        }
    }
}

fn join(prefix: &str, path: &str) -> String {
    normalize_path(&format!("{prefix}{path}"))
}

/// Route metadata for the gate, with full route templates under `prefix`
pub fn route_table(prefix: &str) -> RouteTable {
    RouteTable::new()
        .public(Method::POST, &join(prefix, "/auth/login"))
        .public(Method::POST, &join(prefix, "/auth/register"))
        .public(Method::GET, &join(prefix, "/auth/refresh"))
        .skip_permission(Method::GET, &join(prefix, "/roles/{id}"))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
            header::COOKIE,
        ])
        .allow_credentials(true)
}

/// Build the application router
pub fn router(config: &Config, services: &AppServices) -> Router {
    let prefix = config.api_prefix.as_str();

    let api = Router::new()
        .merge(auth_api_router(AuthApiState {
            auth_service: services.auth.clone(),
        }))
        .merge(registry_api_router(RegistryApiState {
            registry: services.registry.clone(),
        }))
        .merge(user_api_router(UserApiState {
            user_service: services.users.clone(),
        }));

    // Axum rejects nesting at the root
    let api = if prefix == "/" {
        api
    } else {
        Router::new().nest(prefix, api)
    };

    let gate = AuthGate::new(
        services.jwt.clone(),
        services.registry.clone(),
        route_table(prefix),
        &join(prefix, "/auth"),
    );

    api.route_layer(from_fn_with_state(gate, auth_middleware))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_table_uses_prefix() {
        let table = route_table("/api/v1");

        assert!(table.flags(&Method::POST, "/api/v1/auth/login").public);
        assert!(table.flags(&Method::GET, "/api/v1/auth/refresh").public);
        assert!(!table.flags(&Method::POST, "/api/v1/auth/logout").public);
        assert!(
            table
                .flags(&Method::GET, "/api/v1/roles/{id}")
                .skip_permission
        );
        assert!(!table.flags(&Method::POST, "/auth/login").public);
    }

    #[test]
    fn test_route_table_at_root() {
        let table = route_table("/");

        assert!(table.flags(&Method::POST, "/auth/register").public);
    }
}
