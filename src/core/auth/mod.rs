//! Authentication and authorization core
//!
//! - Password hashing (bcrypt)
//! - Access/refresh JWT issuance and validation with separate secrets
//! - Login, registration, refresh-token rotation and logout
//! - The per-request gate that checks the caller's role permissions
//! - REST API endpoints for auth operations

pub mod api;
pub mod gate;
pub mod identity;
pub mod jwt;
pub mod password;
pub mod service;

pub use api::{AuthApiState, REFRESH_COOKIE, auth_api_router};
pub use gate::{AuthGate, RouteFlags, RouteTable, auth_middleware, is_permitted, normalize_path};
pub use identity::{CurrentUser, Identity};
pub use jwt::{Claims, JwtConfig, JwtError, JwtService, TokenOrigin, TokenType};
pub use password::{PasswordError, PasswordHasher};
pub use service::{AuthError, AuthService, LoginRequest, RegisterResponse, Session};
