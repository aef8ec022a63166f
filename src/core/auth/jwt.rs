//! JWT utilities for token generation and validation
//!
//! Access and refresh tokens are HS256 tokens signed with two distinct secrets.
//! Both carry the same identity snapshot (id, name, email, role reference);
//! permissions are never embedded and are resolved live by the gate.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::auth::identity::Identity;
use crate::core::db::models::RoleRef;

/// Default access token lifetime
const DEFAULT_ACCESS_EXPIRE: &str = "15m";

/// Default refresh token lifetime
const DEFAULT_REFRESH_EXPIRE: &str = "7d";

const DEFAULT_ISSUER: &str = "jobboard";

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret for signing access tokens
    pub access_secret: String,
    /// Access token lifetime
    pub access_ttl: Duration,
    /// Secret for signing refresh tokens
    pub refresh_secret: String,
    /// Refresh token lifetime
    pub refresh_ttl: Duration,
    /// Token issuer
    pub issuer: String,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl JwtConfig {
    /// Create a new JWT configuration with default lifetimes
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            access_ttl: Duration::minutes(15),
            refresh_secret: refresh_secret.into(),
            refresh_ttl: Duration::days(7),
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }

    /// Create config from environment variables
    pub fn from_env() -> Result<Self, JwtError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from a variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, JwtError> {
        let access_secret = lookup("JWT_ACCESS_TOKEN_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(JwtError::MissingSecret("JWT_ACCESS_TOKEN_SECRET"))?;
        let refresh_secret = lookup("JWT_REFRESH_TOKEN_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(JwtError::MissingSecret("JWT_REFRESH_TOKEN_SECRET"))?;

        if access_secret == refresh_secret {
            return Err(JwtError::SharedSecret);
        }

        let access_ttl = parse_duration(
            "JWT_ACCESS_EXPIRE",
            &lookup("JWT_ACCESS_EXPIRE").unwrap_or_else(|| DEFAULT_ACCESS_EXPIRE.to_string()),
        )?;
        let refresh_ttl = parse_duration(
            "JWT_REFRESH_EXPIRE",
            &lookup("JWT_REFRESH_EXPIRE").unwrap_or_else(|| DEFAULT_REFRESH_EXPIRE.to_string()),
        )?;
        let issuer = lookup("JWT_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.to_string());

        Ok(Self {
            access_secret,
            access_ttl,
            refresh_secret,
            refresh_ttl,
            issuer,
        })
    }

    /// Set access token lifetime
    pub fn access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    /// Set refresh token lifetime
    pub fn refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    /// Set issuer
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

/// Parse a humantime duration string such as `15m` or `7d`
pub fn parse_duration(name: &'static str, value: &str) -> Result<Duration, JwtError> {
    let std = humantime::parse_duration(value.trim()).map_err(|e| JwtError::InvalidDuration {
        name,
        reason: e.to_string(),
    })?;

    Duration::from_std(std).map_err(|e| JwtError::InvalidDuration {
        name,
        reason: e.to_string(),
    })
}

/// JWT errors
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("{0} environment variable not set")]
    MissingSecret(&'static str),

    #[error("Access and refresh tokens must use different secrets")]
    SharedSecret,

    #[error("Invalid duration in {name}: {reason}")]
    InvalidDuration { name: &'static str, reason: String },

    #[error("Token encoding failed: {0}")]
    EncodingError(String),

    #[error("Token decoding failed: {0}")]
    DecodingError(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid token type")]
    InvalidTokenType,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidIssuer
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_) => JwtError::InvalidToken,
            _ => JwtError::DecodingError(err.to_string()),
        }
    }
}

/// Token type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// Flow a token pair was minted by, carried as the subject tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOrigin {
    Login,
    Refresh,
}

impl TokenOrigin {
    pub fn subject(&self) -> &'static str {
        match self {
            TokenOrigin::Login => "token login",
            TokenOrigin::Refresh => "token refresh",
        }
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject tag (`token login` / `token refresh`)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// User ID
    #[serde(rename = "_id")]
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    /// Role snapshot at issuance
    pub role: Option<RoleRef>,
    /// Token type (access or refresh)
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

impl Claims {
    /// Identity carried by the token, without permissions
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.user_id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            permissions: Vec::new(),
        }
    }
}

/// JWT service for token operations
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl JwtService {
    /// Create a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            config,
        }
    }

    fn claims(&self, identity: &Identity, origin: TokenOrigin, token_type: TokenType) -> Claims {
        let now = Utc::now();
        let ttl = match token_type {
            TokenType::Access => self.config.access_ttl,
            TokenType::Refresh => self.config.refresh_ttl,
        };

        Claims {
            sub: origin.subject().to_string(),
            iss: self.config.issuer.clone(),
            user_id: identity.id,
            name: identity.name.clone(),
            email: identity.email.clone(),
            role: identity.role.clone(),
            token_type,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Sign an access token for `identity`
    pub fn issue_access_token(
        &self,
        identity: &Identity,
        origin: TokenOrigin,
    ) -> Result<String, JwtError> {
        let claims = self.claims(identity, origin, TokenType::Access);
        encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(|e| JwtError::EncodingError(e.to_string()))
    }

    /// Sign a refresh token for `identity` with the refresh secret
    pub fn issue_refresh_token(
        &self,
        identity: &Identity,
        origin: TokenOrigin,
    ) -> Result<String, JwtError> {
        let claims = self.claims(identity, origin, TokenType::Refresh);
        encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(|e| JwtError::EncodingError(e.to_string()))
    }

    fn validate(&self, token: &str, key: &DecodingKey, expected: TokenType) -> Result<Claims, JwtError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);
        // Strict expiration checking
        validation.leeway = 0;

        let claims = decode::<Claims>(token, key, &validation)?.claims;
        if claims.token_type != expected {
            return Err(JwtError::InvalidTokenType);
        }

        Ok(claims)
    }

    /// Validate an access token
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.validate(token, &self.access_decoding, TokenType::Access)
    }

    /// Validate a refresh token against the refresh secret
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.validate(token, &self.refresh_decoding, TokenType::Refresh)
    }

    /// Refresh token lifetime, used for the cookie Max-Age
    pub fn refresh_ttl(&self) -> Duration {
        self.config.refresh_ttl
    }
}
