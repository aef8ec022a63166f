//! Initial data seed
//!
//! Creates the permission records for every permission-checked endpoint, the
//! `ADMIN` role owning all of them, the `NORMAL_USER` role with none, and the
//! administrator account. Records that already exist are left untouched, so
//! running the seed on every start is harmless.

use crate::core::auth::gate::normalize_path;
use crate::core::auth::password::{PasswordError, PasswordHasher};
use crate::core::config::AdminAccount;
use crate::core::db::models::{HttpMethod, NewPermission, NewRole, NewUser, Role};
use crate::core::db::repositories::{RepositoryError, Stores};
use crate::core::registry::{ADMIN_ROLE, USER_ROLE};

/// Bootstrap errors
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Seed failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Seed failed: {0}")]
    Password(#[from] PasswordError),
}

/// What a seed run created
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub permissions_created: usize,
    pub roles_created: usize,
    pub admin_created: bool,
}

/// (name, method, route relative to the API prefix, module)
const SYSTEM_PERMISSIONS: &[(&str, HttpMethod, &str, &str)] = &[
    ("Create role", HttpMethod::Post, "/roles", "ROLES"),
    ("Get role by id", HttpMethod::Get, "/roles/{id}", "ROLES"),
    ("Update role", HttpMethod::Patch, "/roles/{id}", "ROLES"),
    ("Delete role", HttpMethod::Delete, "/roles/{id}", "ROLES"),
    ("Create permission", HttpMethod::Post, "/permissions", "PERMISSIONS"),
    ("List permissions", HttpMethod::Get, "/permissions", "PERMISSIONS"),
    ("Get permission by id", HttpMethod::Get, "/permissions/{id}", "PERMISSIONS"),
    ("Update permission", HttpMethod::Patch, "/permissions/{id}", "PERMISSIONS"),
    ("Delete permission", HttpMethod::Delete, "/permissions/{id}", "PERMISSIONS"),
    ("Create user", HttpMethod::Post, "/users", "USERS"),
    ("Get user by id", HttpMethod::Get, "/users/{id}", "USERS"),
    ("Delete user", HttpMethod::Delete, "/users/{id}", "USERS"),
];

/// Permission records for the built-in endpoints, with full route templates
pub fn system_permissions(api_prefix: &str) -> Vec<NewPermission> {
    SYSTEM_PERMISSIONS
        .iter()
        .map(|(name, method, path, module)| NewPermission {
            name: name.to_string(),
            api_path: normalize_path(&format!("{api_prefix}{path}")),
            method: *method,
            module: module.to_string(),
            created_by: None,
        })
        .collect()
}

/// Run the seed against `stores`
pub async fn seed(
    stores: &Stores,
    hasher: &PasswordHasher,
    api_prefix: &str,
    admin: Option<&AdminAccount>,
) -> Result<SeedReport, BootstrapError> {
    let mut report = SeedReport::default();

    let mut permission_ids = Vec::new();
    for permission in system_permissions(api_prefix) {
        let existing = stores
            .permissions
            .find_by_route(&permission.api_path, permission.method)
            .await?;
        let record = match existing {
            Some(record) => record,
            None => {
                report.permissions_created += 1;
                stores.permissions.insert(permission).await?
            }
        };
        permission_ids.push(record.id);
    }

    let admin_role = ensure_role(stores, ADMIN_ROLE, "Full access", permission_ids, &mut report)
        .await?;
    ensure_role(stores, USER_ROLE, "Default role", Vec::new(), &mut report).await?;

    match admin {
        Some(account) => {
            if stores.users.find_by_email(&account.email).await?.is_none() {
                stores
                    .users
                    .insert(NewUser {
                        name: "Administrator".to_string(),
                        email: account.email.clone(),
                        password_hash: hasher.hash(&account.password)?,
                        age: None,
                        gender: None,
                        address: None,
                        role: Some(admin_role.reference()),
                        company: None,
                        created_by: None,
                    })
                    .await?;
                report.admin_created = true;
            }
        }
        None => tracing::warn!("EMAIL_ADMIN or INIT_PASSWORD not set, skipping admin account"),
    }

    tracing::info!(
        "Bootstrap complete: {} permissions, {} roles created, admin created: {}",
        report.permissions_created,
        report.roles_created,
        report.admin_created
    );

    Ok(report)
}

async fn ensure_role(
    stores: &Stores,
    name: &str,
    description: &str,
    permission_ids: Vec<uuid::Uuid>,
    report: &mut SeedReport,
) -> Result<Role, BootstrapError> {
    if let Some(role) = stores.roles.find_by_name(name).await? {
        return Ok(role);
    }

    let role = stores
        .roles
        .insert(NewRole {
            name: name.to_string(),
            description: description.to_string(),
            is_active: true,
            permission_ids,
            created_by: None,
        })
        .await?;
    report.roles_created += 1;

    Ok(role)
}
