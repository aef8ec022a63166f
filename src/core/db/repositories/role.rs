//! PostgreSQL role store

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::{LIVE, RepositoryError, RoleStore};
use crate::core::db::models::{Actor, NewRole, Role, RoleChanges};

const ROLE_COLUMNS: &str = "id, name, description, is_active, permission_ids, created_by, \
                            updated_by, deleted_by, is_deleted, deleted_at, created_at, updated_at";

/// Role repository backed by PostgreSQL
#[derive(Clone)]
pub struct RoleRepository {
    pool: PgPool,
}

impl RoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleStore for RoleRepository {
    async fn insert(&self, role: NewRole) -> Result<Role, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO roles (id, name, description, is_active, permission_ids, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ROLE_COLUMNS}
            "#
        );
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(Uuid::new_v4())
            .bind(&role.name)
            .bind(&role.description)
            .bind(role.is_active)
            .bind(&role.permission_ids)
            .bind(role.created_by.map(Json))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_insert(e, "role name"))?;

        Ok(role)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Role>, RepositoryError> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1 AND {LIVE}");
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(role)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Role>, RepositoryError> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1 AND {LIVE}");
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(role)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &RoleChanges,
        by: &Actor,
    ) -> Result<Role, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE roles
            SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                is_active = COALESCE($4, is_active),
                permission_ids = COALESCE($5, permission_ids),
                updated_by = $6,
                updated_at = NOW()
            WHERE id = $1 AND {LIVE}
            RETURNING {ROLE_COLUMNS}
            "#
        );
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(id)
            .bind(&changes.name)
            .bind(&changes.description)
            .bind(changes.is_active)
            .bind(&changes.permissions)
            .bind(Json(by.clone()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_insert(e, "role name"))?;

        role.ok_or(RepositoryError::NotFound)
    }

    async fn soft_delete(&self, id: Uuid, by: &Actor) -> Result<bool, RepositoryError> {
        let sql = format!(
            "UPDATE roles SET is_deleted = TRUE, deleted_at = $2, deleted_by = $3 \
             WHERE id = $1 AND {LIVE}"
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(Utc::now())
            .bind(Json(by.clone()))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
