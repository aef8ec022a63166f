//! PostgreSQL permission store

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::{LIVE, PermissionStore, RepositoryError, order_by_ids};
use crate::core::db::models::{Actor, HttpMethod, NewPermission, Permission, PermissionChanges};

const PERMISSION_COLUMNS: &str = "id, name, api_path, method, module, created_by, updated_by, \
                                  deleted_by, is_deleted, deleted_at, created_at, updated_at";

/// Permission repository backed by PostgreSQL
#[derive(Clone)]
pub struct PermissionRepository {
    pool: PgPool,
}

impl PermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionStore for PermissionRepository {
    async fn insert(&self, permission: NewPermission) -> Result<Permission, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO permissions (id, name, api_path, method, module, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PERMISSION_COLUMNS}
            "#
        );
        let permission = sqlx::query_as::<_, Permission>(&sql)
            .bind(Uuid::new_v4())
            .bind(&permission.name)
            .bind(&permission.api_path)
            .bind(permission.method)
            .bind(&permission.module)
            .bind(permission.created_by.map(Json))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_insert(e, "permission route"))?;

        Ok(permission)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Permission>, RepositoryError> {
        let sql = format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = $1 AND {LIVE}");
        let permission = sqlx::query_as::<_, Permission>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(permission)
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Permission>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = ANY($1) AND {LIVE}"
        );
        let found = sqlx::query_as::<_, Permission>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(order_by_ids(ids, found))
    }

    async fn find_by_route(
        &self,
        api_path: &str,
        method: HttpMethod,
    ) -> Result<Option<Permission>, RepositoryError> {
        let sql = format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions \
             WHERE api_path = $1 AND method = $2 AND {LIVE}"
        );
        let permission = sqlx::query_as::<_, Permission>(&sql)
            .bind(api_path)
            .bind(method)
            .fetch_optional(&self.pool)
            .await?;

        Ok(permission)
    }

    async fn list(&self) -> Result<Vec<Permission>, RepositoryError> {
        let sql = format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE {LIVE} ORDER BY created_at"
        );
        let permissions = sqlx::query_as::<_, Permission>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(permissions)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &PermissionChanges,
        by: &Actor,
    ) -> Result<Permission, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE permissions
            SET
                name = COALESCE($2, name),
                api_path = COALESCE($3, api_path),
                method = COALESCE($4, method),
                module = COALESCE($5, module),
                updated_by = $6,
                updated_at = NOW()
            WHERE id = $1 AND {LIVE}
            RETURNING {PERMISSION_COLUMNS}
            "#
        );
        let permission = sqlx::query_as::<_, Permission>(&sql)
            .bind(id)
            .bind(&changes.name)
            .bind(&changes.api_path)
            .bind(changes.method)
            .bind(&changes.module)
            .bind(Json(by.clone()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_insert(e, "permission route"))?;

        permission.ok_or(RepositoryError::NotFound)
    }

    async fn soft_delete(&self, id: Uuid, by: &Actor) -> Result<bool, RepositoryError> {
        let sql = format!(
            "UPDATE permissions SET is_deleted = TRUE, deleted_at = $2, deleted_by = $3 \
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
