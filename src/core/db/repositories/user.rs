//! PostgreSQL credential store
//!
//! Users are read together with their role name so the token service can
//! snapshot the role reference without a second round trip.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::{LIVE, RepositoryError, UserStore};
use crate::core::db::models::{Actor, NewUser, User};

const USER_SELECT: &str = r#"
    SELECT u.id, u.name, u.email, u.password_hash, u.age, u.gender, u.address,
           u.role_id, r.name AS role_name, u.company_id, u.company_name,
           u.refresh_token, u.created_by, u.updated_by, u.deleted_by,
           u.is_deleted, u.deleted_at, u.created_at, u.updated_at
    FROM users u
    LEFT JOIN roles r ON r.id = u.role_id AND r.is_deleted = FALSE
"#;

/// User repository backed by PostgreSQL
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        predicate: &str,
        value: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let sql = format!("{USER_SELECT} WHERE {predicate} AND u.{LIVE}");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn insert(&self, user: NewUser) -> Result<User, RepositoryError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, age, gender, address,
                               role_id, company_id, company_name, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.age)
        .bind(&user.gender)
        .bind(&user.address)
        .bind(user.role.as_ref().map(|r| r.id))
        .bind(user.company.as_ref().map(|c| c.id))
        .bind(user.company.as_ref().map(|c| c.name.clone()))
        .bind(user.created_by.map(Json))
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "email"))?;

        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let sql = format!("{USER_SELECT} WHERE u.id = $1 AND u.{LIVE}");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.fetch_one_where("u.email = $1", email).await
    }

    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<User>, RepositoryError> {
        self.fetch_one_where("u.refresh_token = $1", token).await
    }

    async fn set_refresh_token(
        &self,
        id: Uuid,
        token: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let sql = format!("UPDATE users SET refresh_token = $2 WHERE id = $1 AND {LIVE}");
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(token)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        current: &str,
        next: &str,
    ) -> Result<bool, RepositoryError> {
        let sql = format!(
            "UPDATE users SET refresh_token = $3 WHERE id = $1 AND refresh_token = $2 AND {LIVE}"
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(current)
            .bind(next)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn soft_delete(&self, id: Uuid, by: &Actor) -> Result<bool, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE users
            SET is_deleted = TRUE, deleted_at = $2, deleted_by = $3, refresh_token = NULL
            WHERE id = $1 AND {LIVE}
            "#
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::pool::{DbConfig, connect};

    async fn create_test_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
        connect(&DbConfig::new(url))
            .await
            .expect("Failed to create test pool")
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Repository Test".to_string(),
            email: email.to_string(),
            password_hash: "$2b$04$invalidinvalidinvalidinvalidinvalidinvalidinvalidinv".to_string(),
            age: Some(25),
            gender: Some("female".to_string()),
            address: None,
            role: None,
            company: None,
            created_by: None,
        }
    }

    fn unique_email(prefix: &str) -> String {
        format!("{}_{}@example.com", prefix, &Uuid::new_v4().to_string()[..8])
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_insert_and_find_by_email() {
        let repo = UserRepository::new(create_test_pool().await);
        let email = unique_email("insert");

        let user = repo.insert(new_user(&email)).await.unwrap();
        let found = repo.find_by_email(&email).await.unwrap().unwrap();

        assert_eq!(found.id, user.id);
        assert_eq!(found.age, Some(25));
        assert!(found.refresh_token.is_none());
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_insert_duplicate_email() {
        let repo = UserRepository::new(create_test_pool().await);
        let email = unique_email("duplicate");

        repo.insert(new_user(&email)).await.unwrap();
        let result = repo.insert(new_user(&email)).await;

        assert!(matches!(result, Err(RepositoryError::Duplicate("email"))));
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_refresh_token_rotation() {
        let repo = UserRepository::new(create_test_pool().await);
        let user = repo.insert(new_user(&unique_email("rotate"))).await.unwrap();

        repo.set_refresh_token(user.id, Some("first")).await.unwrap();
        let holder = repo.find_by_refresh_token("first").await.unwrap().unwrap();
        assert_eq!(holder.id, user.id);

        assert!(repo.rotate_refresh_token(user.id, "first", "second").await.unwrap());
        assert!(!repo.rotate_refresh_token(user.id, "first", "third").await.unwrap());
        assert!(repo.find_by_refresh_token("first").await.unwrap().is_none());

        repo.set_refresh_token(user.id, None).await.unwrap();
        assert!(repo.find_by_refresh_token("second").await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_soft_delete_hides_user_and_frees_email() {
        let repo = UserRepository::new(create_test_pool().await);
        let email = unique_email("soft_delete");
        let user = repo.insert(new_user(&email)).await.unwrap();
        let admin = Actor::new(Uuid::new_v4(), "admin@example.com");

        assert!(repo.soft_delete(user.id, &admin).await.unwrap());
        assert!(!repo.soft_delete(user.id, &admin).await.unwrap());
        assert!(repo.find_by_id(user.id).await.unwrap().is_none());

        let again = repo.insert(new_user(&email)).await.unwrap();
        assert_ne!(again.id, user.id);
    }
}
