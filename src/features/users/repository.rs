use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::plans::Plan;
use crate::features::users::models::{NewUser, User};

const USER_COLUMNS: &str = "id, full_name, email, avatar_url, avatar_key, plan, \
                            billing_customer_id, otp_digest, otp_expires_at, \
                            created_at, updated_at";

/// Persistence port for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User>;

    async fn find(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn set_plan(&self, id: Uuid, plan: Plan) -> Result<()>;

    async fn set_email(&self, id: Uuid, email: &str) -> Result<()>;

    async fn set_avatar(&self, id: Uuid, url: &str, key: Option<&str>) -> Result<()>;

    async fn set_otp(&self, id: Uuid, digest: &str, expires_at: DateTime<Utc>) -> Result<()>;

    async fn clear_otp(&self, id: Uuid) -> Result<()>;

    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Postgres-backed user repository
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (full_name, email, avatar_url) \
             VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.avatar_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn set_plan(&self, id: Uuid, plan: Plan) -> Result<()> {
        sqlx::query("UPDATE users SET plan = $1, updated_at = NOW() WHERE id = $2")
            .bind(plan.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_email(&self, id: Uuid, email: &str) -> Result<()> {
        sqlx::query("UPDATE users SET email = $1, updated_at = NOW() WHERE id = $2")
            .bind(email)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_avatar(&self, id: Uuid, url: &str, key: Option<&str>) -> Result<()> {
        sqlx::query(
            "UPDATE users SET avatar_url = $1, avatar_key = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(url)
        .bind(key)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_otp(&self, id: Uuid, digest: &str, expires_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE users SET otp_digest = $1, otp_expires_at = $2, updated_at = NOW() \
             WHERE id = $3",
        )
        .bind(digest)
        .bind(expires_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_otp(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE users SET otp_digest = NULL, otp_expires_at = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
