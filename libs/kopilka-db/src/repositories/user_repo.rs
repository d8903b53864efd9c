use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::models::store::User;

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: &PgRow) -> Result<User> {
        Ok(User {
            id: row.try_get("id")?,
            tg_id: row.try_get("tg_id")?,
            username: row.try_get("username")?,
            full_name: row.try_get("full_name")?,
            is_admin: row.try_get("is_admin")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by ID")?;
        row.map(|r| Self::row_to_user(&r)).transpose()
    }

    pub async fn get_by_tg_id(&self, tg_id: i64) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE tg_id = $1")
            .bind(tg_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by TG ID")?;
        row.map(|r| Self::row_to_user(&r)).transpose()
    }

    /// Idempotent upsert keyed by the Telegram id; runs on every contact.
    /// `grant_admin` can only grant the flag, never revoke it.
    pub async fn upsert(
        &self,
        tg_id: i64,
        username: Option<&str>,
        full_name: Option<&str>,
        grant_admin: bool,
    ) -> Result<User> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (tg_id, username, full_name, is_admin)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tg_id) DO UPDATE SET
                username = COALESCE(excluded.username, users.username),
                full_name = COALESCE(excluded.full_name, users.full_name),
                is_admin = users.is_admin OR excluded.is_admin,
                last_seen = CURRENT_TIMESTAMP
            RETURNING *
            "#,
        )
        .bind(tg_id)
        .bind(username)
        .bind(full_name)
        .bind(grant_admin)
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert user")?;

        Self::row_to_user(&row)
    }
}
