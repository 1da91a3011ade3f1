use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coachline_core::repository::UserRepository;
use coachline_core::user::{DeviceToken, Platform, UserContact};
use coachline_core::CoreResult;
use coachline_shared::pii::Masked;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage_err;

pub struct StoreUserRepository {
    pool: PgPool,
}

impl StoreUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: Option<String>,
    phone: Option<String>,
}

#[derive(sqlx::FromRow)]
struct DeviceRow {
    user_id: Uuid,
    token: String,
    platform: String,
    is_active: bool,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl UserRepository for StoreUserRepository {
    async fn get_user(&self, id: Uuid) -> CoreResult<Option<UserContact>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, name, email, phone FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(row.map(|r| UserContact {
            id: r.id,
            name: r.name,
            email: r.email.filter(|e| !e.is_empty()).map(Masked),
            phone: r.phone.filter(|p| !p.is_empty()).map(Masked),
        }))
    }

    async fn active_device_tokens(&self, user_id: Uuid) -> CoreResult<Vec<DeviceToken>> {
        let rows = sqlx::query_as::<_, DeviceRow>(
            r#"
            SELECT user_id, token, platform, is_active, updated_at
            FROM device_tokens
            WHERE user_id = $1 AND is_active
            ORDER BY updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let mut tokens = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(platform) = Platform::parse(&row.platform) else {
                warn!("Skipping device token with unknown platform {}", row.platform);
                continue;
            };
            tokens.push(DeviceToken {
                user_id: row.user_id,
                token: Masked(row.token),
                platform,
                is_active: row.is_active,
                updated_at: row.updated_at,
            });
        }
        Ok(tokens)
    }

    async fn register_device(&self, token: DeviceToken) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO device_tokens (token, user_id, platform, is_active, updated_at)
            VALUES ($1, $2, $3, TRUE, $4)
            ON CONFLICT (token) DO UPDATE
            SET user_id = EXCLUDED.user_id,
                platform = EXCLUDED.platform,
                is_active = TRUE,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(token.token.expose())
        .bind(token.user_id)
        .bind(token.platform.as_str())
        .bind(token.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        info!("Registered {} device for user {}", token.platform.as_str(), token.user_id);
        Ok(())
    }

    async fn deactivate_device_token(&self, token: &str) -> CoreResult<()> {
        sqlx::query("UPDATE device_tokens SET is_active = FALSE, updated_at = NOW() WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}
