use async_trait::async_trait;
use coachline_core::repository::PreferenceRepository;
use coachline_core::user::{NotificationPreferences, PreferenceUpdate};
use coachline_core::CoreResult;
use sqlx::PgPool;
use uuid::Uuid;

use crate::storage_err;

pub struct StorePreferenceRepository {
    pool: PgPool,
}

impl StorePreferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PreferenceRow {
    email: bool,
    push: bool,
    sms: bool,
    marketing: bool,
}

impl From<PreferenceRow> for NotificationPreferences {
    fn from(row: PreferenceRow) -> Self {
        Self {
            email: row.email,
            push: row.push,
            sms: row.sms,
            marketing: row.marketing,
        }
    }
}

#[async_trait]
impl PreferenceRepository for StorePreferenceRepository {
    async fn get_preferences(&self, user_id: Uuid) -> CoreResult<NotificationPreferences> {
        let row = sqlx::query_as::<_, PreferenceRow>(
            "SELECT email, push, sms, marketing FROM notification_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(NotificationPreferences::from).unwrap_or_default())
    }

    async fn update_preferences(
        &self,
        user_id: Uuid,
        update: PreferenceUpdate,
    ) -> CoreResult<NotificationPreferences> {
        // Unset fields fall back to the stored row, then to the defaults.
        let defaults = NotificationPreferences::default();
        let row = sqlx::query_as::<_, PreferenceRow>(
            r#"
            INSERT INTO notification_preferences (user_id, email, push, sms, marketing, updated_at)
            VALUES ($1, COALESCE($2, $6), COALESCE($3, $7), COALESCE($4, $8), COALESCE($5, $9), NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET email = COALESCE($2, notification_preferences.email),
                push = COALESCE($3, notification_preferences.push),
                sms = COALESCE($4, notification_preferences.sms),
                marketing = COALESCE($5, notification_preferences.marketing),
                updated_at = NOW()
            RETURNING email, push, sms, marketing
            "#,
        )
        .bind(user_id)
        .bind(update.email)
        .bind(update.push)
        .bind(update.sms)
        .bind(update.marketing)
        .bind(defaults.email)
        .bind(defaults.push)
        .bind(defaults.sms)
        .bind(defaults.marketing)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.into())
    }
}
