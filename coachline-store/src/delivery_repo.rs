use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coachline_core::notification::{Channel, DeliveryRecord, DeliveryStatus};
use coachline_core::repository::DeliveryLog;
use coachline_core::{CoreError, CoreResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::storage_err;

pub struct StoreDeliveryLog {
    pool: PgPool,
}

impl StoreDeliveryLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
    id: Uuid,
    user_id: Uuid,
    event_type: String,
    channel: String,
    recipient: String,
    content: String,
    status: String,
    error: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DeliveryRow> for DeliveryRecord {
    type Error = CoreError;

    fn try_from(row: DeliveryRow) -> Result<Self, Self::Error> {
        let channel = Channel::parse(&row.channel)
            .ok_or_else(|| CoreError::InternalError(format!("unknown channel {}", row.channel)))?;
        let status = match row.status.as_str() {
            "SENT" => DeliveryStatus::Sent,
            "FAILED" => DeliveryStatus::Failed,
            other => return Err(CoreError::InternalError(format!("unknown delivery status {}", other))),
        };

        Ok(DeliveryRecord {
            id: row.id,
            user_id: row.user_id,
            event_type: row.event_type,
            channel,
            recipient: row.recipient,
            content: row.content,
            status,
            error: row.error,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl DeliveryLog for StoreDeliveryLog {
    async fn append(&self, record: &DeliveryRecord) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_deliveries
                (id, user_id, event_type, channel, recipient, content, status, error, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.event_type)
        .bind(record.channel.as_str())
        .bind(&record.recipient)
        .bind(&record.content)
        .bind(record.status.as_str())
        .bind(&record.error)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> CoreResult<Vec<DeliveryRecord>> {
        let rows = sqlx::query_as::<_, DeliveryRow>(
            r#"
            SELECT id, user_id, event_type, channel, recipient, content, status, error, created_at
            FROM notification_deliveries
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(DeliveryRecord::try_from).collect()
    }
}
