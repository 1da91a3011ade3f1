use async_trait::async_trait;
use coachline_core::channel::{ChannelError, ChannelSender, Recipient, RenderedMessage, SendReceipt};
use coachline_core::notification::Channel;
use sqlx::PgPool;
use uuid::Uuid;

/// In-app channel: writes the rendered message into `in_app_notifications`.
pub struct PgInAppInbox {
    pool: PgPool,
}

impl PgInAppInbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelSender for PgInAppInbox {
    fn channel(&self) -> Channel {
        Channel::InApp
    }

    async fn send(
        &self,
        recipient: &Recipient,
        message: &RenderedMessage,
    ) -> Result<SendReceipt, ChannelError> {
        let Recipient::Inbox(user_id) = recipient else {
            return Err(ChannelError::InvalidRecipient(
                "in-app delivery needs a user inbox".to_string(),
            ));
        };

        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO in_app_notifications (id, user_id, title, body, data) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(user_id)
        .bind(&message.title)
        .bind(&message.body)
        .bind(&message.data)
        .execute(&self.pool)
        .await
        .map_err(|e| ChannelError::Unavailable(e.to_string()))?;

        Ok(SendReceipt { message_id: Some(id.to_string()) })
    }
}
