use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coachline_core::channel::{ChannelError, ChannelSender, Recipient, RenderedMessage, SendReceipt};
use coachline_core::notification::Channel;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Development transport: logs the send and reports success.
///
/// Stands in for the SMTP relay, FCM and SMS gateway clients, which live outside
/// this workspace.
pub struct LoggingSender {
    channel: Channel,
}

impl LoggingSender {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ChannelSender for LoggingSender {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(
        &self,
        recipient: &Recipient,
        message: &RenderedMessage,
    ) -> Result<SendReceipt, ChannelError> {
        let target = match recipient {
            Recipient::Email(email) => email.hint(),
            Recipient::Phone(phone) => phone.hint(),
            Recipient::Device { token, platform } => format!("{} {}", platform.as_str(), token.hint()),
            Recipient::Inbox(user_id) => user_id.to_string(),
        };

        let message_id = format!("{}-{}", self.channel.as_str().to_lowercase(), Uuid::new_v4().simple());
        info!(
            "[{}] -> {}: {} ({} chars) id={}",
            self.channel,
            target,
            message.title,
            message.body.chars().count(),
            message_id
        );

        Ok(SendReceipt { message_id: Some(message_id) })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxMessage {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// In-app channel backed by a per-user in-memory inbox.
#[derive(Default)]
pub struct InMemoryInbox {
    messages: RwLock<HashMap<Uuid, Vec<InboxMessage>>>,
}

impl InMemoryInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self, user_id: Uuid) -> Vec<InboxMessage> {
        self.messages.read().await.get(&user_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ChannelSender for InMemoryInbox {
    fn channel(&self) -> Channel {
        Channel::InApp
    }

    async fn send(
        &self,
        recipient: &Recipient,
        message: &RenderedMessage,
    ) -> Result<SendReceipt, ChannelError> {
        let user_id = match recipient {
            Recipient::Inbox(user_id) => *user_id,
            _ => {
                return Err(ChannelError::InvalidRecipient(
                    "in-app delivery needs a user inbox".to_string(),
                ))
            }
        };

        let entry = InboxMessage {
            id: Uuid::new_v4(),
            title: message.title.clone(),
            body: message.body.clone(),
            data: message.data.clone(),
            is_read: false,
            created_at: Utc::now(),
        };
        let id = entry.id;
        self.messages.write().await.entry(user_id).or_default().push(entry);

        Ok(SendReceipt { message_id: Some(id.to_string()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coachline_shared::pii::Masked;

    fn message() -> RenderedMessage {
        RenderedMessage {
            title: "Booking confirmed".to_string(),
            body: "Seat 4".to_string(),
            data: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn inbox_stores_per_user() {
        let inbox = InMemoryInbox::new();
        let user = Uuid::new_v4();

        inbox.send(&Recipient::Inbox(user), &message()).await.unwrap();

        let stored = inbox.messages(user).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "Booking confirmed");
        assert!(inbox.messages(Uuid::new_v4()).await.is_empty());
    }

    #[tokio::test]
    async fn inbox_rejects_other_recipients() {
        let inbox = InMemoryInbox::new();
        let result = inbox
            .send(&Recipient::Email(Masked("a@b.co".to_string())), &message())
            .await;
        assert!(matches!(result, Err(ChannelError::InvalidRecipient(_))));
    }

    #[tokio::test]
    async fn logging_sender_returns_message_id() {
        let sender = LoggingSender::new(Channel::Sms);
        let receipt = sender
            .send(&Recipient::Phone(Masked("+254700000001".to_string())), &message())
            .await
            .unwrap();
        assert!(receipt.message_id.unwrap().starts_with("sms-"));
    }
}
