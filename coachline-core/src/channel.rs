use async_trait::async_trait;
use coachline_shared::pii::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notification::Channel;
use crate::user::Platform;

/// Content after template rendering, ready for a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderedMessage {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Where a single send goes.
#[derive(Debug, Clone)]
pub enum Recipient {
    Email(Masked<String>),
    Phone(Masked<String>),
    Device {
        token: Masked<String>,
        platform: Platform,
    },
    Inbox(Uuid),
}

impl Recipient {
    /// Address as written into the delivery log.
    pub fn address(&self) -> String {
        match self {
            Recipient::Email(email) => email.expose().clone(),
            Recipient::Phone(phone) => phone.expose().clone(),
            Recipient::Device { token, .. } => token.expose().clone(),
            Recipient::Inbox(user_id) => user_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendReceipt {
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    /// The address itself is dead (unregistered push token, bounced mailbox).
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
    #[error("Provider rejected message: {0}")]
    Rejected(String),
}

/// Transport for one channel (SMTP relay, FCM, SMS gateway, in-app inbox).
#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(
        &self,
        recipient: &Recipient,
        message: &RenderedMessage,
    ) -> Result<SendReceipt, ChannelError>;
}
