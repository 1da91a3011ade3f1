use coachline_core::notification::Channel;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event types with dedicated per-channel templates. Any other event type string is
/// still dispatchable and renders through the generic template.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    BookingConfirmed,
    BookingCancelled,
    PaymentSuccess,
    PaymentFailed,
    TripReminder,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::BookingConfirmed => "BOOKING_CONFIRMED",
            EventType::BookingCancelled => "BOOKING_CANCELLED",
            EventType::PaymentSuccess => "PAYMENT_SUCCESS",
            EventType::PaymentFailed => "PAYMENT_FAILED",
            EventType::TripReminder => "TRIP_REMINDER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "BOOKING_CONFIRMED" => Some(EventType::BookingConfirmed),
            "BOOKING_CANCELLED" => Some(EventType::BookingCancelled),
            "PAYMENT_SUCCESS" => Some(EventType::PaymentSuccess),
            "PAYMENT_FAILED" => Some(EventType::PaymentFailed),
            "TRIP_REMINDER" => Some(EventType::TripReminder),
            _ => None,
        }
    }
}

/// A logical event to fan out to one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub user_id: Uuid,
    pub event_type: String,
    pub channels: Vec<Channel>,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl NotificationEvent {
    pub fn new(user_id: Uuid, event_type: EventType, channels: Vec<Channel>) -> Self {
        Self {
            user_id,
            event_type: event_type.as_str().to_string(),
            channels,
            title: String::new(),
            body: String::new(),
            data: serde_json::json!({}),
        }
    }

    pub fn with_text(mut self, title: impl Into<String>, body: impl Into<String>) -> Self {
        self.title = title.into();
        self.body = body.into();
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Outcome of one channel. `channel` is `None` only for the synthetic entry
/// returned when the target user does not exist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOutcome {
    pub channel: Option<Channel>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Multicast detail for push: devices reached / devices failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<u32>,
}

impl ChannelOutcome {
    pub fn sent(channel: Channel, message_id: Option<String>) -> Self {
        Self {
            channel: Some(channel),
            success: true,
            error: None,
            message_id,
            delivered: None,
            failed: None,
        }
    }

    pub fn failed(channel: Channel, error: impl Into<String>) -> Self {
        Self {
            channel: Some(channel),
            success: false,
            error: Some(error.into()),
            message_id: None,
            delivered: None,
            failed: None,
        }
    }
}

/// Aggregated fan-out result. `overall` is true iff every attempted channel succeeded;
/// best-effort callers should not treat `false` as fatal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub overall: bool,
    pub per_channel: Vec<ChannelOutcome>,
}

impl DispatchResult {
    pub fn from_outcomes(per_channel: Vec<ChannelOutcome>) -> Self {
        Self {
            overall: per_channel.iter().all(|o| o.success),
            per_channel,
        }
    }

    pub fn outcome(&self, channel: Channel) -> Option<&ChannelOutcome> {
        self.per_channel.iter().find(|o| o.channel == Some(channel))
    }
}
