use chrono::{DateTime, Utc};
use coachline_shared::pii::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The slice of a user account the dispatcher needs to reach them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContact {
    pub id: Uuid,
    pub name: String,
    pub email: Option<Masked<String>>,
    pub phone: Option<Masked<String>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Android,
    Ios,
    Web,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "ANDROID",
            Platform::Ios => "IOS",
            Platform::Web => "WEB",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ANDROID" => Some(Platform::Android),
            "IOS" => Some(Platform::Ios),
            "WEB" => Some(Platform::Web),
            _ => None,
        }
    }
}

/// Push endpoint registered by a user's device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceToken {
    pub user_id: Uuid,
    pub token: Masked<String>,
    pub platform: Platform,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Per-user channel opt-outs. In-app delivery has no flag and is always allowed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub email: bool,
    pub push: bool,
    pub sms: bool,
    pub marketing: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            push: true,
            sms: true,
            marketing: false,
        }
    }
}

/// Partial update; absent fields keep their current (or default) value.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceUpdate {
    pub email: Option<bool>,
    pub push: Option<bool>,
    pub sms: Option<bool>,
    pub marketing: Option<bool>,
}

impl NotificationPreferences {
    pub fn apply(self, update: PreferenceUpdate) -> Self {
        Self {
            email: update.email.unwrap_or(self.email),
            push: update.push.unwrap_or(self.push),
            sms: update.sms.unwrap_or(self.sms),
            marketing: update.marketing.unwrap_or(self.marketing),
        }
    }
}
