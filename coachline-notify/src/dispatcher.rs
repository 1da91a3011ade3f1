use coachline_core::channel::{ChannelError, ChannelSender, Recipient, RenderedMessage};
use coachline_core::clock::{Clock, SystemClock};
use coachline_core::notification::{Channel, DeliveryRecord, DeliveryStatus};
use coachline_core::repository::{DeliveryLog, PreferenceRepository, UserRepository};
use coachline_core::user::{DeviceToken, NotificationPreferences, UserContact};
use coachline_core::CoreError;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{ChannelOutcome, DispatchResult, NotificationEvent};
use crate::templates::TemplateRegistry;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// User or preference lookup failed; nothing was attempted.
    #[error("Notification lookup failed: {0}")]
    Lookup(#[from] CoreError),
}

/// Fans one event out to every requested channel the user has not opted out of.
pub struct NotificationDispatcher {
    users: Arc<dyn UserRepository>,
    preferences: Arc<dyn PreferenceRepository>,
    log: Arc<dyn DeliveryLog>,
    senders: HashMap<Channel, Arc<dyn ChannelSender>>,
    templates: TemplateRegistry,
    clock: Arc<dyn Clock>,
}

struct Attempt {
    outcome: ChannelOutcome,
    recipient: String,
    content: String,
}

impl NotificationDispatcher {
    pub fn new(
        users: Arc<dyn UserRepository>,
        preferences: Arc<dyn PreferenceRepository>,
        log: Arc<dyn DeliveryLog>,
    ) -> Self {
        Self {
            users,
            preferences,
            log,
            senders: HashMap::new(),
            templates: TemplateRegistry::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Registers the transport for the sender's channel, replacing any previous one.
    pub fn with_sender(mut self, sender: Arc<dyn ChannelSender>) -> Self {
        self.senders.insert(sender.channel(), sender);
        self
    }

    pub fn with_templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn dispatch(&self, event: &NotificationEvent) -> Result<DispatchResult, DispatchError> {
        let user = match self.users.get_user(event.user_id).await? {
            Some(user) => user,
            None => {
                warn!("Dispatch of {} skipped: user {} not found", event.event_type, event.user_id);
                return Ok(DispatchResult {
                    overall: false,
                    per_channel: vec![ChannelOutcome {
                        channel: None,
                        success: false,
                        error: Some(format!("user {} not found", event.user_id)),
                        message_id: None,
                        delivered: None,
                        failed: None,
                    }],
                });
            }
        };

        let preferences = self.preferences.get_preferences(user.id).await?;
        let channels = allowed_channels(&event.channels, &preferences);

        let devices = if channels.contains(&Channel::Push) {
            self.users.active_device_tokens(user.id).await?
        } else {
            Vec::new()
        };

        let attempts = join_all(
            channels
                .iter()
                .map(|channel| self.attempt(*channel, &user, &devices, event)),
        )
        .await;

        let mut outcomes = Vec::with_capacity(attempts.len());
        for attempt in attempts {
            self.record(event, &attempt).await;
            outcomes.push(attempt.outcome);
        }

        let result = DispatchResult::from_outcomes(outcomes);
        info!(
            "Dispatched {} to user {}: {} channel(s), overall={}",
            event.event_type,
            user.id,
            result.per_channel.len(),
            result.overall
        );
        Ok(result)
    }

    async fn attempt(
        &self,
        channel: Channel,
        user: &UserContact,
        devices: &[DeviceToken],
        event: &NotificationEvent,
    ) -> Attempt {
        let message = self.templates.render(event, channel);
        let content = format!("{}\n\n{}", message.title, message.body).trim().to_string();

        let sender = match self.senders.get(&channel) {
            Some(sender) => sender.clone(),
            None => {
                return Attempt {
                    outcome: ChannelOutcome::failed(channel, format!("no sender configured for {}", channel)),
                    recipient: String::new(),
                    content,
                }
            }
        };

        if channel == Channel::Push {
            return self.multicast(sender.as_ref(), devices, &message, content).await;
        }

        let recipient = match channel {
            Channel::Email => user.email.clone().map(Recipient::Email),
            Channel::Sms => user.phone.clone().map(Recipient::Phone),
            _ => Some(Recipient::Inbox(user.id)),
        };

        let recipient = match recipient {
            Some(recipient) => recipient,
            None => {
                let missing = if channel == Channel::Email { "email address" } else { "phone number" };
                return Attempt {
                    outcome: ChannelOutcome::failed(channel, format!("user has no {}", missing)),
                    recipient: String::new(),
                    content,
                };
            }
        };

        let outcome = match sender.send(&recipient, &message).await {
            Ok(receipt) => ChannelOutcome::sent(channel, receipt.message_id),
            Err(e) => {
                warn!("{} delivery to user {} failed: {}", channel, user.id, e);
                ChannelOutcome::failed(channel, e.to_string())
            }
        };

        Attempt {
            outcome,
            recipient: recipient.address(),
            content,
        }
    }

    /// Push goes to every active device; the channel succeeds if any device is reached.
    async fn multicast(
        &self,
        sender: &dyn ChannelSender,
        devices: &[DeviceToken],
        message: &RenderedMessage,
        content: String,
    ) -> Attempt {
        if devices.is_empty() {
            return Attempt {
                outcome: ChannelOutcome::failed(Channel::Push, "no device tokens"),
                recipient: String::new(),
                content,
            };
        }

        let results = join_all(devices.iter().map(|device| {
            let recipient = Recipient::Device {
                token: device.token.clone(),
                platform: device.platform,
            };
            async move { (device, sender.send(&recipient, message).await) }
        }))
        .await;

        let mut delivered = 0u32;
        let mut failed = 0u32;
        let mut message_id = None;
        let mut last_error = None;

        for (device, result) in results {
            match result {
                Ok(receipt) => {
                    delivered += 1;
                    message_id = message_id.or(receipt.message_id);
                }
                Err(e) => {
                    failed += 1;
                    if let ChannelError::InvalidRecipient(_) = e {
                        if let Err(err) = self.users.deactivate_device_token(device.token.expose()).await {
                            warn!("Failed to deactivate stale device token {}: {}", device.token.hint(), err);
                        }
                    }
                    last_error = Some(e.to_string());
                }
            }
        }

        let outcome = ChannelOutcome {
            channel: Some(Channel::Push),
            success: delivered > 0,
            error: if delivered == 0 {
                Some(format!(
                    "all {} device(s) failed: {}",
                    failed,
                    last_error.unwrap_or_default()
                ))
            } else {
                None
            },
            message_id,
            delivered: Some(delivered),
            failed: Some(failed),
        };

        Attempt {
            outcome,
            recipient: format!("{} device(s)", devices.len()),
            content,
        }
    }

    async fn record(&self, event: &NotificationEvent, attempt: &Attempt) {
        let Some(channel) = attempt.outcome.channel else {
            return;
        };

        let record = DeliveryRecord {
            id: Uuid::new_v4(),
            user_id: event.user_id,
            event_type: event.event_type.clone(),
            channel,
            recipient: attempt.recipient.clone(),
            content: attempt.content.clone(),
            status: if attempt.outcome.success {
                DeliveryStatus::Sent
            } else {
                DeliveryStatus::Failed
            },
            error: attempt.outcome.error.clone(),
            created_at: self.clock.now(),
        };

        if let Err(e) = self.log.append(&record).await {
            warn!("Failed to persist {} delivery record for user {}: {}", channel, event.user_id, e);
        }
    }
}

/// Requested channels minus the ones the user opted out of, deduplicated, request order kept.
pub fn allowed_channels(requested: &[Channel], preferences: &NotificationPreferences) -> Vec<Channel> {
    let mut channels = Vec::new();
    for channel in requested {
        let allowed = match channel {
            Channel::Email => preferences.email,
            Channel::Push => preferences.push,
            Channel::Sms => preferences.sms,
            Channel::InApp => true,
        };
        if allowed && !channels.contains(channel) {
            channels.push(*channel);
        }
    }
    channels
}
