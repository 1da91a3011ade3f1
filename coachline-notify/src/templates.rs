//! Content strategies keyed by (event type, channel).

use coachline_core::channel::RenderedMessage;
use coachline_core::notification::Channel;
use serde_json::Value;
use std::collections::HashMap;

use crate::models::{EventType, NotificationEvent};

pub type RenderFn = fn(&NotificationEvent) -> RenderedMessage;

pub const SMS_MAX_CHARS: usize = 160;

/// Lookup table from (event type, channel) to a render function.
///
/// Event types or channels without an entry use [`generic`].
pub struct TemplateRegistry {
    table: HashMap<(EventType, Channel), RenderFn>,
}

impl TemplateRegistry {
    pub fn empty() -> Self {
        Self { table: HashMap::new() }
    }

    pub fn register(&mut self, event_type: EventType, channel: Channel, render: RenderFn) {
        self.table.insert((event_type, channel), render);
    }

    pub fn lookup(&self, event_type: &str, channel: Channel) -> RenderFn {
        EventType::parse(event_type)
            .and_then(|ev| self.table.get(&(ev, channel)).copied())
            .unwrap_or(generic)
    }

    pub fn render(&self, event: &NotificationEvent, channel: Channel) -> RenderedMessage {
        let mut rendered = (self.lookup(&event.event_type, channel))(event);
        if channel == Channel::Sms {
            rendered.body = truncate(&rendered.body, SMS_MAX_CHARS);
        }
        rendered
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        use Channel::*;
        use EventType::*;

        let entries: [(EventType, Channel, RenderFn); 20] = [
            (BookingConfirmed, Email, booking_confirmed_email),
            (BookingConfirmed, Push, booking_confirmed_short),
            (BookingConfirmed, InApp, booking_confirmed_short),
            (BookingConfirmed, Sms, booking_confirmed_sms),
            (BookingCancelled, Email, booking_cancelled_email),
            (BookingCancelled, Push, booking_cancelled_short),
            (BookingCancelled, InApp, booking_cancelled_short),
            (BookingCancelled, Sms, booking_cancelled_sms),
            (PaymentSuccess, Email, payment_success_email),
            (PaymentSuccess, Push, payment_success_short),
            (PaymentSuccess, InApp, payment_success_short),
            (PaymentSuccess, Sms, payment_success_sms),
            (PaymentFailed, Email, payment_failed_email),
            (PaymentFailed, Push, payment_failed_short),
            (PaymentFailed, InApp, payment_failed_short),
            (PaymentFailed, Sms, payment_failed_sms),
            (TripReminder, Email, trip_reminder_email),
            (TripReminder, Push, trip_reminder_short),
            (TripReminder, InApp, trip_reminder_short),
            (TripReminder, Sms, trip_reminder_sms),
        ];

        let mut registry = Self::empty();
        for (event_type, channel, render) in entries {
            registry.register(event_type, channel, render);
        }
        registry
    }
}

/// Fallback: the caller's title and body as given.
pub fn generic(event: &NotificationEvent) -> RenderedMessage {
    message(event, event.title.clone(), event.body.clone())
}

fn message(event: &NotificationEvent, title: String, body: String) -> RenderedMessage {
    let mut data = match &event.data {
        Value::Object(map) => Value::Object(map.clone()),
        _ => serde_json::json!({}),
    };
    data["type"] = Value::String(event.event_type.clone());

    RenderedMessage { title, body, data }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max - 3).collect();
    out.push_str("...");
    out
}

fn field(event: &NotificationEvent, key: &str) -> Option<String> {
    match event.data.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
        ),
        _ => None,
    }
}

fn field_or(event: &NotificationEvent, key: &str, fallback: &str) -> String {
    field(event, key).unwrap_or_else(|| fallback.to_string())
}

fn trip(event: &NotificationEvent) -> String {
    format!(
        "{} to {}",
        field_or(event, "origin", "origin"),
        field_or(event, "destination", "destination")
    )
}

fn body_or(event: &NotificationEvent, composed: String) -> String {
    if event.data.get("origin").is_some() || event.body.is_empty() {
        composed
    } else {
        event.body.clone()
    }
}

fn booking_confirmed_email(event: &NotificationEvent) -> RenderedMessage {
    let title = format!("Booking confirmed: {}", trip(event));
    let body = format!(
        "Hi {},\n\nYour booking is confirmed.\n\nTrip: {}\nTravel date: {}\nSeat(s): {}\nTotal fare: {} {}\nReference(s): {}\n\nPlease arrive 30 minutes before departure.",
        field_or(event, "passengerName", "traveller"),
        trip(event),
        field_or(event, "travelDate", "-"),
        field_or(event, "seatNumbers", "-"),
        field_or(event, "totalFare", "-"),
        field_or(event, "currency", ""),
        field_or(event, "bookingIds", "-"),
    );
    message(event, title, body)
}

fn booking_confirmed_short(event: &NotificationEvent) -> RenderedMessage {
    let body = format!(
        "{} on {}, seat(s) {}",
        trip(event),
        field_or(event, "travelDate", "-"),
        field_or(event, "seatNumbers", "-"),
    );
    message(event, "Booking confirmed".to_string(), body_or(event, body))
}

fn booking_confirmed_sms(event: &NotificationEvent) -> RenderedMessage {
    let body = format!(
        "Coachline: booking confirmed {} {} seat(s) {}. Fare {} {}.",
        trip(event),
        field_or(event, "travelDate", ""),
        field_or(event, "seatNumbers", "-"),
        field_or(event, "totalFare", "-"),
        field_or(event, "currency", ""),
    );
    message(event, String::new(), body)
}

fn booking_cancelled_email(event: &NotificationEvent) -> RenderedMessage {
    let title = format!("Booking cancelled: {}", trip(event));
    let body = format!(
        "Hi {},\n\nYour booking {} for {} on {} (seat {}) has been cancelled and the seat released.",
        field_or(event, "passengerName", "traveller"),
        field_or(event, "bookingId", "-"),
        trip(event),
        field_or(event, "travelDate", "-"),
        field_or(event, "seatNumber", "-"),
    );
    message(event, title, body)
}

fn booking_cancelled_short(event: &NotificationEvent) -> RenderedMessage {
    let body = format!(
        "{} on {}, seat {} cancelled",
        trip(event),
        field_or(event, "travelDate", "-"),
        field_or(event, "seatNumber", "-"),
    );
    message(event, "Booking cancelled".to_string(), body_or(event, body))
}

fn booking_cancelled_sms(event: &NotificationEvent) -> RenderedMessage {
    let body = format!(
        "Coachline: booking {} {} seat {} cancelled.",
        trip(event),
        field_or(event, "travelDate", ""),
        field_or(event, "seatNumber", "-"),
    );
    message(event, String::new(), body)
}

fn payment_success_email(event: &NotificationEvent) -> RenderedMessage {
    let body = format!(
        "We received your payment of {} {}.\nReference: {}",
        field_or(event, "amount", "-"),
        field_or(event, "currency", ""),
        field_or(event, "reference", "-"),
    );
    message(event, "Payment received".to_string(), body)
}

fn payment_success_short(event: &NotificationEvent) -> RenderedMessage {
    let body = format!(
        "Payment of {} {} received",
        field_or(event, "amount", "-"),
        field_or(event, "currency", ""),
    );
    message(event, "Payment received".to_string(), body)
}

fn payment_success_sms(event: &NotificationEvent) -> RenderedMessage {
    let body = format!(
        "Coachline: payment of {} {} received. Ref {}.",
        field_or(event, "amount", "-"),
        field_or(event, "currency", ""),
        field_or(event, "reference", "-"),
    );
    message(event, String::new(), body)
}

fn payment_failed_email(event: &NotificationEvent) -> RenderedMessage {
    let body = format!(
        "Your payment of {} {} could not be completed: {}.\nYour seats are held as pending; please retry payment.",
        field_or(event, "amount", "-"),
        field_or(event, "currency", ""),
        field_or(event, "reason", "declined"),
    );
    message(event, "Payment failed".to_string(), body)
}

fn payment_failed_short(event: &NotificationEvent) -> RenderedMessage {
    let body = format!("Payment failed: {}", field_or(event, "reason", "declined"));
    message(event, "Payment failed".to_string(), body)
}

fn payment_failed_sms(event: &NotificationEvent) -> RenderedMessage {
    let body = format!(
        "Coachline: payment failed ({}). Please retry.",
        field_or(event, "reason", "declined"),
    );
    message(event, String::new(), body)
}

fn trip_reminder_email(event: &NotificationEvent) -> RenderedMessage {
    let title = format!("Trip reminder: {}", trip(event));
    let body = format!(
        "Your bus from {} departs on {} at {}. Seat(s): {}.",
        trip(event),
        field_or(event, "travelDate", "-"),
        field_or(event, "departureTime", "-"),
        field_or(event, "seatNumbers", "-"),
    );
    message(event, title, body)
}

fn trip_reminder_short(event: &NotificationEvent) -> RenderedMessage {
    let body = format!(
        "{} departs at {}",
        trip(event),
        field_or(event, "departureTime", "-"),
    );
    message(event, "Trip reminder".to_string(), body)
}

fn trip_reminder_sms(event: &NotificationEvent) -> RenderedMessage {
    let body = format!(
        "Coachline: reminder, {} departs {} {}.",
        trip(event),
        field_or(event, "travelDate", ""),
        field_or(event, "departureTime", ""),
    );
    message(event, String::new(), body)
}
