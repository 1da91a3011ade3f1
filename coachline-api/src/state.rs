use coachline_booking::BookingEngine;
use coachline_core::repository::{PreferenceRepository, UserRepository};
use coachline_notify::NotificationDispatcher;
use coachline_store::{EventProducer, RedisClient};
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BookingEngine>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub preferences: Arc<dyn PreferenceRepository>,
    pub users: Arc<dyn UserRepository>,
    /// Integration events; publishing is skipped when Kafka is not configured.
    pub events: Option<Arc<EventProducer>>,
    /// Rate limiting is disabled when Redis is not configured.
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
    pub rate_limit_per_minute: i64,
}
