use anyhow::Context;
use coachline_api::{app, state::{AppState, AuthConfig}};
use coachline_booking::{BookingEngine, BookingRules, LeadTimePolicy};
use coachline_core::notification::Channel;
use coachline_notify::senders::LoggingSender;
use coachline_notify::NotificationDispatcher;
use coachline_store::app_config::Config;
use coachline_store::{
    DbClient, EventProducer, PgInAppInbox, RedisClient, StoreBookingRepository, StoreDeliveryLog,
    StorePreferenceRepository, StoreRouteRepository, StoreSeatClaims, StoreUserRepository,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coachline_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Coachline API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let pool = db.pool.clone();

    let redis = match &config.redis {
        Some(redis) => match RedisClient::new(&redis.url).await {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!("Redis unavailable, rate limiting disabled: {}", e);
                None
            }
        },
        None => None,
    };

    let events = match &config.kafka {
        Some(kafka) => Some(Arc::new(
            EventProducer::new(&kafka.brokers).context("Failed to create Kafka producer")?,
        )),
        None => None,
    };

    let users = Arc::new(StoreUserRepository::new(pool.clone()));
    let preferences = Arc::new(StorePreferenceRepository::new(pool.clone()));

    let dispatcher = Arc::new(
        NotificationDispatcher::new(
            users.clone(),
            preferences.clone(),
            Arc::new(StoreDeliveryLog::new(pool.clone())),
        )
        .with_sender(Arc::new(LoggingSender::new(Channel::Email)))
        .with_sender(Arc::new(LoggingSender::new(Channel::Push)))
        .with_sender(Arc::new(LoggingSender::new(Channel::Sms)))
        .with_sender(Arc::new(PgInAppInbox::new(pool.clone()))),
    );

    let rules = BookingRules {
        lead_time: LeadTimePolicy::hours(config.business_rules.cancellation_lead_hours),
        max_seats_per_booking: config.business_rules.max_seats_per_booking,
        confirmation_channels: config.notifications.booking_channels.clone(),
        cancellation_channels: config.notifications.cancellation_channels.clone(),
    };

    let engine = BookingEngine::new(
        Arc::new(StoreRouteRepository::new(pool.clone())),
        Arc::new(StoreBookingRepository::new(pool.clone())),
        Arc::new(StoreSeatClaims::new(pool).with_claim_ttl(config.business_rules.seat_claim_ttl_seconds)),
        dispatcher.clone(),
    )
    .with_rules(rules);

    let app_state = AppState {
        engine: Arc::new(engine),
        dispatcher,
        preferences,
        users,
        events,
        redis,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        rate_limit_per_minute: config.business_rules.rate_limit_per_minute,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app(app_state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
