pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod delivery_repo;
pub mod events;
pub mod inbox;
pub mod preference_repo;
pub mod redis_repo;
pub mod route_repo;
pub mod seat_claim_repo;
pub mod user_repo;

pub use booking_repo::StoreBookingRepository;
pub use database::DbClient;
pub use delivery_repo::StoreDeliveryLog;
pub use events::EventProducer;
pub use inbox::PgInAppInbox;
pub use preference_repo::StorePreferenceRepository;
pub use redis_repo::RedisClient;
pub use route_repo::StoreRouteRepository;
pub use seat_claim_repo::StoreSeatClaims;
pub use user_repo::StoreUserRepository;

use coachline_core::CoreError;

pub(crate) fn storage_err(e: sqlx::Error) -> CoreError {
    CoreError::StorageError(e.to_string())
}
