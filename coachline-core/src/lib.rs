pub mod booking;
pub mod channel;
pub mod clock;
pub mod memory;
pub mod notification;
pub mod repository;
pub mod route;
pub mod user;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
