pub mod auth;

pub use auth::{admin_auth_middleware, customer_auth_middleware, AuthUser, Claims};
