pub mod dispatcher;
pub mod models;
pub mod senders;
pub mod templates;

pub use dispatcher::{DispatchError, NotificationDispatcher};
pub use models::{ChannelOutcome, DispatchResult, EventType, NotificationEvent};
pub use templates::TemplateRegistry;
