//! Repos is a module responsible for interacting with postgres db

pub mod error;
pub mod event_store;
pub mod notification_attempts;
pub mod orders;
pub mod payment_attempts;
pub mod repo_factory;
pub mod status_history;
pub mod types;

pub use self::error::*;
pub use self::event_store::*;
pub use self::notification_attempts::*;
pub use self::orders::*;
pub use self::payment_attempts::*;
pub use self::repo_factory::*;
pub use self::status_history::*;
pub use self::types::*;
