//! Models contains all structures that are used in different
//! modules of the app

pub mod amount;
pub mod cart;
pub mod currency;
pub mod event;
pub mod event_store;
pub mod ids;
pub mod notification;
pub mod order;
pub mod order_status;
pub mod payment_attempt;
pub mod status_history;

pub use self::amount::*;
pub use self::cart::*;
pub use self::currency::*;
pub use self::event::*;
pub use self::event_store::*;
pub use self::ids::*;
pub use self::notification::*;
pub use self::order::*;
pub use self::order_status::*;
pub use self::payment_attempt::*;
pub use self::status_history::*;
