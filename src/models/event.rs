use std::fmt;

use diesel::sql_types::Uuid as SqlUuid;
use serde_json;
use uuid::Uuid;

use models::{OrderId, OrderStatus};

#[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, Copy, PartialEq, Eq, FromStr)]
#[sql_type = "SqlUuid"]
pub struct EventId(Uuid);
newtype_from_to_sql!(SqlUuid, EventId, EventId);

impl EventId {
    pub fn new(id: Uuid) -> Self {
        EventId(id)
    }

    pub fn inner(&self) -> Uuid {
        self.0
    }

    pub fn generate() -> Self {
        EventId(Uuid::new_v4())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&format!("{}", self.0.hyphenated()))
    }
}

/// Outbox event recorded in the same transaction as the state change it
/// describes, processed asynchronously by the event handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: EventId::generate(),
            payload,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub enum EventPayload {
    NoOp,
    OrderStatusChanged { order_id: OrderId, status: OrderStatus },
}

impl fmt::Debug for EventPayload {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = serde_json::to_string(self).unwrap_or(format!("{{\"{}\": <serialization failed>}}", self));
        f.write_str(&s)
    }
}

impl fmt::Display for EventPayload {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            EventPayload::NoOp => "NoOp",
            EventPayload::OrderStatusChanged { .. } => "OrderStatusChanged",
        };

        f.write_str(&s)
    }
}
