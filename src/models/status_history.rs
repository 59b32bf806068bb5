use chrono::NaiveDateTime;

use models::{OrderId, OrderStatus};
use schema::order_status_history;

/// Append-only audit log of status changes. Never mutated or deleted, the
/// cached `status` field on the order is derived from the latest entry.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
pub struct RawStatusHistory {
    pub id: i64,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[table_name = "order_status_history"]
pub struct NewStatusHistory {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub note: Option<String>,
}

impl NewStatusHistory {
    pub fn new(order_id: OrderId, status: OrderStatus, note: Option<String>) -> Self {
        Self { order_id, status, note }
    }
}
