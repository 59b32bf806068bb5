use std::fmt::{self, Display};
use std::io::Write;
use std::str::FromStr;

use diesel::deserialize::{self, FromSql};
use diesel::pg::Pg;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::VarChar;
use enum_iterator::IntoEnumIterator;
use failure::Fail;

/// Lifecycle of an order. Transitions are one-directional, `delivered` and
/// `cancelled` are terminal, a shipped order can no longer be cancelled
/// here (returns are a separate process).
#[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, Copy, Eq, PartialEq, Hash, IntoEnumIterator)]
#[sql_type = "VarChar"]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Fail)]
#[fail(display = "failed to parse order status")]
pub struct ParseOrderStatusError;

impl OrderStatus {
    /// Statuses reachable from `self` in a single transition
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Confirmed, OrderStatus::Cancelled],
            OrderStatus::Confirmed => &[OrderStatus::Processing, OrderStatus::Cancelled],
            OrderStatus::Processing => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered],
            OrderStatus::Delivered => &[],
            OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition(&self, to: OrderStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

impl FromStr for OrderStatus {
    type Err = ParseOrderStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(ParseOrderStatusError),
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OrderStatus::Pending => f.write_str("pending"),
            OrderStatus::Confirmed => f.write_str("confirmed"),
            OrderStatus::Processing => f.write_str("processing"),
            OrderStatus::Shipped => f.write_str("shipped"),
            OrderStatus::Delivered => f.write_str("delivered"),
            OrderStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

impl FromSql<VarChar, Pg> for OrderStatus {
    fn from_sql(data: Option<&[u8]>) -> deserialize::Result<Self> {
        match data {
            Some(b"pending") => Ok(OrderStatus::Pending),
            Some(b"confirmed") => Ok(OrderStatus::Confirmed),
            Some(b"processing") => Ok(OrderStatus::Processing),
            Some(b"shipped") => Ok(OrderStatus::Shipped),
            Some(b"delivered") => Ok(OrderStatus::Delivered),
            Some(b"cancelled") => Ok(OrderStatus::Cancelled),
            Some(v) => Err(format!(
                "Unrecognized enum variant: {:?}",
                String::from_utf8(v.to_vec()).unwrap_or_else(|_| "Non - UTF8 value".to_string()),
            )
            .into()),
            None => Err("Unexpected null for non-null column".into()),
        }
    }
}

impl ToSql<VarChar, Pg> for OrderStatus {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        match self {
            OrderStatus::Pending => out.write_all(b"pending")?,
            OrderStatus::Confirmed => out.write_all(b"confirmed")?,
            OrderStatus::Processing => out.write_all(b"processing")?,
            OrderStatus::Shipped => out.write_all(b"shipped")?,
            OrderStatus::Delivered => out.write_all(b"delivered")?,
            OrderStatus::Cancelled => out.write_all(b"cancelled")?,
        };
        Ok(IsNull::No)
    }
}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;
    use super::*;
    use enum_iterator::IntoEnumIterator;

    #[test]
    fn happy_path_is_reachable() {
        assert!(Pending.can_transition(Confirmed));
        assert!(Confirmed.can_transition(Processing));
        assert!(Processing.can_transition(Shipped));
        assert!(Shipped.can_transition(Delivered));
    }

    #[test]
    fn cancellation_is_limited_to_early_statuses() {
        assert!(Pending.can_transition(Cancelled));
        assert!(Confirmed.can_transition(Cancelled));
        assert!(Processing.can_transition(Cancelled));
        assert!(!Shipped.can_transition(Cancelled));
        assert!(!Delivered.can_transition(Cancelled));
    }

    #[test]
    fn shipping_a_pending_order_is_illegal() {
        assert!(!Pending.can_transition(Shipped));
    }

    #[test]
    fn terminal_statuses_allow_nothing() {
        for status in OrderStatus::into_enum_iter() {
            assert!(!Delivered.can_transition(status));
            assert!(!Cancelled.can_transition(status));
        }
        assert!(Delivered.is_terminal());
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn no_transition_goes_backwards() {
        // order of the happy path; anything reachable must be strictly later
        let rank = |s: OrderStatus| match s {
            Pending => 0,
            Confirmed => 1,
            Processing => 2,
            Shipped => 3,
            Delivered => 4,
            Cancelled => 5,
        };

        for from in OrderStatus::into_enum_iter() {
            for to in from.allowed_transitions() {
                assert!(rank(*to) > rank(from), "{} -> {} goes backwards", from, to);
            }
        }
    }

    #[test]
    fn statuses_round_trip_through_strings() {
        for status in OrderStatus::into_enum_iter() {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
    }
}
