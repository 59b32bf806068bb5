use std::fmt::{self, Display};
use std::io::Write;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::deserialize::{self, FromSql};
use diesel::pg::Pg;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::VarChar;
use failure::Fail;

use models::OrderId;
use schema::notification_attempts;

#[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, Copy, Eq, PartialEq, Hash)]
#[sql_type = "VarChar"]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Sms,
    Voice,
}

impl Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NotificationChannel::Sms => f.write_str("sms"),
            NotificationChannel::Voice => f.write_str("voice"),
        }
    }
}

impl FromSql<VarChar, Pg> for NotificationChannel {
    fn from_sql(data: Option<&[u8]>) -> deserialize::Result<Self> {
        match data {
            Some(b"sms") => Ok(NotificationChannel::Sms),
            Some(b"voice") => Ok(NotificationChannel::Voice),
            Some(v) => Err(format!(
                "Unrecognized enum variant: {:?}",
                String::from_utf8(v.to_vec()).unwrap_or_else(|_| "Non - UTF8 value".to_string()),
            )
            .into()),
            None => Err("Unexpected null for non-null column".into()),
        }
    }
}

impl ToSql<VarChar, Pg> for NotificationChannel {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        match self {
            NotificationChannel::Sms => out.write_all(b"sms")?,
            NotificationChannel::Voice => out.write_all(b"voice")?,
        };
        Ok(IsNull::No)
    }
}

/// Who a staff-triggered notification is addressed to. The customer's
/// number is snapshotted on the order, a delivery person's number comes
/// from the catalog service.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTarget {
    Customer,
    DeliveryPerson,
}

#[derive(Debug, Clone, Fail)]
#[fail(display = "failed to parse notification target")]
pub struct ParseNotificationTargetError;

impl FromStr for NotificationTarget {
    type Err = ParseNotificationTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(NotificationTarget::Customer),
            "delivery_person" => Ok(NotificationTarget::DeliveryPerson),
            _ => Err(ParseNotificationTargetError),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, Copy, Eq, PartialEq)]
#[sql_type = "VarChar"]
#[serde(rename_all = "lowercase")]
pub enum NotificationOutcome {
    Sent,
    Failed,
}

impl Display for NotificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NotificationOutcome::Sent => f.write_str("sent"),
            NotificationOutcome::Failed => f.write_str("failed"),
        }
    }
}

impl FromSql<VarChar, Pg> for NotificationOutcome {
    fn from_sql(data: Option<&[u8]>) -> deserialize::Result<Self> {
        match data {
            Some(b"sent") => Ok(NotificationOutcome::Sent),
            Some(b"failed") => Ok(NotificationOutcome::Failed),
            Some(v) => Err(format!(
                "Unrecognized enum variant: {:?}",
                String::from_utf8(v.to_vec()).unwrap_or_else(|_| "Non - UTF8 value".to_string()),
            )
            .into()),
            None => Err("Unexpected null for non-null column".into()),
        }
    }
}

impl ToSql<VarChar, Pg> for NotificationOutcome {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        match self {
            NotificationOutcome::Sent => out.write_all(b"sent")?,
            NotificationOutcome::Failed => out.write_all(b"failed")?,
        };
        Ok(IsNull::No)
    }
}

/// Append-only record of one delivery attempt against the messaging
/// provider. Failures are recorded here, they never roll back the
/// transition that triggered them.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
pub struct RawNotificationAttempt {
    pub id: i64,
    pub order_id: OrderId,
    pub channel: NotificationChannel,
    pub target: String,
    pub provider_ref: Option<String>,
    pub outcome: NotificationOutcome,
    pub error_message: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[table_name = "notification_attempts"]
pub struct NewNotificationAttempt {
    pub order_id: OrderId,
    pub channel: NotificationChannel,
    pub target: String,
    pub provider_ref: Option<String>,
    pub outcome: NotificationOutcome,
    pub error_message: Option<String>,
}

impl NewNotificationAttempt {
    pub fn sent(order_id: OrderId, channel: NotificationChannel, target: String, provider_ref: String) -> Self {
        Self {
            order_id,
            channel,
            target,
            provider_ref: Some(provider_ref),
            outcome: NotificationOutcome::Sent,
            error_message: None,
        }
    }

    pub fn failed(order_id: OrderId, channel: NotificationChannel, target: String, error_message: String) -> Self {
        Self {
            order_id,
            channel,
            target,
            provider_ref: None,
            outcome: NotificationOutcome::Failed,
            error_message: Some(error_message),
        }
    }
}

/// E.164-shaped phone number: leading plus, 8 to 15 digits
pub fn is_usable_phone(phone: &str) -> bool {
    let mut chars = phone.chars();
    if chars.next() != Some('+') {
        return false;
    }
    let digits = chars.as_str();
    digits.len() >= 8 && digits.len() <= 15 && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_e164_numbers() {
        assert!(is_usable_phone("+33612345678"));
        assert!(is_usable_phone("+14155552671"));
    }

    #[test]
    fn rejects_malformed_numbers() {
        assert!(!is_usable_phone(""));
        assert!(!is_usable_phone("0612345678"));
        assert!(!is_usable_phone("+33 6 12 34 56 78"));
        assert!(!is_usable_phone("+123"));
        assert!(!is_usable_phone("+123456789012345678"));
    }
}
