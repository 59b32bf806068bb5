use std::fmt::{self, Display};
use std::io::Write;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::deserialize::{self, FromSql};
use diesel::pg::Pg;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::VarChar;
use failure::Fail;

use models::{Amount, Currency, OrderId};
use schema::payment_attempts;

/// Provider-issued reference of a payment object (intent id for the card
/// rail, payment id for the wallet rail). Used as the natural dedup key
/// for confirmations.
#[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, PartialEq, Eq, Hash)]
#[sql_type = "VarChar"]
pub struct PaymentAttemptId(String);
newtype_from_to_sql!(VarChar, PaymentAttemptId, PaymentAttemptId);

impl PaymentAttemptId {
    pub fn new(id: String) -> Self {
        PaymentAttemptId(id)
    }

    pub fn inner(&self) -> &str {
        &self.0
    }
}

impl Display for PaymentAttemptId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PaymentAttemptId {
    fn from(id: String) -> Self {
        PaymentAttemptId(id)
    }
}

/// Payment rail behind the uniform adapter contract. Stored on the attempt
/// so nothing outside the adapter ever branches on provider identity.
#[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, Copy, Eq, PartialEq, Hash)]
#[sql_type = "VarChar"]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Card,
    Wallet,
}

#[derive(Debug, Clone, Fail)]
#[fail(display = "failed to parse payment provider")]
pub struct ParsePaymentProviderError;

impl FromStr for PaymentProvider {
    type Err = ParsePaymentProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(PaymentProvider::Card),
            "wallet" => Ok(PaymentProvider::Wallet),
            _ => Err(ParsePaymentProviderError),
        }
    }
}

impl Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PaymentProvider::Card => f.write_str("card"),
            PaymentProvider::Wallet => f.write_str("wallet"),
        }
    }
}

impl FromSql<VarChar, Pg> for PaymentProvider {
    fn from_sql(data: Option<&[u8]>) -> deserialize::Result<Self> {
        match data {
            Some(b"card") => Ok(PaymentProvider::Card),
            Some(b"wallet") => Ok(PaymentProvider::Wallet),
            Some(v) => Err(format!(
                "Unrecognized enum variant: {:?}",
                String::from_utf8(v.to_vec()).unwrap_or_else(|_| "Non - UTF8 value".to_string()),
            )
            .into()),
            None => Err("Unexpected null for non-null column".into()),
        }
    }
}

impl ToSql<VarChar, Pg> for PaymentProvider {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        match self {
            PaymentProvider::Card => out.write_all(b"card")?,
            PaymentProvider::Wallet => out.write_all(b"wallet")?,
        };
        Ok(IsNull::No)
    }
}

/// Lifecycle of one provider-side payment object. `succeeded`, `failed`
/// and `cancelled` are terminal and immutable.
#[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, Copy, Eq, PartialEq, Hash)]
#[sql_type = "VarChar"]
#[serde(rename_all = "snake_case")]
pub enum PaymentAttemptState {
    Created,
    RequiresConfirmation,
    Succeeded,
    Failed,
    Cancelled,
}

impl PaymentAttemptState {
    pub fn is_terminal(&self) -> bool {
        match self {
            PaymentAttemptState::Succeeded | PaymentAttemptState::Failed | PaymentAttemptState::Cancelled => true,
            PaymentAttemptState::Created | PaymentAttemptState::RequiresConfirmation => false,
        }
    }
}

impl Display for PaymentAttemptState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PaymentAttemptState::Created => f.write_str("created"),
            PaymentAttemptState::RequiresConfirmation => f.write_str("requires_confirmation"),
            PaymentAttemptState::Succeeded => f.write_str("succeeded"),
            PaymentAttemptState::Failed => f.write_str("failed"),
            PaymentAttemptState::Cancelled => f.write_str("cancelled"),
        }
    }
}

impl FromSql<VarChar, Pg> for PaymentAttemptState {
    fn from_sql(data: Option<&[u8]>) -> deserialize::Result<Self> {
        match data {
            Some(b"created") => Ok(PaymentAttemptState::Created),
            Some(b"requires_confirmation") => Ok(PaymentAttemptState::RequiresConfirmation),
            Some(b"succeeded") => Ok(PaymentAttemptState::Succeeded),
            Some(b"failed") => Ok(PaymentAttemptState::Failed),
            Some(b"cancelled") => Ok(PaymentAttemptState::Cancelled),
            Some(v) => Err(format!(
                "Unrecognized enum variant: {:?}",
                String::from_utf8(v.to_vec()).unwrap_or_else(|_| "Non - UTF8 value".to_string()),
            )
            .into()),
            None => Err("Unexpected null for non-null column".into()),
        }
    }
}

impl ToSql<VarChar, Pg> for PaymentAttemptState {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        match self {
            PaymentAttemptState::Created => out.write_all(b"created")?,
            PaymentAttemptState::RequiresConfirmation => out.write_all(b"requires_confirmation")?,
            PaymentAttemptState::Succeeded => out.write_all(b"succeeded")?,
            PaymentAttemptState::Failed => out.write_all(b"failed")?,
            PaymentAttemptState::Cancelled => out.write_all(b"cancelled")?,
        };
        Ok(IsNull::No)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Queryable)]
pub struct PaymentAttempt {
    pub id: PaymentAttemptId,
    pub order_id: OrderId,
    pub provider: PaymentProvider,
    pub amount: Amount,
    pub currency: Currency,
    pub state: PaymentAttemptState,
    pub client_secret: Option<String>,
    pub approval_url: Option<String>,
    pub payer_id: Option<String>,
    pub last_error_message: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize, Serialize, Insertable)]
#[table_name = "payment_attempts"]
pub struct NewPaymentAttempt {
    pub id: PaymentAttemptId,
    pub order_id: OrderId,
    pub provider: PaymentProvider,
    pub amount: Amount,
    pub currency: Currency,
    pub state: PaymentAttemptState,
    pub client_secret: Option<String>,
    pub approval_url: Option<String>,
    pub payer_id: Option<String>,
}

#[derive(Clone, Debug, Default, AsChangeset)]
#[table_name = "payment_attempts"]
pub struct UpdatePaymentAttempt {
    pub state: Option<PaymentAttemptState>,
    pub payer_id: Option<String>,
    pub last_error_message: Option<String>,
}

/// What settling a confirmation (client call or provider callback) must do,
/// as a pure function of the current attempt state and the verified proof.
/// Keeping it pure is what makes `confirm` idempotent under at-least-once
/// delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleDecision {
    /// Attempt already succeeded: return the stored result, do not touch
    /// the provider or the ledger again
    AlreadySettled,
    /// Proof verified: attempt becomes `succeeded`, order becomes `confirmed`
    MarkSucceeded,
    /// Proof rejected: attempt becomes `failed`, order stays `pending`
    MarkFailed,
    /// Attempt already in a failed / cancelled state
    AlreadyFailed,
}

pub fn settle_decision(state: PaymentAttemptState, proof_verified: bool) -> SettleDecision {
    match state {
        PaymentAttemptState::Succeeded => SettleDecision::AlreadySettled,
        PaymentAttemptState::Failed | PaymentAttemptState::Cancelled => SettleDecision::AlreadyFailed,
        PaymentAttemptState::Created | PaymentAttemptState::RequiresConfirmation => {
            if proof_verified {
                SettleDecision::MarkSucceeded
            } else {
                SettleDecision::MarkFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PaymentAttemptState::*;
    use super::*;

    #[test]
    fn settling_a_succeeded_attempt_is_a_no_op() {
        // second confirm with the same reference returns the same success
        // and must not trigger anything
        assert_eq!(settle_decision(Succeeded, true), SettleDecision::AlreadySettled);
        assert_eq!(settle_decision(Succeeded, false), SettleDecision::AlreadySettled);
    }

    #[test]
    fn verified_proof_settles_open_attempts() {
        assert_eq!(settle_decision(Created, true), SettleDecision::MarkSucceeded);
        assert_eq!(settle_decision(RequiresConfirmation, true), SettleDecision::MarkSucceeded);
    }

    #[test]
    fn rejected_proof_fails_open_attempts() {
        assert_eq!(settle_decision(Created, false), SettleDecision::MarkFailed);
        assert_eq!(settle_decision(RequiresConfirmation, false), SettleDecision::MarkFailed);
    }

    #[test]
    fn terminal_failures_stay_failed() {
        assert_eq!(settle_decision(Failed, true), SettleDecision::AlreadyFailed);
        assert_eq!(settle_decision(Cancelled, true), SettleDecision::AlreadyFailed);
    }

    #[test]
    fn terminal_states_are_marked_terminal() {
        assert!(Succeeded.is_terminal());
        assert!(Failed.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Created.is_terminal());
        assert!(!RequiresConfirmation.is_terminal());
    }
}
