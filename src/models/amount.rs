use std::fmt::{self, Display};
use std::str::FromStr;

use bigdecimal::BigDecimal;
use diesel::sql_types::BigInt;
use failure::Fail;

const CENTS_IN_UNIT: i64 = 100;
const MAX_FIAT_PRECISION: i64 = 2;

/// Monetary amount in minor units (cents). All supported currencies have a
/// minor unit of two digits, so one type covers them. It has json and
/// postgres (BigInt column) serialization / deserialization implemented.
///
/// As a monetary amount it only implements checked arithmetics.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, FromSqlRow, AsExpression, Default, PartialOrd, Ord, Hash)]
#[sql_type = "BigInt"]
pub struct Amount(i64);

#[derive(Debug, Clone, Fail)]
#[fail(display = "failed to parse amount")]
pub struct ParseAmountError;

impl Amount {
    pub fn new(v: i64) -> Self {
        Amount(v)
    }

    pub fn zero() -> Self {
        Amount(0)
    }

    pub fn inner(&self) -> i64 {
        self.0
    }

    /// Make addition, return None on overflow
    pub fn checked_add(&self, other: Amount) -> Option<Self> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Make subtraction, return None on overflow
    pub fn checked_sub(&self, other: Amount) -> Option<Self> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn checked_mul(&self, factor: i64) -> Option<Self> {
        self.0.checked_mul(factor).map(Amount)
    }

    /// Converts a decimal amount in major units ("23.00") into minor units
    pub fn from_super_unit(value: BigDecimal) -> Option<Amount> {
        let decimal = (value * BigDecimal::from(CENTS_IN_UNIT)).with_scale(0);
        i64::from_str(&decimal.to_string()).ok().map(Amount)
    }

    /// Decimal amount in major units, always scaled to two digits
    pub fn to_super_unit(&self) -> BigDecimal {
        let decimal = BigDecimal::from(self.0) / BigDecimal::from(CENTS_IN_UNIT);
        decimal.with_scale(MAX_FIAT_PRECISION)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_super_unit().to_string())
    }
}

impl From<i64> for Amount {
    fn from(v: i64) -> Self {
        Amount(v)
    }
}

newtype_from_to_sql!(BigInt, Amount, Amount);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_super_units_both_ways() {
        let amount = Amount::from_super_unit(BigDecimal::from_str("23.00").unwrap()).unwrap();
        assert_eq!(amount, Amount::new(2300));
        assert_eq!(amount.to_super_unit(), BigDecimal::from_str("23.00").unwrap());

        let amount = Amount::from_super_unit(BigDecimal::from_str("0.05").unwrap()).unwrap();
        assert_eq!(amount, Amount::new(5));
    }

    #[test]
    fn checked_arithmetics_guard_overflow() {
        assert_eq!(Amount::new(2000).checked_add(Amount::new(300)), Some(Amount::new(2300)));
        assert_eq!(Amount::new(500).checked_mul(2), Some(Amount::new(1000)));
        assert_eq!(Amount::new(i64::max_value()).checked_add(Amount::new(1)), None);
    }

    #[test]
    fn displays_as_major_units() {
        assert_eq!(format!("{}", Amount::new(2300)), "23.00");
        assert_eq!(format!("{}", Amount::new(5)), "0.05");
    }
}
