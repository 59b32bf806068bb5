use std::fmt::{self, Display};
use std::io::Write;
use std::str::FromStr;

use diesel::deserialize::{self, FromSql};
use diesel::pg::Pg;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::VarChar;
use enum_iterator::IntoEnumIterator;
use failure::Fail;

#[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, Copy, Eq, PartialEq, Hash, IntoEnumIterator)]
#[sql_type = "VarChar"]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Eur,
    Usd,
    Gbp,
}

#[derive(Debug, Clone, Fail)]
#[fail(display = "failed to parse currency")]
pub struct ParseCurrencyError;

impl FromStr for Currency {
    type Err = ParseCurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eur" => Ok(Currency::Eur),
            "usd" => Ok(Currency::Usd),
            "gbp" => Ok(Currency::Gbp),
            _ => Err(ParseCurrencyError),
        }
    }
}

impl FromSql<VarChar, Pg> for Currency {
    fn from_sql(data: Option<&[u8]>) -> deserialize::Result<Self> {
        match data {
            Some(b"eur") => Ok(Currency::Eur),
            Some(b"usd") => Ok(Currency::Usd),
            Some(b"gbp") => Ok(Currency::Gbp),
            Some(v) => Err(format!(
                "Unrecognized enum variant: {:?}",
                String::from_utf8(v.to_vec()).unwrap_or_else(|_| "Non - UTF8 value".to_string()),
            )
            .to_string()
            .into()),
            None => Err("Unexpected null for non-null column".into()),
        }
    }
}

impl ToSql<VarChar, Pg> for Currency {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        match self {
            Currency::Eur => out.write_all(b"eur")?,
            Currency::Usd => out.write_all(b"usd")?,
            Currency::Gbp => out.write_all(b"gbp")?,
        };
        Ok(IsNull::No)
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Currency::Eur => f.write_str("eur"),
            Currency::Usd => f.write_str("usd"),
            Currency::Gbp => f.write_str("gbp"),
        }
    }
}

impl Currency {
    /// ISO 4217 code, the spelling payment providers expect
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_currencies_case_insensitive() {
        assert_eq!(Currency::from_str("EUR").unwrap(), Currency::Eur);
        assert_eq!(Currency::from_str("usd").unwrap(), Currency::Usd);
        assert!(Currency::from_str("stq").is_err());
    }
}
