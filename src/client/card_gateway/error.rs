use failure::{Backtrace, Context, Fail};
use std::fmt;

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

#[derive(Clone, PartialEq, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "card gateway client error - payment object rejected")]
    Rejected,
    #[fail(display = "card gateway client error - unauthorized")]
    Unauthorized,
    #[fail(display = "card gateway client error - internal error")]
    Internal,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorSource {
    #[fail(display = "card gateway client source - http client")]
    HttpClient,
    #[fail(display = "card gateway client source - serde_json")]
    SerdeJson,
}

derive_error_impls!();
