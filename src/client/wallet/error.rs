use failure::{Backtrace, Context, Fail};
use std::fmt;

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

#[derive(Clone, PartialEq, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "wallet client error - payment rejected")]
    Rejected,
    #[fail(display = "wallet client error - unauthorized")]
    Unauthorized,
    #[fail(display = "wallet client error - internal error")]
    Internal,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorSource {
    #[fail(display = "wallet client source - http client")]
    HttpClient,
    #[fail(display = "wallet client source - serde_json")]
    SerdeJson,
}

derive_error_impls!();
