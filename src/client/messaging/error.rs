use failure::{Backtrace, Context, Fail};
use std::fmt;

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

#[derive(Clone, PartialEq, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "messaging client error - provider rejected the request")]
    Rejected,
    #[fail(display = "messaging client error - unauthorized")]
    Unauthorized,
    #[fail(display = "messaging client error - internal error")]
    Internal,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorSource {
    #[fail(display = "messaging client source - http client")]
    HttpClient,
    #[fail(display = "messaging client source - serde_json")]
    SerdeJson,
}

derive_error_impls!();
