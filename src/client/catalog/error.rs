use failure::{Backtrace, Context, Fail};
use std::fmt;

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

#[derive(Clone, PartialEq, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "catalog client error - entity not found")]
    NotFound,
    #[fail(display = "catalog client error - insufficient stock")]
    OutOfStock,
    #[fail(display = "catalog client error - malformed input")]
    MalformedInput,
    #[fail(display = "catalog client error - internal error")]
    Internal,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorSource {
    #[fail(display = "catalog client source - http client")]
    HttpClient,
    #[fail(display = "catalog client source - serde_json")]
    SerdeJson,
}

derive_error_impls!();
