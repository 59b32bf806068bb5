use failure::{Backtrace, Context, Fail};
use std::fmt;

use client::catalog::ErrorKind as CatalogErrorKind;
use client::messaging::ErrorKind as MessagingErrorKind;
use repos::error::ErrorKind as RepoErrorKind;

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

#[derive(Clone, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "event handler error - internal")]
    Internal,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorSource {
    #[fail(display = "event handler source - R2D2")]
    R2d2,
    #[fail(display = "event handler source - tokio-timer")]
    TokioTimer,
}

derive_error_impls!();

impl From<RepoErrorKind> for ErrorKind {
    fn from(_e: RepoErrorKind) -> Self {
        ErrorKind::Internal
    }
}

impl From<CatalogErrorKind> for ErrorKind {
    fn from(_e: CatalogErrorKind) -> Self {
        ErrorKind::Internal
    }
}

impl From<MessagingErrorKind> for ErrorKind {
    fn from(_e: MessagingErrorKind) -> Self {
        ErrorKind::Internal
    }
}
