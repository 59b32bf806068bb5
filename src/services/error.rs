use failure::{Backtrace, Context, Fail};
use std::fmt;

use diesel::result::Error as DieselError;
use validator::{ValidationError, ValidationErrors};

use client::card_gateway::ErrorKind as CardGatewayErrorKind;
use client::catalog::ErrorKind as CatalogErrorKind;
use client::messaging::ErrorKind as MessagingErrorKind;
use client::wallet::ErrorKind as WalletErrorKind;
use repos::error::ErrorKind as RepoErrorKind;

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

#[derive(Clone, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "service error - not found")]
    NotFound,
    #[fail(display = "service error - validation: {}", _0)]
    Validation(ValidationErrors),
    #[fail(display = "service error - insufficient stock")]
    OutOfStock,
    #[fail(display = "service error - order is not payable")]
    NotPayable,
    #[fail(display = "service error - illegal status transition")]
    IllegalTransition,
    #[fail(display = "service error - payment verification failed")]
    PaymentVerification,
    #[fail(display = "service error - provider failure")]
    Provider,
    #[fail(display = "service error - internal")]
    Internal,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorSource {
    #[fail(display = "service source - R2D2")]
    R2d2,
    #[fail(display = "service source - serde_json")]
    SerdeJson,
}

#[allow(dead_code)]
#[derive(Copy, Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorContext {
    #[fail(display = "service context - amount overflow while computing totals")]
    AmountOverflow,
    #[fail(display = "service context - stored order items are malformed")]
    MalformedItems,
}

derive_error_impls!();

impl From<RepoErrorKind> for ErrorKind {
    fn from(e: RepoErrorKind) -> Self {
        match e {
            RepoErrorKind::NotFound => ErrorKind::NotFound,
            RepoErrorKind::Constraints(_) | RepoErrorKind::Internal => ErrorKind::Internal,
        }
    }
}

impl From<CatalogErrorKind> for ErrorKind {
    fn from(e: CatalogErrorKind) -> Self {
        match e {
            CatalogErrorKind::NotFound => ErrorKind::NotFound,
            CatalogErrorKind::OutOfStock => ErrorKind::OutOfStock,
            CatalogErrorKind::MalformedInput | CatalogErrorKind::Internal => ErrorKind::Internal,
        }
    }
}

impl From<CardGatewayErrorKind> for ErrorKind {
    fn from(e: CardGatewayErrorKind) -> Self {
        match e {
            CardGatewayErrorKind::Rejected => ErrorKind::PaymentVerification,
            CardGatewayErrorKind::Unauthorized => ErrorKind::Internal,
            CardGatewayErrorKind::Internal => ErrorKind::Provider,
        }
    }
}

impl From<WalletErrorKind> for ErrorKind {
    fn from(e: WalletErrorKind) -> Self {
        match e {
            WalletErrorKind::Rejected => ErrorKind::PaymentVerification,
            WalletErrorKind::Unauthorized => ErrorKind::Internal,
            WalletErrorKind::Internal => ErrorKind::Provider,
        }
    }
}

impl From<MessagingErrorKind> for ErrorKind {
    fn from(e: MessagingErrorKind) -> Self {
        // the provider rejecting a number and the provider being down look
        // the same to the caller: retry or fix the target
        match e {
            MessagingErrorKind::Rejected | MessagingErrorKind::Unauthorized | MessagingErrorKind::Internal => ErrorKind::Provider,
        }
    }
}

impl From<DieselError> for Error {
    fn from(e: DieselError) -> Self {
        let kind = match e {
            DieselError::NotFound => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        };
        ectx!(err e, kind)
    }
}

/// Single-field validation errors built in service code
pub fn validation_errors(field: &'static str, code: &'static str, message: &'static str) -> ValidationErrors {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    let mut errors = ValidationErrors::new();
    errors.add(field, error);
    errors
}
