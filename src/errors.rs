use hyper::StatusCode;
use serde_json;
use validator::ValidationErrors;

use http::errors::{Codeable, PayloadCarrier};
use services::error::ErrorKind as ServiceErrorKind;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "Not found")]
    NotFound,
    #[fail(display = "Parse error")]
    Parse,
    #[fail(display = "Validation error")]
    Validate(ValidationErrors),
    #[fail(display = "Insufficient stock")]
    OutOfStock,
    #[fail(display = "Order is not payable")]
    NotPayable,
    #[fail(display = "Illegal status transition")]
    IllegalTransition,
    #[fail(display = "Payment verification failed")]
    PaymentVerification,
    #[fail(display = "Provider error")]
    Provider,
    #[fail(display = "R2D2 connection error")]
    Connection,
    #[fail(display = "Http Client error")]
    HttpClient,
    #[fail(display = "Internal error")]
    Internal,
}

impl Codeable for Error {
    fn code(&self) -> StatusCode {
        match *self {
            Error::NotFound => StatusCode::NotFound,
            Error::Validate(_) => StatusCode::BadRequest,
            Error::Parse => StatusCode::UnprocessableEntity,
            Error::OutOfStock => StatusCode::UnprocessableEntity,
            Error::NotPayable | Error::IllegalTransition => StatusCode::Conflict,
            Error::PaymentVerification => StatusCode::PaymentRequired,
            Error::Provider => StatusCode::BadGateway,
            Error::Connection | Error::HttpClient | Error::Internal => StatusCode::InternalServerError,
        }
    }
}

impl PayloadCarrier for Error {
    fn payload(&self) -> Option<serde_json::Value> {
        match *self {
            Error::Validate(ref e) => serde_json::to_value(e.clone()).ok(),
            _ => None,
        }
    }
}

impl From<ServiceErrorKind> for Error {
    fn from(kind: ServiceErrorKind) -> Error {
        match kind {
            ServiceErrorKind::NotFound => Error::NotFound,
            ServiceErrorKind::Validation(errors) => Error::Validate(errors),
            ServiceErrorKind::OutOfStock => Error::OutOfStock,
            ServiceErrorKind::NotPayable => Error::NotPayable,
            ServiceErrorKind::IllegalTransition => Error::IllegalTransition,
            ServiceErrorKind::PaymentVerification => Error::PaymentVerification,
            ServiceErrorKind::Provider => Error::Provider,
            ServiceErrorKind::Internal => Error::Internal,
        }
    }
}
