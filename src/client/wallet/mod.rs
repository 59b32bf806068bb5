//! Client of the redirect (wallet) rail: create a payment, send the
//! customer to the approval url, then execute the payment with the payer
//! id the provider hands back. Execution is the server-side proof check.

mod error;
pub mod mock;
mod types;

use std::sync::Arc;

use base64;
use futures::Future;
use hyper::header::Headers;
use hyper::{Method, StatusCode};
use serde_json;

use config;
use http::client::{Error as HttpError, HttpClient};

pub use self::error::*;
pub use self::types::*;

pub trait WalletClient: Send + Sync + 'static {
    fn create_payment(&self, input: NewPayment) -> Box<Future<Item = Payment, Error = Error> + Send>;

    fn get_payment(&self, payment_id: String) -> Box<Future<Item = Payment, Error = Error> + Send>;

    fn execute_payment(&self, payment_id: String, input: ExecutePayment) -> Box<Future<Item = Payment, Error = Error> + Send>;
}

impl<T: ?Sized + WalletClient> WalletClient for Arc<T> {
    fn create_payment(&self, input: NewPayment) -> Box<Future<Item = Payment, Error = Error> + Send> {
        (*self.clone()).create_payment(input)
    }

    fn get_payment(&self, payment_id: String) -> Box<Future<Item = Payment, Error = Error> + Send> {
        (*self.clone()).get_payment(payment_id)
    }

    fn execute_payment(&self, payment_id: String, input: ExecutePayment) -> Box<Future<Item = Payment, Error = Error> + Send> {
        (*self.clone()).execute_payment(payment_id, input)
    }
}

#[derive(Clone)]
pub struct WalletClientImpl<C: HttpClient + Clone> {
    client: C,
    url: String,
    client_id: String,
    client_secret: String,
}

impl<C: HttpClient + Clone> WalletClientImpl<C> {
    pub fn create_from_config(client: C, config: &config::WalletGateway) -> Self {
        Self {
            client,
            url: config.url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    fn auth_headers(&self) -> Headers {
        let mut headers = Headers::new();
        let credentials = base64::encode(&format!("{}:{}", self.client_id, self.client_secret));
        headers.set_raw("authorization", format!("Basic {}", credentials));
        headers
    }
}

fn from_http_error(e: HttpError) -> Error {
    let kind = match e {
        HttpError::Api(StatusCode::Unauthorized, _) | HttpError::Api(StatusCode::Forbidden, _) => ErrorKind::Unauthorized,
        HttpError::Api(StatusCode::BadRequest, _) | HttpError::Api(StatusCode::UnprocessableEntity, _) => ErrorKind::Rejected,
        _ => ErrorKind::Internal,
    };
    ectx!(err e, ErrorSource::HttpClient, kind)
}

impl<C: HttpClient + Clone> WalletClient for WalletClientImpl<C> {
    fn create_payment(&self, input: NewPayment) -> Box<Future<Item = Payment, Error = Error> + Send> {
        let url = format!("{}/v1/payments", self.url);
        let body = serde_json::to_string(&input).ok();
        Box::new(
            self.client
                .request_json::<Payment>(Method::Post, url, body, Some(self.auth_headers()))
                .map_err(from_http_error),
        )
    }

    fn get_payment(&self, payment_id: String) -> Box<Future<Item = Payment, Error = Error> + Send> {
        let url = format!("{}/v1/payments/{}", self.url, payment_id);
        Box::new(
            self.client
                .request_json::<Payment>(Method::Get, url, None, Some(self.auth_headers()))
                .map_err(from_http_error),
        )
    }

    fn execute_payment(&self, payment_id: String, input: ExecutePayment) -> Box<Future<Item = Payment, Error = Error> + Send> {
        let url = format!("{}/v1/payments/{}/execute", self.url, payment_id);
        let body = serde_json::to_string(&input).ok();
        Box::new(
            self.client
                .request_json::<Payment>(Method::Post, url, body, Some(self.auth_headers()))
                .map_err(from_http_error),
        )
    }
}
