//! Client of the SMS / voice provider. The engine only issues requests and
//! records the outcomes it is told about - delivery guarantees stay with
//! the provider.

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

pub trait MessagingClient: Send + Sync + 'static {
    fn send_message(&self, input: OutboundMessage) -> Box<Future<Item = MessageResponse, Error = Error> + Send>;

    fn place_call(&self, input: OutboundCall) -> Box<Future<Item = CallResponse, Error = Error> + Send>;
}

impl<T: ?Sized + MessagingClient> MessagingClient for Arc<T> {
    fn send_message(&self, input: OutboundMessage) -> Box<Future<Item = MessageResponse, Error = Error> + Send> {
        (*self.clone()).send_message(input)
    }

    fn place_call(&self, input: OutboundCall) -> Box<Future<Item = CallResponse, Error = Error> + Send> {
        (*self.clone()).place_call(input)
    }
}

#[derive(Clone)]
pub struct MessagingClientImpl<C: HttpClient + Clone> {
    client: C,
    url: String,
    account_id: String,
    auth_token: String,
}

impl<C: HttpClient + Clone> MessagingClientImpl<C> {
    pub fn create_from_config(client: C, config: &config::Messaging) -> Self {
        Self {
            client,
            url: config.url.clone(),
            account_id: config.account_id.clone(),
            auth_token: config.auth_token.clone(),
        }
    }

    fn auth_headers(&self) -> Headers {
        let mut headers = Headers::new();
        let credentials = base64::encode(&format!("{}:{}", self.account_id, self.auth_token));
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

impl<C: HttpClient + Clone> MessagingClient for MessagingClientImpl<C> {
    fn send_message(&self, input: OutboundMessage) -> Box<Future<Item = MessageResponse, Error = Error> + Send> {
        let url = format!("{}/v1/accounts/{}/messages", self.url, self.account_id);
        let body = serde_json::to_string(&input).ok();
        Box::new(
            self.client
                .request_json::<MessageResponse>(Method::Post, url, body, Some(self.auth_headers()))
                .map_err(from_http_error),
        )
    }

    fn place_call(&self, input: OutboundCall) -> Box<Future<Item = CallResponse, Error = Error> + Send> {
        let url = format!("{}/v1/accounts/{}/calls", self.url, self.account_id);
        let body = serde_json::to_string(&input).ok();
        Box::new(
            self.client
                .request_json::<CallResponse>(Method::Post, url, body, Some(self.auth_headers()))
                .map_err(from_http_error),
        )
    }
}
