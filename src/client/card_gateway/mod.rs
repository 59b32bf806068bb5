//! Client of the card rail. Creating an intent yields a client secret the
//! storefront completes the payment with; `get_intent` is the server-side
//! source of truth a confirmation proof is checked against.

mod error;
pub mod mock;
mod types;

use std::sync::Arc;

use futures::Future;
use hex;
use hyper::header::{Authorization, Bearer, Headers};
use hyper::{Method, StatusCode};
use serde_json;
use sha2::{Digest, Sha256};

use config;
use http::client::{Error as HttpError, HttpClient};
use models::PaymentAttemptId;

pub use self::error::*;
pub use self::types::*;

pub trait CardGatewayClient: Send + Sync + 'static {
    fn create_intent(&self, input: NewIntent) -> Box<Future<Item = Intent, Error = Error> + Send>;

    fn get_intent(&self, intent_id: PaymentAttemptId) -> Box<Future<Item = Intent, Error = Error> + Send>;
}

impl<T: ?Sized + CardGatewayClient> CardGatewayClient for Arc<T> {
    fn create_intent(&self, input: NewIntent) -> Box<Future<Item = Intent, Error = Error> + Send> {
        (*self.clone()).create_intent(input)
    }

    fn get_intent(&self, intent_id: PaymentAttemptId) -> Box<Future<Item = Intent, Error = Error> + Send> {
        (*self.clone()).get_intent(intent_id)
    }
}

#[derive(Clone)]
pub struct CardGatewayClientImpl<C: HttpClient + Clone> {
    client: C,
    url: String,
    secret_key: String,
}

impl<C: HttpClient + Clone> CardGatewayClientImpl<C> {
    pub fn create_from_config(client: C, config: &config::CardGateway) -> Self {
        Self {
            client,
            url: config.url.clone(),
            secret_key: config.secret_key.clone(),
        }
    }

    fn auth_headers(&self) -> Headers {
        let mut headers = Headers::new();
        headers.set(Authorization(Bearer {
            token: self.secret_key.clone(),
        }));
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

impl<C: HttpClient + Clone> CardGatewayClient for CardGatewayClientImpl<C> {
    fn create_intent(&self, input: NewIntent) -> Box<Future<Item = Intent, Error = Error> + Send> {
        let url = format!("{}/v1/intents", self.url);
        let body = serde_json::to_string(&input).ok();
        Box::new(
            self.client
                .request_json::<Intent>(Method::Post, url, body, Some(self.auth_headers()))
                .map_err(from_http_error),
        )
    }

    fn get_intent(&self, intent_id: PaymentAttemptId) -> Box<Future<Item = Intent, Error = Error> + Send> {
        let url = format!("{}/v1/intents/{}", self.url, intent_id);
        Box::new(
            self.client
                .request_json::<Intent>(Method::Get, url, None, Some(self.auth_headers()))
                .map_err(from_http_error),
        )
    }
}

/// Hex SHA-256 over signing secret, timestamp and the raw payload. The
/// gateway sends it in the `signature` header of every webhook delivery.
pub fn webhook_signature(signing_secret: &str, timestamp: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.input(signing_secret.as_bytes());
    hasher.input(timestamp.as_bytes());
    hasher.input(payload.as_bytes());
    hex::encode(hasher.result())
}

pub fn verify_webhook_signature(signing_secret: &str, timestamp: &str, payload: &str, signature: &str) -> bool {
    webhook_signature(signing_secret, timestamp, payload) == signature.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_signature_matches_known_vector() {
        let signature = webhook_signature("whsec_test", "1600000000", "{\"event_type\":\"payment_intent.succeeded\"}");
        assert_eq!(signature, "a75511d35c111d412067d8ea6bc0402182e909d0dd3c68f9370bf6b227bea2b4");
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let signature = webhook_signature("whsec_test", "1600000000", "{\"event_type\":\"payment_intent.succeeded\"}");
        assert!(!verify_webhook_signature("whsec_test", "1600000000", "tampered", &signature));
        assert!(verify_webhook_signature(
            "whsec_test",
            "1600000000",
            "{\"event_type\":\"payment_intent.succeeded\"}",
            &signature
        ));
    }

    #[test]
    fn webhook_event_types_deserialize_from_provider_names() {
        let event: WebhookEventType = ::serde_json::from_str("\"payment_intent.succeeded\"").unwrap();
        assert_eq!(event, WebhookEventType::IntentSucceeded);
        let event: WebhookEventType = ::serde_json::from_str("\"payment_intent.created\"").unwrap();
        assert_eq!(event, WebhookEventType::Other);
    }
}
