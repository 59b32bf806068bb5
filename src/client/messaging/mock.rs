use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::IntoFuture;
use futures::Future;
use uuid::Uuid;

use super::error::*;
use super::types::*;
use super::MessagingClient;

#[derive(Clone, Default)]
struct State {
    messages: Vec<OutboundMessage>,
    calls: Vec<OutboundCall>,
}

/// In-memory messaging provider with failure injection, so tests can
/// simulate an outage without a network.
#[derive(Clone, Default)]
pub struct MockMessagingClient {
    state: Arc<Mutex<State>>,
    failing: Arc<AtomicBool>,
}

impl MockMessagingClient {
    /// All subsequent sends fail with a provider error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn placed_calls(&self) -> Vec<OutboundCall> {
        self.state.lock().unwrap().calls.clone()
    }
}

impl MessagingClient for MockMessagingClient {
    fn send_message(&self, input: OutboundMessage) -> Box<Future<Item = MessageResponse, Error = Error> + Send> {
        if self.failing.load(Ordering::SeqCst) {
            return Box::new(Err(Error::from(ErrorKind::Internal)).into_future());
        }

        self.state.lock().unwrap().messages.push(input);

        let response = MessageResponse {
            sid: format!("SM{}", Uuid::new_v4().simple()),
            status: "queued".to_string(),
        };
        Box::new(Ok(response).into_future())
    }

    fn place_call(&self, input: OutboundCall) -> Box<Future<Item = CallResponse, Error = Error> + Send> {
        if self.failing.load(Ordering::SeqCst) {
            return Box::new(Err(Error::from(ErrorKind::Internal)).into_future());
        }

        self.state.lock().unwrap().calls.push(input);

        let response = CallResponse {
            sid: format!("CA{}", Uuid::new_v4().simple()),
            status: "initiated".to_string(),
        };
        Box::new(Ok(response).into_future())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> OutboundMessage {
        OutboundMessage {
            to: "+33612345678".to_string(),
            from: "+15005550006".to_string(),
            body: "Your order has been shipped".to_string(),
        }
    }

    #[test]
    fn sends_are_recorded() {
        let client = MockMessagingClient::default();
        let response = client.send_message(message()).wait().unwrap();
        assert!(response.sid.starts_with("SM"));
        assert_eq!(client.sent_messages().len(), 1);
    }

    #[test]
    fn injected_outage_fails_sends_without_recording_them() {
        let client = MockMessagingClient::default();
        client.set_failing(true);

        let err = client.send_message(message()).wait().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(client.sent_messages().is_empty());
    }
}
