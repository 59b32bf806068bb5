use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::IntoFuture;
use futures::Future;
use uuid::Uuid;

use super::error::*;
use super::types::*;
use super::CardGatewayClient;
use models::PaymentAttemptId;

#[derive(Clone, Default)]
struct State {
    intents: HashMap<PaymentAttemptId, Intent>,
}

/// In-memory card gateway for tests. Intents start in
/// `requires_confirmation`; `pay` simulates the customer completing the
/// payment on the client side.
#[derive(Clone, Default)]
pub struct MockCardGatewayClient {
    state: Arc<Mutex<State>>,
}

impl MockCardGatewayClient {
    /// Simulates a successful client-side payment
    pub fn pay(&self, intent_id: PaymentAttemptId) {
        let mut state = self.state.lock().unwrap();
        if let Some(intent) = state.intents.get_mut(&intent_id) {
            intent.status = IntentStatus::Succeeded;
        }
    }

    /// Simulates a declined client-side payment
    pub fn decline(&self, intent_id: PaymentAttemptId) {
        let mut state = self.state.lock().unwrap();
        if let Some(intent) = state.intents.get_mut(&intent_id) {
            intent.status = IntentStatus::Canceled;
        }
    }
}

impl CardGatewayClient for MockCardGatewayClient {
    fn create_intent(&self, input: NewIntent) -> Box<Future<Item = Intent, Error = Error> + Send> {
        let id = PaymentAttemptId::new(format!("pi_{}", Uuid::new_v4().simple()));
        let intent = Intent {
            id: id.clone(),
            status: IntentStatus::RequiresConfirmation,
            amount: input.amount,
            currency: input.currency,
            client_secret: Some(format!("{}_secret_{}", id, Uuid::new_v4().simple())),
            metadata: Some(input.metadata),
        };

        self.state.lock().unwrap().intents.insert(id, intent.clone());

        Box::new(Ok(intent).into_future())
    }

    fn get_intent(&self, intent_id: PaymentAttemptId) -> Box<Future<Item = Intent, Error = Error> + Send> {
        let state = self.state.lock().unwrap();
        let result = state.intents.get(&intent_id).cloned().ok_or(ErrorKind::Rejected.into());
        Box::new(result.into_future())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{Amount, Currency, OrderId, ShopId};
    use uuid::Uuid;

    fn new_intent() -> NewIntent {
        NewIntent {
            amount: Amount::new(2300),
            currency: Currency::Eur,
            metadata: IntentMetadata {
                order_id: OrderId::generate(),
                shop_id: ShopId::new(Uuid::new_v4()),
            },
        }
    }

    #[test]
    fn created_intents_carry_a_client_secret() {
        let client = MockCardGatewayClient::default();
        let intent = client.create_intent(new_intent()).wait().unwrap();
        assert!(intent.client_secret.is_some());
        assert_eq!(intent.status, IntentStatus::RequiresConfirmation);
    }

    #[test]
    fn paying_marks_the_intent_succeeded() {
        let client = MockCardGatewayClient::default();
        let intent = client.create_intent(new_intent()).wait().unwrap();
        client.pay(intent.id.clone());
        let fetched = client.get_intent(intent.id).wait().unwrap();
        assert_eq!(fetched.status, IntentStatus::Succeeded);
    }
}
