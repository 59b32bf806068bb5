use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use futures::future::IntoFuture;
use futures::Future;
use uuid::Uuid;

use super::error::*;
use super::types::*;
use super::WalletClient;

#[derive(Clone, Default)]
struct State {
    payments: HashMap<String, Payment>,
    /// payer ids the "customer" produced by approving a payment
    approvals: HashSet<(String, String)>,
}

/// In-memory wallet rail. `approve` simulates the customer walking
/// through the approval url and yields the payer id that a subsequent
/// `execute_payment` must present.
#[derive(Clone, Default)]
pub struct MockWalletClient {
    state: Arc<Mutex<State>>,
}

impl MockWalletClient {
    /// Simulates customer approval, returns the payer id
    pub fn approve(&self, payment_id: String) -> String {
        let payer_id = format!("payer_{}", Uuid::new_v4().simple());
        self.state.lock().unwrap().approvals.insert((payment_id, payer_id.clone()));
        payer_id
    }
}

impl WalletClient for MockWalletClient {
    fn create_payment(&self, input: NewPayment) -> Box<Future<Item = Payment, Error = Error> + Send> {
        let id = format!("pay_{}", Uuid::new_v4().simple());
        let payment = Payment {
            id: id.clone(),
            state: PaymentState::Created,
            amount: input.amount,
            currency: input.currency,
            approval_url: Some(format!("https://wallet.example.com/approve/{}", id)),
            reference: Some(input.reference),
        };

        self.state.lock().unwrap().payments.insert(id, payment.clone());

        Box::new(Ok(payment).into_future())
    }

    fn get_payment(&self, payment_id: String) -> Box<Future<Item = Payment, Error = Error> + Send> {
        let state = self.state.lock().unwrap();
        let result = state.payments.get(&payment_id).cloned().ok_or(ErrorKind::Rejected.into());
        Box::new(result.into_future())
    }

    fn execute_payment(&self, payment_id: String, input: ExecutePayment) -> Box<Future<Item = Payment, Error = Error> + Send> {
        let mut state = self.state.lock().unwrap();

        let approved = state.approvals.contains(&(payment_id.clone(), input.payer_id.clone()));
        let result = match state.payments.get_mut(&payment_id) {
            None => Err(ErrorKind::Rejected.into()),
            Some(payment) => {
                if approved {
                    payment.state = PaymentState::Approved;
                    Ok(payment.clone())
                } else {
                    payment.state = PaymentState::Failed;
                    Err(ErrorKind::Rejected.into())
                }
            }
        };

        Box::new(result.into_future())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{Amount, Currency, OrderId};

    fn new_payment() -> NewPayment {
        NewPayment {
            amount: Amount::new(2300),
            currency: Currency::Eur,
            items: vec![],
            description: "Order".to_string(),
            reference: OrderId::generate(),
            return_url: "https://shop.example.com/return".to_string(),
            cancel_url: "https://shop.example.com/cancel".to_string(),
        }
    }

    #[test]
    fn created_payments_carry_an_approval_url() {
        let client = MockWalletClient::default();
        let payment = client.create_payment(new_payment()).wait().unwrap();
        assert!(payment.approval_url.is_some());
        assert_eq!(payment.state, PaymentState::Created);
    }

    #[test]
    fn executing_with_the_approved_payer_succeeds() {
        let client = MockWalletClient::default();
        let payment = client.create_payment(new_payment()).wait().unwrap();
        let payer_id = client.approve(payment.id.clone());

        let executed = client.execute_payment(payment.id, ExecutePayment { payer_id }).wait().unwrap();
        assert_eq!(executed.state, PaymentState::Approved);
    }

    #[test]
    fn executing_without_approval_is_rejected() {
        let client = MockWalletClient::default();
        let payment = client.create_payment(new_payment()).wait().unwrap();

        let err = client
            .execute_payment(
                payment.id,
                ExecutePayment {
                    payer_id: "payer_unknown".to_string(),
                },
            )
            .wait()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rejected);
    }
}
