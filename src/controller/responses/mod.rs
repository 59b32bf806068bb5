use models::{OrderId, OrderStatus, PaymentAttempt, PaymentAttemptId, PaymentAttemptState, PaymentProvider};

/// Client data needed to complete a payment: a client secret on the card
/// rail, an approval url on the redirect rail
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntentResponse {
    pub reference: PaymentAttemptId,
    pub provider: PaymentProvider,
    pub client_secret: Option<String>,
    pub approval_url: Option<String>,
}

impl From<PaymentAttempt> for PaymentIntentResponse {
    fn from(attempt: PaymentAttempt) -> Self {
        Self {
            reference: attempt.id,
            provider: attempt.provider,
            client_secret: attempt.client_secret,
            approval_url: attempt.approval_url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmResponse {
    pub order_id: OrderId,
    pub reference: PaymentAttemptId,
    pub state: PaymentAttemptState,
    pub order_status: OrderStatus,
}
