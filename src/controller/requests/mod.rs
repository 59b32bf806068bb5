use serde_json;

use models::{NotificationTarget, OrderId, OrderStatus, PaymentAttemptId, PaymentProvider};

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionPayload {
    pub status: OrderStatus,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentIntentPayload {
    pub order_id: OrderId,
    pub provider: PaymentProvider,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmPaymentPayload {
    pub order_id: OrderId,
    pub reference: PaymentAttemptId,
    /// payer id of the redirect rail, absent for the card rail
    pub payer_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletCallbackPayload {
    pub event_type: String,
    pub payment_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendSmsPayload {
    pub order_id: OrderId,
    pub target: NotificationTarget,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitiateCallPayload {
    pub order_id: OrderId,
    pub target: NotificationTarget,
    pub context: Option<serde_json::Value>,
}
