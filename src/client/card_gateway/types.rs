use models::{Amount, Currency, OrderId, PaymentAttemptId, ShopId};

/// Payment intent object as the card gateway returns it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub id: PaymentAttemptId,
    pub status: IntentStatus,
    pub amount: Amount,
    pub currency: Currency,
    pub client_secret: Option<String>,
    pub metadata: Option<IntentMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    Processing,
    Succeeded,
    Canceled,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentMetadata {
    pub order_id: OrderId,
    pub shop_id: ShopId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIntent {
    pub amount: Amount,
    pub currency: Currency,
    pub metadata: IntentMetadata,
}

/// Webhook event body. The gateway signs `timestamp` + raw body with the
/// shared signing secret; see `webhook_signature`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event_type: WebhookEventType,
    pub intent: Intent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEventType {
    #[serde(rename = "payment_intent.succeeded")]
    IntentSucceeded,
    #[serde(rename = "payment_intent.payment_failed")]
    IntentPaymentFailed,
    #[serde(other)]
    Other,
}
