use models::{Amount, Currency, OrderId};

/// Payment object of the redirect rail. The customer is sent to
/// `approval_url` and comes back with a payer id that `execute` consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub state: PaymentState,
    pub amount: Amount,
    pub currency: Currency,
    pub approval_url: Option<String>,
    pub reference: Option<OrderId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Created,
    Approved,
    Failed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub amount: Amount,
    pub currency: Currency,
    pub items: Vec<PaymentItem>,
    pub description: String,
    /// order id, echoed back in callbacks
    pub reference: OrderId,
    pub return_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentItem {
    pub name: String,
    pub sku: String,
    pub price: Amount,
    pub currency: Currency,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutePayment {
    pub payer_id: String,
}
