use bigdecimal::BigDecimal;

use models::{Amount, Currency, DeliveryPersonId, OrderStatus, ProductId, ShopId, UserId};

/// Shop record as the catalog service exposes it. Prices and stock always
/// come from here, never from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    pub id: ShopId,
    pub user_id: UserId,
    pub name: String,
    pub url: Option<String>,
    pub phone_number: Option<String>,
    pub is_public: bool,
    pub accepts_orders: bool,
    /// statuses the shop wants its customers notified about
    #[serde(default)]
    pub notify_statuses: Vec<OrderStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub shop_id: ShopId,
    pub name: String,
    /// decimal price in major units, e.g. "10.00"
    pub price: BigDecimal,
    pub currency: Currency,
    pub stock: i64,
}

impl Product {
    pub fn price_amount(&self) -> Option<Amount> {
        Amount::from_super_unit(self.price.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPerson {
    pub id: DeliveryPersonId,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockChange {
    pub quantity: i32,
}
