use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::sql_types::Uuid as SqlUuid;
use serde_json;
use uuid::{self, Uuid};
use validator::Validate;

use models::{Amount, Currency, DeliveryPersonId, OrderStatus, ProductId, ShopId, UserId};
use schema::orders;

#[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, Copy, PartialEq, Eq, Hash)]
#[sql_type = "SqlUuid"]
pub struct OrderId(Uuid);
newtype_from_to_sql!(SqlUuid, OrderId, OrderId);

impl OrderId {
    pub fn new(id: Uuid) -> Self {
        OrderId(id)
    }

    pub fn inner(&self) -> &Uuid {
        &self.0
    }

    pub fn into_inner(self) -> Uuid {
        self.0
    }

    pub fn generate() -> Self {
        OrderId(Uuid::new_v4())
    }
}

impl FromStr for OrderId {
    type Err = uuid::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = Uuid::parse_str(s)?;
        Ok(OrderId::new(id))
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&format!("{}", self.0.hyphenated()))
    }
}

/// One snapshotted line item of an order. Prices are fixed at order time,
/// later catalog changes do not alter historical orders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Amount,
    pub quantity: i32,
    pub currency: Currency,
}

impl OrderItem {
    pub fn line_total(&self) -> Option<Amount> {
        self.unit_price.checked_mul(self.quantity as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderTotals {
    pub subtotal: Amount,
    pub total: Amount,
}

/// Recomputes totals from snapshotted items. Returns None on overflow.
pub fn calculate_totals(items: &[OrderItem], shipping_cost: Amount) -> Option<OrderTotals> {
    let mut subtotal = Amount::zero();
    for item in items {
        subtotal = subtotal.checked_add(item.line_total()?)?;
    }
    let total = subtotal.checked_add(shipping_cost)?;
    Some(OrderTotals { subtotal, total })
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
pub struct RawOrder {
    pub id: OrderId,
    pub shop_id: ShopId,
    pub user_id: Option<UserId>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub shipping_address: serde_json::Value,
    pub items: serde_json::Value,
    pub currency: Currency,
    pub subtotal: Amount,
    pub shipping_cost: Amount,
    pub total: Amount,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub carrier_name: Option<String>,
    pub tracking_url: Option<String>,
    pub estimated_delivery_at: Option<NaiveDateTime>,
    pub shipped_at: Option<NaiveDateTime>,
    pub delivered_at: Option<NaiveDateTime>,
    pub assigned_user_id: Option<UserId>,
    pub assigned_delivery_person_id: Option<DeliveryPersonId>,
    pub notes: Option<String>,
    pub meta: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl RawOrder {
    pub fn typed_items(&self) -> Result<Vec<OrderItem>, serde_json::Error> {
        serde_json::from_value(self.items.clone())
    }

    pub fn typed_shipping_address(&self) -> Result<ShippingAddress, serde_json::Error> {
        serde_json::from_value(self.shipping_address.clone())
    }
}

#[derive(Debug, Clone, Insertable)]
#[table_name = "orders"]
pub struct NewOrder {
    pub id: OrderId,
    pub shop_id: ShopId,
    pub user_id: Option<UserId>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub shipping_address: serde_json::Value,
    pub items: serde_json::Value,
    pub currency: Currency,
    pub subtotal: Amount,
    pub shipping_cost: Amount,
    pub total: Amount,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub meta: Option<serde_json::Value>,
}

/// Order-creation request. Prices are deliberately absent from the line
/// items: the server re-prices everything from the catalog, whatever a
/// client-side cart claims.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrder {
    pub shop_id: ShopId,
    #[validate(length(min = "1", max = "255", message = "Name must not be empty"))]
    pub customer_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub shipping_address: ShippingAddress,
    #[validate(length(min = "1", message = "Cart must not be empty"))]
    pub items: Vec<CreateOrderItem>,
    pub shipping_cost: Option<Amount>,
    pub notes: Option<String>,
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateOrderItem {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Fulfilment fields that can be set without a status change. `None`
/// fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, AsChangeset)]
#[table_name = "orders"]
pub struct UpdateFulfilment {
    pub tracking_number: Option<String>,
    pub carrier_name: Option<String>,
    pub tracking_url: Option<String>,
    pub estimated_delivery_at: Option<NaiveDateTime>,
    pub assigned_user_id: Option<UserId>,
    pub assigned_delivery_person_id: Option<DeliveryPersonId>,
}

impl UpdateFulfilment {
    pub fn is_empty(&self) -> bool {
        self.tracking_number.is_none()
            && self.carrier_name.is_none()
            && self.tracking_url.is_none()
            && self.estimated_delivery_at.is_none()
            && self.assigned_user_id.is_none()
            && self.assigned_delivery_person_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn item(price: i64, quantity: i32) -> OrderItem {
        OrderItem {
            product_id: ProductId::new(Uuid::new_v4()),
            name: "item".to_string(),
            unit_price: Amount::new(price),
            quantity,
            currency: Currency::Eur,
        }
    }

    #[test]
    fn totals_are_sum_of_lines_plus_shipping() {
        // 1 x 10.00 EUR + 2 x 5.00 EUR, shipping 3.00 EUR
        let items = vec![item(1000, 1), item(500, 2)];
        let totals = calculate_totals(&items, Amount::new(300)).unwrap();
        assert_eq!(totals.subtotal, Amount::new(2000));
        assert_eq!(totals.total, Amount::new(2300));
    }

    #[test]
    fn totals_with_no_shipping_cost() {
        let items = vec![item(250, 4)];
        let totals = calculate_totals(&items, Amount::zero()).unwrap();
        assert_eq!(totals.subtotal, Amount::new(1000));
        assert_eq!(totals.total, Amount::new(1000));
    }

    #[test]
    fn totals_overflow_is_detected() {
        let items = vec![item(i64::max_value(), 2)];
        assert_eq!(calculate_totals(&items, Amount::zero()), None);
    }

    #[test]
    fn items_round_trip_through_json() {
        let items = vec![item(1000, 1), item(500, 2)];
        let value = serde_json::to_value(&items).unwrap();
        let parsed: Vec<OrderItem> = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, items);
    }
}
