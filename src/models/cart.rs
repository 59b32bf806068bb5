use std::collections::HashMap;

use models::{Amount, CreateOrder, CreateOrderItem, Currency, ProductId, ShippingAddress, ShopId};

/// One display line of the client-side cart. The price here is a display
/// snapshot only, the server re-prices at order creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Amount,
    pub quantity: i32,
    pub currency: Currency,
}

/// Client-side cart state: line items partitioned by shop, serializable so
/// it can be rebuilt from local storage. Purely a data transform - it never
/// talks to storage or providers, and the server treats its output as
/// untrusted input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    shops: HashMap<ShopId, HashMap<ProductId, CartItem>>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds an item, merging quantities when the product is already there
    pub fn add_item(&mut self, shop_id: ShopId, item: CartItem) {
        let shop_items = self.shops.entry(shop_id).or_insert_with(HashMap::new);
        match shop_items.get_mut(&item.product_id) {
            Some(existing) => {
                existing.quantity += item.quantity;
            }
            None => {
                shop_items.insert(item.product_id, item);
            }
        }
    }

    pub fn set_quantity(&mut self, shop_id: ShopId, product_id: ProductId, quantity: i32) {
        if quantity <= 0 {
            self.remove_item(shop_id, product_id);
            return;
        }
        if let Some(shop_items) = self.shops.get_mut(&shop_id) {
            if let Some(item) = shop_items.get_mut(&product_id) {
                item.quantity = quantity;
            }
        }
    }

    pub fn remove_item(&mut self, shop_id: ShopId, product_id: ProductId) {
        let empty = match self.shops.get_mut(&shop_id) {
            Some(shop_items) => {
                shop_items.remove(&product_id);
                shop_items.is_empty()
            }
            None => false,
        };
        if empty {
            self.shops.remove(&shop_id);
        }
    }

    pub fn clear_shop(&mut self, shop_id: ShopId) {
        self.shops.remove(&shop_id);
    }

    pub fn shop_ids(&self) -> Vec<ShopId> {
        self.shops.keys().cloned().collect()
    }

    /// Items of one shop, ordered by product id for stable output
    pub fn items_for_shop(&self, shop_id: ShopId) -> Vec<CartItem> {
        let mut items: Vec<CartItem> = self
            .shops
            .get(&shop_id)
            .map(|shop_items| shop_items.values().cloned().collect())
            .unwrap_or_default();
        items.sort_by_key(|item| *item.product_id.inner());
        items
    }

    /// Display subtotal of one shop's slice of the cart
    pub fn subtotal_for_shop(&self, shop_id: ShopId) -> Option<Amount> {
        let mut subtotal = Amount::zero();
        for item in self.items_for_shop(shop_id) {
            subtotal = subtotal.checked_add(item.unit_price.checked_mul(item.quantity as i64)?)?;
        }
        Some(subtotal)
    }

    /// Produces the order-creation request for one shop, or None when the
    /// cart holds nothing for it. An order always belongs to exactly one
    /// shop, so checkout of a mixed cart is one request per shop.
    pub fn checkout(
        &self,
        shop_id: ShopId,
        customer_name: String,
        customer_email: String,
        customer_phone: Option<String>,
        shipping_address: ShippingAddress,
        shipping_cost: Option<Amount>,
        notes: Option<String>,
    ) -> Option<CreateOrder> {
        let items = self.items_for_shop(shop_id);
        if items.is_empty() {
            return None;
        }

        let items = items
            .into_iter()
            .map(|item| CreateOrderItem {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect();

        Some(CreateOrder {
            shop_id,
            customer_name,
            customer_email,
            customer_phone,
            shipping_address,
            items,
            shipping_cost,
            notes,
            meta: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json;
    use uuid::Uuid;

    fn cart_item(product_id: ProductId, quantity: i32) -> CartItem {
        CartItem {
            product_id,
            name: "item".to_string(),
            unit_price: Amount::new(500),
            quantity,
            currency: Currency::Eur,
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            street: "1 rue de Rivoli".to_string(),
            city: "Paris".to_string(),
            postal_code: "75001".to_string(),
            country: "FR".to_string(),
            state: None,
        }
    }

    #[test]
    fn adding_the_same_product_merges_quantities() {
        let shop_id = ShopId::new(Uuid::new_v4());
        let product_id = ProductId::new(Uuid::new_v4());
        let mut cart = Cart::new();

        cart.add_item(shop_id, cart_item(product_id, 1));
        cart.add_item(shop_id, cart_item(product_id, 2));

        let items = cart.items_for_shop(shop_id);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
    }

    #[test]
    fn items_are_partitioned_by_shop() {
        let shop_a = ShopId::new(Uuid::new_v4());
        let shop_b = ShopId::new(Uuid::new_v4());
        let mut cart = Cart::new();

        cart.add_item(shop_a, cart_item(ProductId::new(Uuid::new_v4()), 1));
        cart.add_item(shop_b, cart_item(ProductId::new(Uuid::new_v4()), 2));

        assert_eq!(cart.items_for_shop(shop_a).len(), 1);
        assert_eq!(cart.items_for_shop(shop_b).len(), 1);
        assert_eq!(cart.shop_ids().len(), 2);
    }

    #[test]
    fn setting_quantity_to_zero_removes_the_line() {
        let shop_id = ShopId::new(Uuid::new_v4());
        let product_id = ProductId::new(Uuid::new_v4());
        let mut cart = Cart::new();

        cart.add_item(shop_id, cart_item(product_id, 2));
        cart.set_quantity(shop_id, product_id, 0);

        assert!(cart.items_for_shop(shop_id).is_empty());
        assert!(cart.shop_ids().is_empty());
    }

    #[test]
    fn checkout_produces_a_request_without_prices() {
        let shop_id = ShopId::new(Uuid::new_v4());
        let product_id = ProductId::new(Uuid::new_v4());
        let mut cart = Cart::new();
        cart.add_item(shop_id, cart_item(product_id, 2));

        let request = cart
            .checkout(
                shop_id,
                "Jean Dupont".to_string(),
                "jean@example.com".to_string(),
                Some("+33612345678".to_string()),
                address(),
                Some(Amount::new(300)),
                None,
            )
            .unwrap();

        assert_eq!(request.shop_id, shop_id);
        assert_eq!(
            request.items,
            vec![CreateOrderItem {
                product_id,
                quantity: 2
            }]
        );
    }

    #[test]
    fn checkout_of_an_unknown_shop_yields_nothing() {
        let cart = Cart::new();
        assert!(cart
            .checkout(
                ShopId::new(Uuid::new_v4()),
                "Jean Dupont".to_string(),
                "jean@example.com".to_string(),
                None,
                address(),
                None,
                None,
            )
            .is_none());
    }

    #[test]
    fn cart_is_rebuilt_from_serialized_state() {
        let shop_id = ShopId::new(Uuid::new_v4());
        let product_id = ProductId::new(Uuid::new_v4());
        let mut cart = Cart::new();
        cart.add_item(shop_id, cart_item(product_id, 2));

        let stored = serde_json::to_string(&cart).unwrap();
        let restored: Cart = serde_json::from_str(&stored).unwrap();

        assert_eq!(restored.items_for_shop(shop_id), cart.items_for_shop(shop_id));
    }
}
