use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::IntoFuture;
use futures::Future;

use super::error::*;
use super::types::{DeliveryPerson, Product, Shop};
use super::CatalogClient;
use models::{DeliveryPersonId, ProductId, ShopId};

#[derive(Clone, Default)]
struct State {
    shops: HashMap<ShopId, Shop>,
    products: HashMap<ProductId, Product>,
    delivery_persons: HashMap<DeliveryPersonId, DeliveryPerson>,
}

/// In-memory catalog. Stock moves are performed under one lock, so the
/// compare-and-decrement is atomic exactly like the real service's.
#[derive(Clone, Default)]
pub struct MockCatalogClient {
    state: Arc<Mutex<State>>,
}

impl MockCatalogClient {
    pub fn with_shop(&self, shop: Shop) {
        self.state.lock().unwrap().shops.insert(shop.id, shop);
    }

    pub fn with_product(&self, product: Product) {
        self.state.lock().unwrap().products.insert(product.id, product);
    }

    pub fn with_delivery_person(&self, delivery_person: DeliveryPerson) {
        self.state
            .lock()
            .unwrap()
            .delivery_persons
            .insert(delivery_person.id, delivery_person);
    }

    pub fn stock_of(&self, product_id: ProductId) -> Option<i64> {
        self.state.lock().unwrap().products.get(&product_id).map(|p| p.stock)
    }
}

impl CatalogClient for MockCatalogClient {
    fn get_shop(&self, shop_id: ShopId) -> Box<Future<Item = Shop, Error = Error> + Send> {
        let state = self.state.lock().unwrap();
        let result = state.shops.get(&shop_id).cloned().ok_or(ErrorKind::NotFound.into());
        Box::new(result.into_future())
    }

    fn get_product(&self, product_id: ProductId) -> Box<Future<Item = Product, Error = Error> + Send> {
        let state = self.state.lock().unwrap();
        let result = state.products.get(&product_id).cloned().ok_or(ErrorKind::NotFound.into());
        Box::new(result.into_future())
    }

    fn decrement_stock(&self, product_id: ProductId, quantity: i32) -> Box<Future<Item = (), Error = Error> + Send> {
        let mut state = self.state.lock().unwrap();
        let result = match state.products.get_mut(&product_id) {
            None => Err(ErrorKind::NotFound.into()),
            Some(product) => {
                if product.stock >= quantity as i64 {
                    product.stock -= quantity as i64;
                    Ok(())
                } else {
                    Err(ErrorKind::OutOfStock.into())
                }
            }
        };
        Box::new(result.into_future())
    }

    fn increment_stock(&self, product_id: ProductId, quantity: i32) -> Box<Future<Item = (), Error = Error> + Send> {
        let mut state = self.state.lock().unwrap();
        let result = match state.products.get_mut(&product_id) {
            None => Err(ErrorKind::NotFound.into()),
            Some(product) => {
                product.stock += quantity as i64;
                Ok(())
            }
        };
        Box::new(result.into_future())
    }

    fn get_delivery_person(&self, delivery_person_id: DeliveryPersonId) -> Box<Future<Item = DeliveryPerson, Error = Error> + Send> {
        let state = self.state.lock().unwrap();
        let result = state
            .delivery_persons
            .get(&delivery_person_id)
            .cloned()
            .ok_or(ErrorKind::NotFound.into());
        Box::new(result.into_future())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;
    use std::thread;

    use bigdecimal::BigDecimal;
    use futures::Future;
    use uuid::Uuid;

    use super::*;
    use models::Currency;

    fn product(stock: i64) -> Product {
        Product {
            id: ProductId::new(Uuid::new_v4()),
            shop_id: ShopId::new(Uuid::new_v4()),
            name: "limited".to_string(),
            price: BigDecimal::from_str("10.00").unwrap(),
            currency: Currency::Eur,
            stock,
        }
    }

    #[test]
    fn decrement_fails_when_stock_is_short() {
        let client = MockCatalogClient::default();
        let p = product(1);
        let id = p.id;
        client.with_product(p);

        assert!(client.decrement_stock(id, 1).wait().is_ok());
        let err = client.decrement_stock(id, 1).wait().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfStock);
        assert_eq!(client.stock_of(id), Some(0));
    }

    #[test]
    fn concurrent_decrements_never_oversell() {
        // stock of 5, 16 buyers racing for one unit each
        let client = Arc::new(MockCatalogClient::default());
        let p = product(5);
        let id = p.id;
        client.with_product(p);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let client = client.clone();
                thread::spawn(move || client.decrement_stock(id, 1).wait().is_ok())
            })
            .collect();

        let sold = handles.into_iter().filter(|h| h.join().unwrap()).count();

        assert_eq!(sold, 5);
        assert_eq!(client.stock_of(id), Some(0));
    }

    #[test]
    fn increment_compensates_a_decrement() {
        let client = MockCatalogClient::default();
        let p = product(3);
        let id = p.id;
        client.with_product(p);

        client.decrement_stock(id, 2).wait().unwrap();
        client.increment_stock(id, 2).wait().unwrap();
        assert_eq!(client.stock_of(id), Some(3));
    }
}
