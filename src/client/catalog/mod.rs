//! Client of the catalog service that owns shops, products (prices and
//! stock) and delivery persons. The engine consumes it read-mostly; the
//! only writes are the atomic stock movements around order creation.

mod error;
pub mod mock;
mod types;

use std::sync::Arc;

use futures::Future;
use hyper::{Method, StatusCode};
use serde_json;

use http::client::{Error as HttpError, HttpClient};
use models::{DeliveryPersonId, ProductId, ShopId};

pub use self::error::*;
pub use self::types::*;

pub trait CatalogClient: Send + Sync + 'static {
    fn get_shop(&self, shop_id: ShopId) -> Box<Future<Item = Shop, Error = Error> + Send>;

    fn get_product(&self, product_id: ProductId) -> Box<Future<Item = Product, Error = Error> + Send>;

    /// Atomic compare-and-decrement on the catalog side. Fails with
    /// `OutOfStock` when the remaining stock does not cover `quantity`.
    fn decrement_stock(&self, product_id: ProductId, quantity: i32) -> Box<Future<Item = (), Error = Error> + Send>;

    /// Compensating move for a failed order creation
    fn increment_stock(&self, product_id: ProductId, quantity: i32) -> Box<Future<Item = (), Error = Error> + Send>;

    fn get_delivery_person(&self, delivery_person_id: DeliveryPersonId) -> Box<Future<Item = DeliveryPerson, Error = Error> + Send>;
}

impl<T: ?Sized + CatalogClient> CatalogClient for Arc<T> {
    fn get_shop(&self, shop_id: ShopId) -> Box<Future<Item = Shop, Error = Error> + Send> {
        (*self.clone()).get_shop(shop_id)
    }

    fn get_product(&self, product_id: ProductId) -> Box<Future<Item = Product, Error = Error> + Send> {
        (*self.clone()).get_product(product_id)
    }

    fn decrement_stock(&self, product_id: ProductId, quantity: i32) -> Box<Future<Item = (), Error = Error> + Send> {
        (*self.clone()).decrement_stock(product_id, quantity)
    }

    fn increment_stock(&self, product_id: ProductId, quantity: i32) -> Box<Future<Item = (), Error = Error> + Send> {
        (*self.clone()).increment_stock(product_id, quantity)
    }

    fn get_delivery_person(&self, delivery_person_id: DeliveryPersonId) -> Box<Future<Item = DeliveryPerson, Error = Error> + Send> {
        (*self.clone()).get_delivery_person(delivery_person_id)
    }
}

#[derive(Clone)]
pub struct CatalogClientImpl<C: HttpClient + Clone> {
    client: C,
    url: String,
}

impl<C: HttpClient + Clone> CatalogClientImpl<C> {
    pub fn new(client: C, url: String) -> Self {
        Self { client, url }
    }
}

fn from_http_error(e: HttpError) -> Error {
    let kind = match e {
        HttpError::Api(StatusCode::NotFound, _) => ErrorKind::NotFound,
        HttpError::Api(StatusCode::UnprocessableEntity, _) => ErrorKind::OutOfStock,
        HttpError::Api(StatusCode::BadRequest, _) => ErrorKind::MalformedInput,
        _ => ErrorKind::Internal,
    };
    ectx!(err e, ErrorSource::HttpClient, kind)
}

impl<C: HttpClient + Clone> CatalogClient for CatalogClientImpl<C> {
    fn get_shop(&self, shop_id: ShopId) -> Box<Future<Item = Shop, Error = Error> + Send> {
        let url = format!("{}/shops/{}", self.url, shop_id);
        Box::new(
            self.client
                .request_json::<Shop>(Method::Get, url, None, None)
                .map_err(from_http_error),
        )
    }

    fn get_product(&self, product_id: ProductId) -> Box<Future<Item = Product, Error = Error> + Send> {
        let url = format!("{}/products/{}", self.url, product_id);
        Box::new(
            self.client
                .request_json::<Product>(Method::Get, url, None, None)
                .map_err(from_http_error),
        )
    }

    fn decrement_stock(&self, product_id: ProductId, quantity: i32) -> Box<Future<Item = (), Error = Error> + Send> {
        let url = format!("{}/products/{}/stock/decrement", self.url, product_id);
        let body = serde_json::to_string(&StockChange { quantity }).ok();
        Box::new(
            self.client
                .request_json::<()>(Method::Post, url, body, None)
                .map_err(from_http_error),
        )
    }

    fn increment_stock(&self, product_id: ProductId, quantity: i32) -> Box<Future<Item = (), Error = Error> + Send> {
        let url = format!("{}/products/{}/stock/increment", self.url, product_id);
        let body = serde_json::to_string(&StockChange { quantity }).ok();
        Box::new(
            self.client
                .request_json::<()>(Method::Post, url, body, None)
                .map_err(from_http_error),
        )
    }

    fn get_delivery_person(&self, delivery_person_id: DeliveryPersonId) -> Box<Future<Item = DeliveryPerson, Error = Error> + Send> {
        let url = format!("{}/delivery_persons/{}", self.url, delivery_person_id);
        Box::new(
            self.client
                .request_json::<DeliveryPerson>(Method::Get, url, None, None)
                .map_err(from_http_error),
        )
    }
}
