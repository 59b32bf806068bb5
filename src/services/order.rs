//! Order ledger: the authoritative store of orders and the single
//! mutation path for their status.

use std::sync::Arc;

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use futures::future::IntoFuture;
use futures::{future, stream, Future, Stream};
use r2d2::ManageConnection;
use serde_json;
use validator::Validate;

use client::catalog::{CatalogClient, Error as CatalogError, ErrorKind as CatalogErrorKind, Product, Shop};
use models::{
    calculate_totals, Amount, CreateOrder, Event, EventPayload, NewOrder, NewStatusHistory, OrderId, OrderItem, OrderStatus,
    ProductId, RawOrder, RawStatusHistory, ShopId, UpdateFulfilment, UserId,
};
use repos::repo_factory::ReposFactory;
use repos::{EventStoreRepo, OrdersRepo, StatusHistoryRepo};

use super::error::{validation_errors, Error, ErrorContext, ErrorKind, ErrorSource};
use super::types::{spawn_on_pool, ServiceFuture};
use super::Service;

/// Page size of order listings
pub const ORDERS_PER_PAGE: i64 = 60;

pub trait OrderService {
    /// Validates the payload against the catalog, reserves stock, writes
    /// the order in `pending` and appends the first history entry
    fn create_order(&self, payload: CreateOrder) -> ServiceFuture<RawOrder>;
    fn get_order(&self, order_id: OrderId) -> ServiceFuture<Option<RawOrder>>;
    fn list_orders_by_shop(&self, shop_id: ShopId, page: i64) -> ServiceFuture<Vec<RawOrder>>;
    fn list_orders_by_user(&self, user_id: UserId, page: i64) -> ServiceFuture<Vec<RawOrder>>;
    fn get_status_history(&self, order_id: OrderId) -> ServiceFuture<Vec<RawStatusHistory>>;
    /// The single mutation path for order status
    fn transition(&self, order_id: OrderId, target: OrderStatus, note: Option<String>) -> ServiceFuture<RawOrder>;
    fn update_fulfilment(&self, order_id: OrderId, update: UpdateFulfilment) -> ServiceFuture<RawOrder>;
}

/// Applies one status transition on an already-locked order row: legality
/// check, precondition check, status update, history append and the outbox
/// event - all on the caller's connection so everything commits together.
/// This is the only place a status is ever written.
pub fn apply_transition(
    orders_repo: &OrdersRepo,
    status_history_repo: &StatusHistoryRepo,
    event_store_repo: &EventStoreRepo,
    order: &RawOrder,
    target: OrderStatus,
    note: Option<String>,
) -> Result<RawOrder, Error> {
    if !order.status.can_transition(target) {
        let e = format_err!("Order {} cannot go from {} to {}", order.id, order.status, target);
        return Err(ectx!(err e, ErrorKind::IllegalTransition));
    }

    if target == OrderStatus::Shipped && order.tracking_number.is_none() {
        return Err(Error::from(ErrorKind::Validation(validation_errors(
            "tracking_number",
            "required",
            "Tracking number must be set before shipping",
        ))));
    }

    let note = note.unwrap_or_else(|| format!("Status changed from {} to {}", order.status, target));

    let order_id = order.id;
    let updated = orders_repo.update_status(order_id, target).map_err(ectx!(try convert => order_id))?;
    status_history_repo
        .create(NewStatusHistory::new(order_id, target, Some(note)))
        .map_err(ectx!(try convert => order_id))?;
    event_store_repo
        .add_event(Event::new(EventPayload::OrderStatusChanged {
            order_id,
            status: target,
        }))
        .map_err(ectx!(try convert => order_id))?;

    info!("Order {} went from {} to {}", order_id, order.status, target);
    Ok(updated)
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > OrderService for Service<T, M, F>
{
    fn create_order(&self, payload: CreateOrder) -> ServiceFuture<RawOrder> {
        debug!("Creating an order for shop {}", payload.shop_id);

        let catalog = self.static_context.catalog_client.clone();
        let repo_factory = self.static_context.repo_factory.clone();
        let db_pool = self.static_context.db_pool.clone();
        let cpu_pool = self.static_context.cpu_pool.clone();
        let user_id = self.dynamic_context.user_id;

        let fut = payload
            .validate()
            .map_err(|e| Error::from(ErrorKind::Validation(e)))
            .into_future()
            .and_then({
                let catalog = catalog.clone();
                move |_| {
                    catalog
                        .get_shop(payload.shop_id)
                        .map_err(|e| checkout_catalog_error("shop_id", "Shop does not exist", e))
                        .map(move |shop| (payload, shop))
                }
            })
            .and_then({
                let catalog = catalog.clone();
                move |(payload, shop)| {
                    let product_futs = payload
                        .items
                        .iter()
                        .map(|item| {
                            catalog
                                .get_product(item.product_id)
                                .map_err(|e| checkout_catalog_error("items", "Product does not exist", e))
                        })
                        .collect::<Vec<_>>();

                    future::join_all(product_futs).map(move |products| (payload, shop, products))
                }
            })
            .and_then(move |(payload, shop, products)| build_order_draft(payload, shop, products, user_id).into_future())
            .and_then({
                let catalog = catalog.clone();
                move |draft| {
                    let to_reserve = draft.reserved_quantities();
                    reserve_stock(catalog, to_reserve.clone()).map(move |_| (draft, to_reserve))
                }
            })
            .and_then(move |(draft, reserved)| {
                spawn_on_pool(db_pool, cpu_pool, move |conn| {
                    let orders_repo = repo_factory.create_orders_repo(&conn);
                    let status_history_repo = repo_factory.create_status_history_repo(&conn);

                    conn.transaction::<RawOrder, Error, _>(move || {
                        let order = orders_repo.create(draft.new_order).map_err(ectx!(try convert))?;
                        status_history_repo
                            .create(NewStatusHistory::new(order.id, OrderStatus::Pending, Some("Order created".to_string())))
                            .map_err(ectx!(try convert => order.id))?;
                        Ok(order)
                    })
                })
                .or_else(move |e| release_stock(catalog, reserved).then(move |_| Err(e)))
            });

        Box::new(fut)
    }

    fn get_order(&self, order_id: OrderId) -> ServiceFuture<Option<RawOrder>> {
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let orders_repo = repo_factory.create_orders_repo(&conn);
            orders_repo.get(order_id).map_err(ectx!(convert => order_id))
        })
    }

    fn list_orders_by_shop(&self, shop_id: ShopId, page: i64) -> ServiceFuture<Vec<RawOrder>> {
        let repo_factory = self.static_context.repo_factory.clone();
        let (skip, count) = pagination(page);

        self.spawn_on_pool(move |conn| {
            let orders_repo = repo_factory.create_orders_repo(&conn);
            orders_repo.list_by_shop(shop_id, skip, count).map_err(ectx!(convert => shop_id))
        })
    }

    fn list_orders_by_user(&self, user_id: UserId, page: i64) -> ServiceFuture<Vec<RawOrder>> {
        let repo_factory = self.static_context.repo_factory.clone();
        let (skip, count) = pagination(page);

        self.spawn_on_pool(move |conn| {
            let orders_repo = repo_factory.create_orders_repo(&conn);
            orders_repo.list_by_user(user_id, skip, count).map_err(ectx!(convert => user_id))
        })
    }

    fn get_status_history(&self, order_id: OrderId) -> ServiceFuture<Vec<RawStatusHistory>> {
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let orders_repo = repo_factory.create_orders_repo(&conn);
            let status_history_repo = repo_factory.create_status_history_repo(&conn);

            orders_repo
                .get(order_id)
                .map_err(ectx!(try convert => order_id))?
                .ok_or({
                    let e = format_err!("Order {} not found", order_id);
                    ectx!(try err e, ErrorKind::NotFound)
                })?;

            status_history_repo.list_for_order(order_id).map_err(ectx!(convert => order_id))
        })
    }

    fn transition(&self, order_id: OrderId, target: OrderStatus, note: Option<String>) -> ServiceFuture<RawOrder> {
        debug!("Transitioning order {} to {}", order_id, target);

        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let orders_repo = repo_factory.create_orders_repo(&conn);
            let status_history_repo = repo_factory.create_status_history_repo(&conn);
            let event_store_repo = repo_factory.create_event_store_repo(&conn);

            conn.transaction::<RawOrder, Error, _>(move || {
                let order = orders_repo
                    .get_for_update(order_id)
                    .map_err(ectx!(try convert => order_id))?
                    .ok_or({
                        let e = format_err!("Order {} not found", order_id);
                        ectx!(try err e, ErrorKind::NotFound)
                    })?;

                apply_transition(&*orders_repo, &*status_history_repo, &*event_store_repo, &order, target, note)
            })
        })
    }

    fn update_fulfilment(&self, order_id: OrderId, update: UpdateFulfilment) -> ServiceFuture<RawOrder> {
        debug!("Updating fulfilment of order {}", order_id);

        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let orders_repo = repo_factory.create_orders_repo(&conn);

            conn.transaction::<RawOrder, Error, _>(move || {
                let order = orders_repo
                    .get_for_update(order_id)
                    .map_err(ectx!(try convert => order_id))?
                    .ok_or({
                        let e = format_err!("Order {} not found", order_id);
                        ectx!(try err e, ErrorKind::NotFound)
                    })?;

                if update.assigned_user_id.is_some() && update.assigned_delivery_person_id.is_some() {
                    return Err(Error::from(ErrorKind::Validation(validation_errors(
                        "assignment",
                        "exclusive",
                        "An order is assigned to either a staff user or a delivery person, not both",
                    ))));
                }

                if update.is_empty() {
                    return Ok(order);
                }

                orders_repo.update_fulfilment(order_id, update).map_err(ectx!(convert => order_id))
            })
        })
    }
}

/// At checkout an unknown shop or product is the client's fault, not a
/// lookup miss on our own state
fn checkout_catalog_error(field: &'static str, message: &'static str, e: CatalogError) -> Error {
    match e.kind() {
        CatalogErrorKind::NotFound => Error::from(ErrorKind::Validation(validation_errors(field, "not_found", message))),
        kind => {
            let kind = ErrorKind::from(kind);
            ectx!(err e, kind)
        }
    }
}

fn pagination(page: i64) -> (i64, i64) {
    let page = if page < 1 { 1 } else { page };
    ((page - 1) * ORDERS_PER_PAGE, ORDERS_PER_PAGE)
}

struct OrderDraft {
    new_order: NewOrder,
    items: Vec<OrderItem>,
}

impl OrderDraft {
    fn reserved_quantities(&self) -> Vec<(ProductId, i32)> {
        self.items.iter().map(|item| (item.product_id, item.quantity)).collect()
    }
}

/// Re-prices the payload from the catalog and assembles the insertable
/// order. Client-sent prices never enter here.
fn build_order_draft(payload: CreateOrder, shop: Shop, products: Vec<Product>, user_id: Option<UserId>) -> Result<OrderDraft, Error> {
    if !shop.accepts_orders {
        return Err(Error::from(ErrorKind::Validation(validation_errors(
            "shop_id",
            "not_order_capable",
            "Shop does not accept orders",
        ))));
    }

    let mut items = Vec::with_capacity(payload.items.len());
    let mut currency = None;

    for (line, product) in payload.items.iter().zip(products.iter()) {
        if line.quantity < 1 {
            return Err(Error::from(ErrorKind::Validation(validation_errors(
                "items",
                "quantity",
                "Quantity must be at least 1",
            ))));
        }

        if product.shop_id != payload.shop_id {
            return Err(Error::from(ErrorKind::Validation(validation_errors(
                "items",
                "foreign_product",
                "Product does not belong to the shop",
            ))));
        }

        match currency {
            None => currency = Some(product.currency),
            Some(c) if c != product.currency => {
                return Err(Error::from(ErrorKind::Validation(validation_errors(
                    "items",
                    "currency_mismatch",
                    "All items of an order must share one currency",
                ))));
            }
            Some(_) => {}
        }

        let unit_price = product
            .price_amount()
            .ok_or(ectx!(try err ErrorContext::AmountOverflow, ErrorKind::Internal))?;

        items.push(OrderItem {
            product_id: product.id,
            name: product.name.clone(),
            unit_price,
            quantity: line.quantity,
            currency: product.currency,
        });
    }

    // the validator already rejects an empty cart, this is belt and braces
    let currency = currency.ok_or({
        let e = format_err!("Order for shop {} has no items", payload.shop_id);
        ectx!(try err e, ErrorKind::Internal)
    })?;

    let shipping_cost = payload.shipping_cost.unwrap_or_else(Amount::zero);
    if shipping_cost.inner() < 0 {
        return Err(Error::from(ErrorKind::Validation(validation_errors(
            "shipping_cost",
            "negative",
            "Shipping cost cannot be negative",
        ))));
    }

    let totals = calculate_totals(&items, shipping_cost).ok_or(ectx!(try err ErrorContext::AmountOverflow, ErrorKind::Internal))?;

    let items_json = serde_json::to_value(&items).map_err(ectx!(try ErrorSource::SerdeJson, ErrorKind::Internal))?;
    let address_json = serde_json::to_value(&payload.shipping_address).map_err(ectx!(try ErrorSource::SerdeJson, ErrorKind::Internal))?;

    let new_order = NewOrder {
        id: OrderId::generate(),
        shop_id: payload.shop_id,
        user_id,
        customer_name: payload.customer_name,
        customer_email: payload.customer_email,
        customer_phone: payload.customer_phone,
        shipping_address: address_json,
        items: items_json,
        currency,
        subtotal: totals.subtotal,
        shipping_cost,
        total: totals.total,
        status: OrderStatus::Pending,
        notes: payload.notes,
        meta: payload.meta,
    };

    Ok(OrderDraft { new_order, items })
}

/// Decrements stock product by product; when one runs short, already
/// reserved quantities are handed back before the error surfaces.
fn reserve_stock(catalog: Arc<dyn CatalogClient>, items: Vec<(ProductId, i32)>) -> Box<Future<Item = (), Error = Error>> {
    let fut = stream::iter_ok::<_, (Vec<(ProductId, i32)>, Error)>(items)
        .fold(Vec::new(), {
            let catalog = catalog.clone();
            move |mut reserved, (product_id, quantity)| {
                catalog.decrement_stock(product_id, quantity).then(move |result| match result {
                    Ok(()) => {
                        reserved.push((product_id, quantity));
                        Ok(reserved)
                    }
                    Err(e) => {
                        let e = ectx!(convert => product_id, quantity)(e);
                        Err((reserved, e))
                    }
                })
            }
        })
        .map(|_| ())
        .or_else(move |(reserved, e)| release_stock(catalog, reserved).then(move |_| Err(e)));

    Box::new(fut)
}

fn release_stock(catalog: Arc<dyn CatalogClient>, reserved: Vec<(ProductId, i32)>) -> Box<Future<Item = (), Error = ()>> {
    let fut = stream::iter_ok::<_, ()>(reserved).for_each(move |(product_id, quantity)| {
        catalog.increment_stock(product_id, quantity).then(move |result| {
            if let Err(e) = result {
                error!("Failed to release {} units of product {}: {}", quantity, product_id, e);
            }
            Ok(())
        })
    });

    Box::new(fut)
}
