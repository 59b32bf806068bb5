use chrono::Utc;
use diesel;
use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::Connection;

use models::{DeliveryPersonId, NewOrder, OrderId, OrderStatus, RawOrder, ShopId, UpdateFulfilment, UserId};
use schema::orders::dsl as Orders;

use super::error::*;
use super::types::RepoResult;

pub struct OrdersRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
}

pub trait OrdersRepo {
    fn get(&self, order_id: OrderId) -> RepoResult<Option<RawOrder>>;
    /// Same as `get` but takes a row-level lock, linearizing all mutations
    /// of one order within the surrounding transaction
    fn get_for_update(&self, order_id: OrderId) -> RepoResult<Option<RawOrder>>;
    fn list_by_shop(&self, shop_id: ShopId, skip: i64, count: i64) -> RepoResult<Vec<RawOrder>>;
    fn list_by_user(&self, user_id: UserId, skip: i64, count: i64) -> RepoResult<Vec<RawOrder>>;
    fn create(&self, payload: NewOrder) -> RepoResult<RawOrder>;
    fn update_status(&self, order_id: OrderId, status: OrderStatus) -> RepoResult<RawOrder>;
    fn update_fulfilment(&self, order_id: OrderId, update: UpdateFulfilment) -> RepoResult<RawOrder>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> OrdersRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T) -> Self {
        Self { db_conn }
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> OrdersRepo for OrdersRepoImpl<'a, T> {
    fn get(&self, order_id: OrderId) -> RepoResult<Option<RawOrder>> {
        debug!("Getting an order with ID: {}", order_id);

        let query = Orders::orders.filter(Orders::id.eq(order_id));

        query.get_result(self.db_conn).optional().map_err(|e| {
            let error_kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, error_kind)
        })
    }

    fn get_for_update(&self, order_id: OrderId) -> RepoResult<Option<RawOrder>> {
        debug!("Getting an order with ID: {} for update", order_id);

        let query = Orders::orders.filter(Orders::id.eq(order_id)).for_update();

        query.get_result(self.db_conn).optional().map_err(|e| {
            let error_kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, error_kind)
        })
    }

    fn list_by_shop(&self, shop_id: ShopId, skip: i64, count: i64) -> RepoResult<Vec<RawOrder>> {
        debug!("Listing orders of shop {}, skip={}, count={}", shop_id, skip, count);

        let query = Orders::orders
            .filter(Orders::shop_id.eq(shop_id))
            .order_by(Orders::created_at.desc())
            .offset(skip)
            .limit(count);

        query.get_results::<RawOrder>(self.db_conn).map_err(|e| {
            let error_kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, error_kind)
        })
    }

    fn list_by_user(&self, user_id: UserId, skip: i64, count: i64) -> RepoResult<Vec<RawOrder>> {
        debug!("Listing orders of user {}, skip={}, count={}", user_id, skip, count);

        let query = Orders::orders
            .filter(Orders::user_id.eq(user_id))
            .order_by(Orders::created_at.desc())
            .offset(skip)
            .limit(count);

        query.get_results::<RawOrder>(self.db_conn).map_err(|e| {
            let error_kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, error_kind)
        })
    }

    fn create(&self, payload: NewOrder) -> RepoResult<RawOrder> {
        debug!("Creating an order with ID: {}", payload.id);

        let command = diesel::insert_into(Orders::orders).values(&payload);

        command.get_result::<RawOrder>(self.db_conn).map_err(|e| {
            let error_kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, error_kind)
        })
    }

    fn update_status(&self, order_id: OrderId, status: OrderStatus) -> RepoResult<RawOrder> {
        debug!("Updating status of order with ID: {} - {}", order_id, status);

        let now = Utc::now().naive_utc();
        let filter = Orders::orders.filter(Orders::id.eq(order_id));

        // shipped_at / delivered_at are stamped when the status is entered
        // and never cleared afterwards
        let result = match status {
            OrderStatus::Shipped => diesel::update(filter)
                .set((
                    Orders::status.eq(status),
                    Orders::shipped_at.eq(now),
                    Orders::updated_at.eq(now),
                ))
                .get_result::<RawOrder>(self.db_conn),
            OrderStatus::Delivered => diesel::update(filter)
                .set((
                    Orders::status.eq(status),
                    Orders::delivered_at.eq(now),
                    Orders::updated_at.eq(now),
                ))
                .get_result::<RawOrder>(self.db_conn),
            _ => diesel::update(filter)
                .set((Orders::status.eq(status), Orders::updated_at.eq(now)))
                .get_result::<RawOrder>(self.db_conn),
        };

        result.map_err(|e| {
            let error_kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, error_kind)
        })
    }

    fn update_fulfilment(&self, order_id: OrderId, update: UpdateFulfilment) -> RepoResult<RawOrder> {
        debug!("Updating fulfilment of order with ID: {}", order_id);

        let now = Utc::now().naive_utc();

        // at most one assignee may be set, so switching sides clears the other
        let result = if update.assigned_user_id.is_some() {
            diesel::update(Orders::orders.filter(Orders::id.eq(order_id)))
                .set((
                    &update,
                    Orders::assigned_delivery_person_id.eq(None::<DeliveryPersonId>),
                    Orders::updated_at.eq(now),
                ))
                .get_result::<RawOrder>(self.db_conn)
        } else if update.assigned_delivery_person_id.is_some() {
            diesel::update(Orders::orders.filter(Orders::id.eq(order_id)))
                .set((&update, Orders::assigned_user_id.eq(None::<UserId>), Orders::updated_at.eq(now)))
                .get_result::<RawOrder>(self.db_conn)
        } else {
            diesel::update(Orders::orders.filter(Orders::id.eq(order_id)))
                .set((&update, Orders::updated_at.eq(now)))
                .get_result::<RawOrder>(self.db_conn)
        };

        result.map_err(|e| {
            let error_kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, error_kind)
        })
    }
}
