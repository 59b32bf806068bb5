use diesel;
use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::Connection;

use models::{NewStatusHistory, OrderId, RawStatusHistory};
use schema::order_status_history::dsl as StatusHistory;

use super::error::*;
use super::types::RepoResult;

pub struct StatusHistoryRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
}

/// Append-only log. There is deliberately no update or delete here.
pub trait StatusHistoryRepo {
    fn create(&self, payload: NewStatusHistory) -> RepoResult<RawStatusHistory>;
    fn list_for_order(&self, order_id: OrderId) -> RepoResult<Vec<RawStatusHistory>>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> StatusHistoryRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T) -> Self {
        Self { db_conn }
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> StatusHistoryRepo
    for StatusHistoryRepoImpl<'a, T>
{
    fn create(&self, payload: NewStatusHistory) -> RepoResult<RawStatusHistory> {
        debug!("Appending status history for order {}: {}", payload.order_id, payload.status);

        let command = diesel::insert_into(StatusHistory::order_status_history).values(&payload);

        command.get_result::<RawStatusHistory>(self.db_conn).map_err(|e| {
            let error_kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, error_kind)
        })
    }

    fn list_for_order(&self, order_id: OrderId) -> RepoResult<Vec<RawStatusHistory>> {
        debug!("Getting status history of order {}", order_id);

        let query = StatusHistory::order_status_history
            .filter(StatusHistory::order_id.eq(order_id))
            .order_by(StatusHistory::created_at.asc());

        query.get_results::<RawStatusHistory>(self.db_conn).map_err(|e| {
            let error_kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, error_kind)
        })
    }
}
