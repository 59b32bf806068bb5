use diesel;
use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::Connection;

use models::{NewNotificationAttempt, OrderId, RawNotificationAttempt};
use schema::notification_attempts::dsl as NotificationAttempts;

use super::error::*;
use super::types::RepoResult;

pub struct NotificationAttemptsRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
}

/// Append-only record of delivery attempts, surfaced to shop staff
pub trait NotificationAttemptsRepo {
    fn create(&self, payload: NewNotificationAttempt) -> RepoResult<RawNotificationAttempt>;
    fn list_for_order(&self, order_id: OrderId) -> RepoResult<Vec<RawNotificationAttempt>>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> NotificationAttemptsRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T) -> Self {
        Self { db_conn }
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> NotificationAttemptsRepo
    for NotificationAttemptsRepoImpl<'a, T>
{
    fn create(&self, payload: NewNotificationAttempt) -> RepoResult<RawNotificationAttempt> {
        debug!(
            "Recording a {} notification attempt for order {}: {}",
            payload.channel, payload.order_id, payload.outcome
        );

        let command = diesel::insert_into(NotificationAttempts::notification_attempts).values(&payload);

        command.get_result::<RawNotificationAttempt>(self.db_conn).map_err(|e| {
            let error_kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, error_kind)
        })
    }

    fn list_for_order(&self, order_id: OrderId) -> RepoResult<Vec<RawNotificationAttempt>> {
        debug!("Listing notification attempts of order {}", order_id);

        let query = NotificationAttempts::notification_attempts
            .filter(NotificationAttempts::order_id.eq(order_id))
            .order_by(NotificationAttempts::created_at.desc());

        query.get_results::<RawNotificationAttempt>(self.db_conn).map_err(|e| {
            let error_kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, error_kind)
        })
    }
}
