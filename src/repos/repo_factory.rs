use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;

use repos::*;

/// Creates repos bound to a borrowed connection, so that a service can run
/// several repos inside one transaction. Authorization is not checked
/// here - callers own it, the engine treats the caller identity as opaque.
pub trait ReposFactory<C>: Clone + Send + Sync + 'static
where
    C: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
{
    fn create_orders_repo<'a>(&self, db_conn: &'a C) -> Box<OrdersRepo + 'a>;
    fn create_status_history_repo<'a>(&self, db_conn: &'a C) -> Box<StatusHistoryRepo + 'a>;
    fn create_payment_attempts_repo<'a>(&self, db_conn: &'a C) -> Box<PaymentAttemptsRepo + 'a>;
    fn create_notification_attempts_repo<'a>(&self, db_conn: &'a C) -> Box<NotificationAttemptsRepo + 'a>;
    fn create_event_store_repo<'a>(&self, db_conn: &'a C) -> Box<EventStoreRepo + 'a>;
}

#[derive(Clone)]
pub struct ReposFactoryImpl {
    max_processing_attempts: u32,
    stuck_threshold_sec: u32,
}

impl ReposFactoryImpl {
    pub fn new(max_processing_attempts: u32, stuck_threshold_sec: u32) -> Self {
        Self {
            max_processing_attempts,
            stuck_threshold_sec,
        }
    }
}

impl<C> ReposFactory<C> for ReposFactoryImpl
where
    C: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
{
    fn create_orders_repo<'a>(&self, db_conn: &'a C) -> Box<OrdersRepo + 'a> {
        Box::new(OrdersRepoImpl::new(db_conn)) as Box<OrdersRepo>
    }

    fn create_status_history_repo<'a>(&self, db_conn: &'a C) -> Box<StatusHistoryRepo + 'a> {
        Box::new(StatusHistoryRepoImpl::new(db_conn)) as Box<StatusHistoryRepo>
    }

    fn create_payment_attempts_repo<'a>(&self, db_conn: &'a C) -> Box<PaymentAttemptsRepo + 'a> {
        Box::new(PaymentAttemptsRepoImpl::new(db_conn)) as Box<PaymentAttemptsRepo>
    }

    fn create_notification_attempts_repo<'a>(&self, db_conn: &'a C) -> Box<NotificationAttemptsRepo + 'a> {
        Box::new(NotificationAttemptsRepoImpl::new(db_conn)) as Box<NotificationAttemptsRepo>
    }

    fn create_event_store_repo<'a>(&self, db_conn: &'a C) -> Box<EventStoreRepo + 'a> {
        Box::new(EventStoreRepoImpl::new(
            db_conn,
            self.max_processing_attempts,
            self.stuck_threshold_sec,
        )) as Box<EventStoreRepo>
    }
}
