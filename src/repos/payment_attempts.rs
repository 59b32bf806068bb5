use diesel;
use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::Connection;

use models::{NewPaymentAttempt, OrderId, PaymentAttempt, PaymentAttemptId, PaymentAttemptState, UpdatePaymentAttempt};
use schema::payment_attempts::dsl as PaymentAttempts;

use super::error::*;
use super::types::RepoResult;

pub struct PaymentAttemptsRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
}

pub trait PaymentAttemptsRepo {
    fn get(&self, attempt_id: PaymentAttemptId) -> RepoResult<Option<PaymentAttempt>>;
    /// `get` with a row-level lock for the settle transaction
    fn get_for_update(&self, attempt_id: PaymentAttemptId) -> RepoResult<Option<PaymentAttempt>>;
    /// The non-terminal attempt of an order, if any. The partial unique
    /// index guarantees there is at most one.
    fn get_active_by_order(&self, order_id: OrderId) -> RepoResult<Option<PaymentAttempt>>;
    fn list_by_order(&self, order_id: OrderId) -> RepoResult<Vec<PaymentAttempt>>;
    fn create(&self, payload: NewPaymentAttempt) -> RepoResult<PaymentAttempt>;
    fn update(&self, attempt_id: PaymentAttemptId, update: UpdatePaymentAttempt) -> RepoResult<PaymentAttempt>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> PaymentAttemptsRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T) -> Self {
        Self { db_conn }
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> PaymentAttemptsRepo
    for PaymentAttemptsRepoImpl<'a, T>
{
    fn get(&self, attempt_id: PaymentAttemptId) -> RepoResult<Option<PaymentAttempt>> {
        debug!("Getting a payment attempt with reference: {}", attempt_id);

        let query = PaymentAttempts::payment_attempts.filter(PaymentAttempts::id.eq(attempt_id));

        query.get_result(self.db_conn).optional().map_err(|e| {
            let error_kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, error_kind)
        })
    }

    fn get_for_update(&self, attempt_id: PaymentAttemptId) -> RepoResult<Option<PaymentAttempt>> {
        debug!("Getting a payment attempt with reference: {} for update", attempt_id);

        let query = PaymentAttempts::payment_attempts
            .filter(PaymentAttempts::id.eq(attempt_id))
            .for_update();

        query.get_result(self.db_conn).optional().map_err(|e| {
            let error_kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, error_kind)
        })
    }

    fn get_active_by_order(&self, order_id: OrderId) -> RepoResult<Option<PaymentAttempt>> {
        debug!("Getting the active payment attempt of order {}", order_id);

        let query = PaymentAttempts::payment_attempts
            .filter(PaymentAttempts::order_id.eq(order_id))
            .filter(PaymentAttempts::state.eq_any(vec![
                PaymentAttemptState::Created,
                PaymentAttemptState::RequiresConfirmation,
            ]))
            .order_by(PaymentAttempts::created_at.desc());

        query.first(self.db_conn).optional().map_err(|e| {
            let error_kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, error_kind)
        })
    }

    fn list_by_order(&self, order_id: OrderId) -> RepoResult<Vec<PaymentAttempt>> {
        debug!("Listing payment attempts of order {}", order_id);

        let query = PaymentAttempts::payment_attempts
            .filter(PaymentAttempts::order_id.eq(order_id))
            .order_by(PaymentAttempts::created_at.desc());

        query.get_results::<PaymentAttempt>(self.db_conn).map_err(|e| {
            let error_kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, error_kind)
        })
    }

    fn create(&self, payload: NewPaymentAttempt) -> RepoResult<PaymentAttempt> {
        debug!("Creating a payment attempt with reference: {}", payload.id);

        let command = diesel::insert_into(PaymentAttempts::payment_attempts).values(&payload);

        command.get_result::<PaymentAttempt>(self.db_conn).map_err(|e| {
            let error_kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, error_kind)
        })
    }

    fn update(&self, attempt_id: PaymentAttemptId, update: UpdatePaymentAttempt) -> RepoResult<PaymentAttempt> {
        debug!("Updating a payment attempt with reference: {}", attempt_id);

        let now = ::chrono::Utc::now().naive_utc();
        let filter = PaymentAttempts::payment_attempts.filter(PaymentAttempts::id.eq(attempt_id));

        let command = diesel::update(filter).set((&update, PaymentAttempts::updated_at.eq(now)));

        command.get_result::<PaymentAttempt>(self.db_conn).map_err(|e| {
            let error_kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, error_kind)
        })
    }
}
