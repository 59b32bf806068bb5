//! Services is a core layer for the app business logic like
//! validation, state transitions, provider orchestration

pub mod error;
pub mod notification;
pub mod order;
pub mod payment;
pub mod types;

pub use self::error::{Error, ErrorKind};
pub use self::types::ServiceFuture;

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use r2d2::{ManageConnection, PooledConnection};

use controller::context::{DynamicContext, StaticContext};
use repos::repo_factory::ReposFactory;
use services::types::spawn_on_pool;

/// One service value is built per request from the shared static context
/// and the request's dynamic context
pub struct Service<T, M, F>
where
    T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    M: ManageConnection<Connection = T>,
    F: ReposFactory<T>,
{
    pub static_context: StaticContext<T, M, F>,
    pub dynamic_context: DynamicContext,
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > Service<T, M, F>
{
    pub fn new(static_context: StaticContext<T, M, F>, dynamic_context: DynamicContext) -> Self {
        Self {
            static_context,
            dynamic_context,
        }
    }

    pub fn spawn_on_pool<Func, R>(&self, f: Func) -> ServiceFuture<R>
    where
        Func: FnOnce(PooledConnection<M>) -> Result<R, Error> + Send + 'static,
        R: Send + 'static,
    {
        spawn_on_pool(self.static_context.db_pool.clone(), self.static_context.cpu_pool.clone(), f)
    }
}
