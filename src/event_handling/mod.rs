//! Outbox processor: picks up events that the ledger recorded inside its
//! transactions and drives the transition-triggered notifications. Runs on
//! a timer next to the http server, claims events with `FOR UPDATE SKIP
//! LOCKED` so several instances can coexist.

pub mod error;
mod handlers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use diesel::{
    connection::{AnsiTransactionManager, Connection},
    pg::Pg,
};
use failure::{Error as FailureError, Fail};
use futures::{future, Future, Stream};
use futures_cpupool::CpuPool;
use r2d2::{ManageConnection, Pool, PooledConnection};
use sentry::integrations::failure::capture_error;
use tokio_timer::Interval;

use client::catalog::CatalogClient;
use client::messaging::MessagingClient;
use models::event_store::EventEntry;
use repos::repo_factory::ReposFactory;

use self::error::*;

pub type EventHandlerResult<T> = Result<T, Error>;
pub type EventHandlerFuture<T> = Box<Future<Item = T, Error = Error>>;

pub struct EventHandler<T, M, F>
where
    T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    M: ManageConnection<Connection = T>,
    F: ReposFactory<T>,
{
    pub cpu_pool: CpuPool,
    pub db_pool: Pool<M>,
    pub repo_factory: F,
    pub catalog_client: Arc<dyn CatalogClient>,
    pub messaging_client: Arc<dyn MessagingClient>,
    /// sender number for outbound sms
    pub messaging_from: String,
}

impl<T, M, F> Clone for EventHandler<T, M, F>
where
    T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    M: ManageConnection<Connection = T>,
    F: ReposFactory<T>,
{
    fn clone(&self) -> Self {
        Self {
            cpu_pool: self.cpu_pool.clone(),
            db_pool: self.db_pool.clone(),
            repo_factory: self.repo_factory.clone(),
            catalog_client: self.catalog_client.clone(),
            messaging_client: self.messaging_client.clone(),
            messaging_from: self.messaging_from.clone(),
        }
    }
}

impl<T, M, F> EventHandler<T, M, F>
where
    T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    M: ManageConnection<Connection = T>,
    F: ReposFactory<T>,
{
    pub fn run(self, interval: Duration) -> impl Future<Item = (), Error = FailureError> {
        Interval::new(Instant::now(), interval)
            .map_err(|e| FailureError::from(ectx!(err e, ErrorSource::TokioTimer, ErrorKind::Internal)))
            .fold(self, |event_handler, _| {
                debug!("Started processing events");
                event_handler.clone().process_events().then(|res| {
                    match res {
                        Ok(_) => {
                            debug!("Finished processing events");
                        }
                        Err(err) => {
                            let err = FailureError::from(err.context("An error occurred while processing events"));
                            error!("{:?}", &err);
                            capture_error(&err);
                        }
                    };

                    future::ok::<_, FailureError>(event_handler)
                })
            })
            .map(|_| ())
    }

    fn process_events(self) -> EventHandlerFuture<()> {
        let EventHandler {
            cpu_pool,
            db_pool,
            repo_factory,
            ..
        } = self.clone();

        let fut = spawn_on_pool(db_pool.clone(), cpu_pool.clone(), {
            let repo_factory = repo_factory.clone();
            move |conn| {
                let event_store_repo = repo_factory.create_event_store_repo(&conn);

                debug!("Resetting stuck events...");
                let reset_events = event_store_repo.reset_stuck_events().map_err(ectx!(try convert))?;
                debug!("{} events have been reset", reset_events.len());

                debug!("Getting events for processing...");
                event_store_repo
                    .get_events_for_processing(1)
                    .map(|event_entries| {
                        debug!("Got {} events to process", event_entries.len());
                        event_entries
                            .into_iter()
                            .next()
                            .map(|EventEntry { id: entry_id, event, .. }| (entry_id, event))
                    })
                    .map_err(ectx!(convert))
            }
        })
        .and_then(move |event| match event {
            None => future::Either::A(future::ok(())),
            Some((entry_id, event)) => future::Either::B(future::lazy(move || {
                debug!("Started processing event #{} - {:?}", entry_id, event);
                self.handle_event(event.clone()).then(move |result| {
                    spawn_on_pool(db_pool, cpu_pool, move |conn| {
                        let event_store_repo = repo_factory.create_event_store_repo(&conn);

                        match result {
                            Ok(()) => {
                                debug!("Finished processing event #{} - {:?}", entry_id, event);
                                event_store_repo.complete_event(entry_id).map_err(ectx!(try convert))?;
                                Ok(())
                            }
                            Err(e) => {
                                debug!("Failed to process event #{} - {:?}", entry_id, event);
                                event_store_repo.fail_event(entry_id).map_err(ectx!(try convert))?;
                                Err(e)
                            }
                        }
                    })
                })
            })),
        });

        Box::new(fut)
    }
}

pub fn spawn_on_pool<T, M, Func, R>(db_pool: Pool<M>, cpu_pool: CpuPool, f: Func) -> EventHandlerFuture<R>
where
    T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    M: ManageConnection<Connection = T>,
    Func: FnOnce(PooledConnection<M>) -> Result<R, Error> + Send + 'static,
    R: Send + 'static,
{
    Box::new(cpu_pool.spawn_fn(move || db_pool.get().map_err(ectx!(ErrorSource::R2d2, ErrorKind::Internal)).and_then(f)))
}
