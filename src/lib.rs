//! Orders is a microservice responsible for order and payment
//! orchestration: carts become durable orders, payments are driven to a
//! terminal state exactly once, and fulfilment transitions notify the
//! customer. The layered structure of the app is
//!
//! `Application -> Controller -> Service -> Repo + Client`
//!
//! Each layer can only face exceptions in its base layers and can only expose its own errors.
//! E.g. `Service` layer will only deal with `Repo` and `Client` errors and will only return
//! `ServiceError`. That way Controller will only have to deal with ServiceError, but not with `Repo`
//! or `Client` errors.

extern crate base64;
extern crate bigdecimal;
extern crate chrono;
extern crate config as config_crate;
#[macro_use]
extern crate derive_more;
#[macro_use]
extern crate diesel;
extern crate enum_iterator;
extern crate env_logger;
#[macro_use]
extern crate failure;
extern crate futures;
extern crate futures_cpupool;
extern crate hex;
extern crate hyper;
extern crate hyper_tls;
#[macro_use]
extern crate log;
extern crate r2d2;
extern crate r2d2_diesel;
extern crate sentry;
extern crate serde;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate serde_json;
extern crate sha2;
extern crate tokio_core;
extern crate tokio_timer;
extern crate uuid;
extern crate validator;
#[macro_use]
extern crate validator_derive;

#[macro_use]
pub mod macros;
pub mod client;
pub mod config;
pub mod controller;
pub mod errors;
pub mod event_handling;
pub mod http;
pub mod models;
pub mod repos;
pub mod schema;
pub mod sentry_integration;
pub mod services;

use std::process;
use std::sync::Arc;
use std::time::Duration;

use diesel::pg::PgConnection;
use futures::future;
use futures::{Future, Stream};
use futures_cpupool::CpuPool;
use hyper::server::Http;
use r2d2_diesel::ConnectionManager;
use tokio_core::reactor::Core;

use config::Config;
use controller::context::StaticContext;
use errors::Error;
use event_handling::EventHandler;
use http::Application;
use repos::repo_factory::ReposFactoryImpl;

/// Starts new web service from provided `Config`
pub fn start_server<F: FnOnce() + 'static>(config: Config, port: &Option<String>, callback: F) {
    // Prepare reactor
    let mut core = Core::new().expect("Unexpected error creating event loop core");
    let handle = Arc::new(core.handle());

    let client = http::client::Client::new(&config.client, &handle);
    let client_handle = client.handle();
    let client_stream = client.stream();
    handle.spawn(client_stream.for_each(|_| Ok(())));

    // Prepare server
    let thread_count = config.server.thread_count;

    let address = {
        let port = port.as_ref().unwrap_or(&config.server.port);
        format!("{}:{}", config.server.host, port).parse().expect("Could not parse address")
    };

    // Prepare database pool
    let database_url: String = config.server.database.parse().expect("Database URL must be set in configuration");
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let db_pool = r2d2::Pool::builder().build(manager).expect("Failed to create connection pool");

    // Prepare CPU pool
    let cpu_pool = CpuPool::new(thread_count);

    let repo_factory = ReposFactoryImpl::new(
        config.event_store.max_processing_attempts,
        config.event_store.stuck_threshold_sec,
    );

    let config = Arc::new(config);
    let static_context = StaticContext::new(
        db_pool.clone(),
        cpu_pool.clone(),
        client_handle.clone(),
        config.clone(),
        repo_factory.clone(),
    );

    // Prepare the outbox processor for transition-triggered notifications
    let event_handler = EventHandler {
        cpu_pool: cpu_pool.clone(),
        db_pool: db_pool.clone(),
        repo_factory: repo_factory.clone(),
        catalog_client: static_context.catalog_client.clone(),
        messaging_client: static_context.messaging_client.clone(),
        messaging_from: config.messaging.phone_number.clone(),
    };
    let polling_rate = Duration::from_secs(config.event_store.polling_rate_sec);
    handle.spawn(
        event_handler
            .run(polling_rate)
            .map_err(|e| error!("Event handler terminated: {:?}", e)),
    );

    let serve = Http::new()
        .serve_addr_handle(&address, &handle, move || {
            let controller = controller::ControllerImpl::new(static_context.clone());

            // Prepare application
            let app = Application::<Error>::new(controller);

            Ok(app)
        })
        .unwrap_or_else(|why| {
            error!("Http Server Initialization Error: {}", why);
            process::exit(1);
        });

    let handle_arc2 = handle.clone();
    handle.spawn(
        serve
            .for_each(move |conn| {
                handle_arc2.spawn(conn.map(|_| ()).map_err(|why| error!("Server Error: {:?}", why)));
                Ok(())
            })
            .map_err(|_| ()),
    );

    info!("Listening on http://{}, threads: {}", address, thread_count);
    handle.spawn_fn(move || {
        callback();
        future::ok(())
    });
    core.run(future::empty::<(), ()>()).unwrap();
}
