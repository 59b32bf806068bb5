//! Orders is a microservice responsible for order and payment orchestration.
//! This crate is for running the service from `orders_lib`. See `orders_lib` for details.

extern crate env_logger;
extern crate orders_lib;

fn main() {
    let config = orders_lib::config::Config::new().expect("Can't load app config!");

    // Prepare logger
    env_logger::init();

    // Prepare sentry integration
    let _sentry = orders_lib::sentry_integration::init(config.sentry.as_ref());

    orders_lib::start_server(config, &None, || ());
}
