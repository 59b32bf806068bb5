//! Optional sentry error reporting, enabled by the `sentry` config section.

use sentry;
use sentry::integrations::panic::register_panic_handler;
use sentry::internals::ClientInitGuard;

use config;

pub fn init(config: Option<&config::SentryConfig>) -> Option<ClientInitGuard> {
    config.map(|sentry_config| {
        info!("Initializing sentry");
        let guard = sentry::init(sentry_config.dsn.as_str());
        register_panic_handler();
        guard
    })
}
