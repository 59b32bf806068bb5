//! Config module contains the top-level config for the app.

use config_crate::{Config as RawConfig, ConfigError, Environment, File};
use std::env;

/// Basic settings - HTTP binding, database, provider endpoints
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: Server,
    pub client: Client,
    pub catalog: Catalog,
    pub card_gateway: CardGateway,
    pub wallet_gateway: WalletGateway,
    pub messaging: Messaging,
    pub event_store: EventStore,
    pub sentry: Option<SentryConfig>,
}

/// Common server settings
#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    pub host: String,
    pub port: String,
    pub database: String,
    pub thread_count: usize,
}

/// Http client settings
#[derive(Debug, Deserialize, Clone)]
pub struct Client {
    pub http_client_retries: usize,
    pub http_client_buffer_size: usize,
    pub dns_worker_thread_count: usize,
}

/// Catalog (shops / products / delivery persons) service
#[derive(Debug, Deserialize, Clone)]
pub struct Catalog {
    pub url: String,
}

/// Card rail payment provider
#[derive(Debug, Deserialize, Clone)]
pub struct CardGateway {
    pub url: String,
    pub secret_key: String,
    pub public_key: String,
    pub signing_secret: String,
}

/// Redirect (wallet) payment provider
#[derive(Debug, Deserialize, Clone)]
pub struct WalletGateway {
    pub url: String,
    pub client_id: String,
    pub client_secret: String,
    pub return_url: String,
    pub cancel_url: String,
}

/// SMS / voice provider
#[derive(Debug, Deserialize, Clone)]
pub struct Messaging {
    pub url: String,
    pub account_id: String,
    pub auth_token: String,
    pub phone_number: String,
}

/// Outbox processing settings
#[derive(Debug, Deserialize, Clone)]
pub struct EventStore {
    pub polling_rate_sec: u64,
    pub max_processing_attempts: u32,
    pub stuck_threshold_sec: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SentryConfig {
    pub dsn: String,
}

/// Creates new app config struct
/// #Examples
/// ```
/// use orders_lib::config::*;
///
/// let config = Config::new();
/// ```
impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        let mut s = RawConfig::new();
        s.merge(File::with_name("config/base"))?;

        // Note that this file is _optional_
        let env = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        s.merge(File::with_name(&format!("config/{}", env)).required(false))?;

        // Add in settings from the environment (with a prefix of ORDERS)
        s.merge(Environment::with_prefix("ORDERS"))?;

        s.try_into()
    }
}
