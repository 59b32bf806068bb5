//! `Context` is a top level module contains static context and dynamic context for each request

use std::sync::Arc;

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use futures_cpupool::CpuPool;
use r2d2::{ManageConnection, Pool};

use client::card_gateway::{CardGatewayClient, CardGatewayClientImpl};
use client::catalog::{CatalogClient, CatalogClientImpl};
use client::messaging::{MessagingClient, MessagingClientImpl};
use client::wallet::{WalletClient, WalletClientImpl};
use config::Config;
use http::client::ClientHandle;
use models::UserId;
use repos::repo_factory::ReposFactory;

/// Static context for all app
pub struct StaticContext<T, M, F>
where
    T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    M: ManageConnection<Connection = T>,
    F: ReposFactory<T>,
{
    pub db_pool: Pool<M>,
    pub cpu_pool: CpuPool,
    pub config: Arc<Config>,
    pub client_handle: ClientHandle,
    pub repo_factory: F,
    pub catalog_client: Arc<dyn CatalogClient>,
    pub card_gateway_client: Arc<dyn CardGatewayClient>,
    pub wallet_client: Arc<dyn WalletClient>,
    pub messaging_client: Arc<dyn MessagingClient>,
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > StaticContext<T, M, F>
{
    /// Create a new static context
    pub fn new(db_pool: Pool<M>, cpu_pool: CpuPool, client_handle: ClientHandle, config: Arc<Config>, repo_factory: F) -> Self {
        let catalog_client = Arc::new(CatalogClientImpl::new(client_handle.clone(), config.catalog.url.clone()));
        let card_gateway_client = Arc::new(CardGatewayClientImpl::create_from_config(client_handle.clone(), &config.card_gateway));
        let wallet_client = Arc::new(WalletClientImpl::create_from_config(client_handle.clone(), &config.wallet_gateway));
        let messaging_client = Arc::new(MessagingClientImpl::create_from_config(client_handle.clone(), &config.messaging));

        Self {
            db_pool,
            cpu_pool,
            config,
            client_handle,
            repo_factory,
            catalog_client,
            card_gateway_client,
            wallet_client,
            messaging_client,
        }
    }
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > Clone for StaticContext<T, M, F>
{
    fn clone(&self) -> Self {
        Self {
            db_pool: self.db_pool.clone(),
            cpu_pool: self.cpu_pool.clone(),
            config: self.config.clone(),
            client_handle: self.client_handle.clone(),
            repo_factory: self.repo_factory.clone(),
            catalog_client: self.catalog_client.clone(),
            card_gateway_client: self.card_gateway_client.clone(),
            wallet_client: self.wallet_client.clone(),
            messaging_client: self.messaging_client.clone(),
        }
    }
}

/// Dynamic context for each request
#[derive(Clone)]
pub struct DynamicContext {
    pub user_id: Option<UserId>,
    pub correlation_token: String,
}

impl DynamicContext {
    /// Create a new dynamic context for each request
    pub fn new(user_id: Option<UserId>, correlation_token: String) -> Self {
        Self {
            user_id,
            correlation_token,
        }
    }
}
