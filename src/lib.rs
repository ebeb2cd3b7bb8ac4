//! PhyLab Inventory Loan Lifecycle Client
//!
//! Client-side manager for the PhyLab equipment-loan application: a remote
//! REST gateway with candidate-URL failover, a file-backed offline cache,
//! and the reconciler that moves borrow-request items through their
//! lifecycle while dual-writing between the two.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod services;
pub mod store;
pub mod util;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

use gateway::{BackendClient, RemoteGateway};
use store::CacheStore;

/// Top-level client handle, created once per session (page load) and torn
/// down on navigation. All state lives here; there are no module globals.
#[derive(Clone)]
pub struct PhyLabClient {
    pub config: Arc<AppConfig>,
    pub store: CacheStore,
    pub services: Arc<services::Services>,
}

impl PhyLabClient {
    /// Construct with the production gateway.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let gateway: Arc<dyn BackendClient> = Arc::new(RemoteGateway::new(&config.api)?);
        Self::with_gateway(config, gateway)
    }

    /// Construct with a custom gateway (tests, alternative transports).
    pub fn with_gateway(config: AppConfig, gateway: Arc<dyn BackendClient>) -> AppResult<Self> {
        let store = CacheStore::open(&config.cache.dir)?;
        let services = services::Services::new(gateway, store.clone());
        Ok(Self {
            config: Arc::new(config),
            store,
            services: Arc::new(services),
        })
    }
}

/// Initialize tracing for hosts and tests. Respects `RUST_LOG` and falls
/// back to the configured level.
pub fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("phylab_client={}", config.logging.level).into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
