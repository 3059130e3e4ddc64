//! GramSeva server library
//!
//! JSON-file collection store, auth endpoints, and the realtime broadcast
//! channel behind the `/api` surface.
//!
//! ```text
//!  POST /api/{c} ──▶ CollectionStore::persist ──▶ UpdateBus::publish
//!                        (per-collection lock)          │
//!                                                       ▼
//!                                      every /api/ws session: data-update-{c}
//! ```

pub mod auth;
pub mod broadcast;
pub mod config;
pub mod constants;
pub mod error;
pub mod officer_keys;
pub mod routes;
pub mod seed;
pub mod store;
pub mod websocket;

use std::sync::Arc;

use axum::Router;
use gramseva_types::Collection;
use tracing::info;

pub use broadcast::{CollectionUpdate, UpdateBus};
pub use config::{ServerArgs, ServerConfig};
pub use error::{ApiError, AuthError, StoreError};
pub use store::CollectionStore;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CollectionStore>,
    pub bus: UpdateBus,
}

impl AppState {
    /// Open the data directory, seed the officer-key pool, and load demo
    /// fixtures when configured.
    pub async fn init(config: &ServerConfig) -> Result<Self, StoreError> {
        let store = CollectionStore::open(&config.data_dir).await?;
        officer_keys::ensure_pool(&store, config.min_officer_keys).await?;

        let bus = UpdateBus::new(config.broadcast_capacity);
        if config.seed_demo {
            if let Some(accounts) = seed::load_demo(&store).await? {
                bus.publish(Collection::Accounts, accounts);
            }
        }

        info!(data_dir = %store.dir().display(), "collection store ready");
        Ok(Self {
            store: Arc::new(store),
            bus,
        })
    }
}

/// Build the full router for `config`.
pub async fn app(config: &ServerConfig) -> Result<Router, StoreError> {
    let state = AppState::init(config).await?;
    Ok(routes::router(state))
}
