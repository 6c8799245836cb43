//! Command implementations.

pub mod cart;
pub mod session;
pub mod voucher;

use std::sync::Arc;

use storefront_sync::{FileStore, HttpTransport, SyncConfig, SyncEngine};

/// Engine type used by every command.
pub type Engine = SyncEngine<HttpTransport>;

/// Open the state file, build the HTTP transport and hydrate the cart.
pub async fn start(config: &SyncConfig) -> Result<Engine, Box<dyn std::error::Error>> {
    let storage = Arc::new(FileStore::open(&config.state_file)?);
    let transport = HttpTransport::new(&config.api)?;
    Ok(SyncEngine::start(transport, storage, config.api.channel.as_str()).await)
}
