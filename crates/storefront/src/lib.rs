//! Storefront session and cart synchronization engine.
//!
//! Keeps a shopper's authenticated session and shopping cart consistent
//! between local persistent storage and a remote GraphQL commerce backend.
//!
//! # Components
//!
//! - [`SessionCoordinator`] owns credentials and the single-flight refresh.
//! - [`RequestOrchestrator`] attaches credentials and applies the
//!   refresh-and-retry-once policy to every remote call.
//! - [`CartStore`] is the observable cart state; [`CartHydrator`] seeds it
//!   at startup.
//! - [`VoucherApplier`] validates promo codes.
//!
//! # Example
//!
//! ```rust,ignore
//! use storefront_sync::{HttpTransport, SyncConfig, SyncEngine, storage::FileStore};
//!
//! let config = SyncConfig::from_env()?;
//! let storage = Arc::new(FileStore::open(&config.state_file)?);
//! let transport = HttpTransport::new(&config.api)?;
//! let engine = SyncEngine::start(transport, storage, &config.api.channel).await;
//!
//! engine.cart().add_line(variant_id, 1, details);
//! let handle = engine.cart().create_remote_checkout().await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod session;
pub mod storage;
pub mod voucher;

pub use api::{GraphQLError, GraphQLRequest, GraphQLResponse, HttpTransport, Operation, Transport};
pub use cart::{CartHydrator, CartNotice, CartState, CartStore, Hydration};
pub use config::{ApiConfig, ConfigError, SyncConfig};
pub use engine::SyncEngine;
pub use error::{Result, SyncError};
pub use orchestrator::RequestOrchestrator;
pub use session::{ErrorClass, SessionCoordinator, SessionEvent, classify};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SharedStore};
pub use voucher::VoucherApplier;
