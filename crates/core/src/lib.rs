//! Storefront Sync Core - Cart and session data model.
//!
//! This crate provides the types shared by every storefront-sync component:
//! - `storefront-sync` - Session coordinator, request orchestrator and cart store
//! - `storefront-sync-cli` - Terminal driver over the engine
//!
//! # Architecture
//!
//! The core crate contains only types and pure line-list logic - no I/O, no
//! storage access, no HTTP clients. Merge and quantity rules live here so
//! they can be tested without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, discount percentages and login emails
//! - [`cart`] - Cart lines, checkout handle, voucher state and the persisted snapshot

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::*;
pub use types::*;
