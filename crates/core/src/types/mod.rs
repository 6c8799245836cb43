//! Core value types for the storefront sync engine.

pub mod email;
pub mod id;
pub mod price;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{DiscountPercent, PriceError, format_amount};
