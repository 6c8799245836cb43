//! Promo code commands.
//!
//! The applied voucher lives in memory only. Without `--checkout` the
//! command just reports whether the code applies to the stored cart.

#![allow(clippy::print_stdout)]

use storefront_sync_core::format_amount;

use super::Engine;

/// Apply a promo code, creating the remote checkout first when asked.
pub async fn apply(
    engine: &Engine,
    code: &str,
    with_checkout: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if with_checkout {
        super::cart::checkout(engine).await?;
    }

    match engine.vouchers().apply(code).await {
        Ok(voucher) => {
            println!(
                "{} applied: -{}",
                voucher.code().unwrap_or(code),
                format_amount(voucher.discount_amount())
            );
            Ok(())
        }
        Err(e) => {
            println!("{}", e.user_message());
            Err(e.into())
        }
    }
}
