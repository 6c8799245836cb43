//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! sfs cart add <variant> --title "Rose Mist" --price 24.00 -q 2
//! sfs cart add <variant> --title "Sea Salt" --price 8 --original-price 10 --discount 20
//! sfs cart dec <variant>
//! sfs cart show --json
//! sfs cart checkout
//! ```

#![allow(clippy::print_stdout)]

use rust_decimal::Decimal;
use storefront_sync::{CartState, SyncError};
use storefront_sync_core::{DiscountPercent, LineChange, LineDetails, VariantId, format_amount};

use super::Engine;

/// Line data collected from the command line.
pub struct NewLine {
    pub title: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub discount: Option<u8>,
    pub size: Option<String>,
    pub thumbnail: Option<String>,
}

impl NewLine {
    fn into_details(self) -> Result<LineDetails, Box<dyn std::error::Error>> {
        let mut details = LineDetails::new(self.title, self.price);
        if let (Some(original), Some(percent)) = (self.original_price, self.discount) {
            details = details.with_sale(original, DiscountPercent::new(percent)?);
        }
        if let Some(size) = self.size {
            details = details.with_size(size);
        }
        if let Some(thumbnail) = self.thumbnail {
            details = details.with_thumbnail(thumbnail);
        }
        Ok(details)
    }
}

/// Print the cart.
pub fn show(engine: &Engine, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let state = engine.cart().state();
    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_state(&state);
    }
    Ok(())
}

/// Add a line.
pub fn add(
    engine: &Engine,
    variant: String,
    quantity: u32,
    line: NewLine,
) -> Result<(), Box<dyn std::error::Error>> {
    let details = line.into_details()?;
    match engine.cart().add_line(VariantId::new(variant), quantity, details) {
        LineChange::Added => println!("Added to cart"),
        LineChange::Merged => println!("Updated quantity"),
        LineChange::Ignored => println!("Nothing to add"),
    }
    Ok(())
}

pub fn remove(engine: &Engine, variant: &str) {
    report(engine.cart().remove_line(&VariantId::from(variant)), variant);
}

pub fn increase(engine: &Engine, variant: &str) {
    report(engine.cart().increase(&VariantId::from(variant)), variant);
}

pub fn decrease(engine: &Engine, variant: &str) {
    report(engine.cart().decrease(&VariantId::from(variant)), variant);
}

pub fn set_quantity(engine: &Engine, variant: &str, quantity: u32) {
    report(
        engine.cart().set_quantity(&VariantId::from(variant), quantity),
        variant,
    );
}

pub fn clear(engine: &Engine) {
    engine.cart().clear();
    println!("Cart cleared");
}

pub fn complete(engine: &Engine) {
    engine.cart().complete_purchase();
    println!("Thanks for your order");
}

/// Create the remote checkout, reporting any lines dropped for stock.
pub async fn checkout(engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
    match engine.cart().create_remote_checkout().await {
        Ok(handle) => {
            if let Some(id) = handle.remote_id {
                println!("Checkout {id}");
            }
            Ok(())
        }
        Err(e @ SyncError::StockUnavailable { .. }) => {
            println!("{}", e.user_message());
            print_state(&engine.cart().state());
            Err(e.into())
        }
        Err(e) => {
            println!("{}", e.user_message());
            Err(e.into())
        }
    }
}

fn report(changed: bool, variant: &str) {
    if changed {
        println!("Cart updated");
    } else {
        println!("{variant} is not in the cart");
    }
}

fn print_state(state: &CartState) {
    if state.is_empty() {
        println!("Your cart is empty");
        return;
    }

    for line in &state.lines {
        let size = line.size.as_deref().map_or_else(String::new, |s| format!(" ({s})"));
        println!(
            "{:>3} x {}{size}  {}  [{}]",
            line.quantity,
            line.title,
            format_amount(line.line_total()),
            line.variant_id
        );
    }

    println!("Items:    {}", state.item_count());
    println!("Subtotal: {}", format_amount(state.subtotal()));
    if state.savings() > Decimal::ZERO {
        println!("Savings:  {}", format_amount(state.savings()));
    }
    if let Some(code) = state.voucher.code() {
        println!(
            "Voucher:  {code} -{}",
            format_amount(state.voucher.discount_amount())
        );
    }
    println!("Total:    {}", format_amount(state.total()));
    if let Some(id) = &state.checkout.remote_id {
        println!("Checkout: {id} (via {})", state.source);
    }
}
