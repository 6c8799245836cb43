//! `sfs` - shopper session and cart from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password read from STOREFRONT_PASSWORD if not given)
//! sfs login -e jane@example.com
//!
//! # Build a cart
//! sfs cart add UHJvZHVjdFZhcmlhbnQ6MQ== --title "Rose Mist" --price 24.00
//! sfs cart inc UHJvZHVjdFZhcmlhbnQ6MQ==
//! sfs cart show
//!
//! # Create the remote checkout and apply a promo code to it
//! sfs voucher apply SALE10 --checkout
//!
//! # Check whether a code applies to the current cart
//! sfs voucher apply SALE10
//! ```
//!
//! Credentials and the cart snapshot are kept in `STOREFRONT_STATE_FILE`
//! (default `.storefront-sync.json`) between invocations. An applied promo
//! code is not part of that state, so it only lasts for the invocation that
//! applied it.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use storefront_sync::SyncConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "sfs")]
#[command(author, version, about = "Storefront session and cart sync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget stored credentials
    Logout,
    /// Show the signed-in customer
    Whoami,
    /// Refresh the access token now
    Refresh,
    /// Inspect and change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Validate a promo code against the cart
    Voucher {
        #[command(subcommand)]
        action: VoucherAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print cart lines and totals
    Show {
        /// Print the state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a variant (merges with an existing line)
    Add {
        /// Variant id
        variant: String,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Product title
        #[arg(short, long)]
        title: String,

        /// Unit price
        #[arg(long)]
        price: Decimal,

        /// Price before discount
        #[arg(long, requires = "discount")]
        original_price: Option<Decimal>,

        /// Discount percentage (1-100)
        #[arg(long, requires = "original_price")]
        discount: Option<u8>,

        /// Size label
        #[arg(long)]
        size: Option<String>,

        /// Thumbnail URL
        #[arg(long)]
        thumbnail: Option<String>,
    },
    /// Remove a line
    Remove { variant: String },
    /// Add one unit to a line
    Inc { variant: String },
    /// Remove one unit from a line
    Dec { variant: String },
    /// Set a line's quantity (0 removes it)
    Set { variant: String, quantity: u32 },
    /// Empty the cart
    Clear,
    /// Create the remote checkout
    Checkout,
    /// Mark the checkout as paid and clear the cart
    Complete,
}

#[derive(Subcommand)]
enum VoucherAction {
    /// Validate and apply a code
    Apply {
        code: String,
        /// Create the remote checkout first so the code is applied to it
        #[arg(long)]
        checkout: bool,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &SyncConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storefront_sync=info,storefront_sync_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    let engine = commands::start(&config).await?;

    match cli.command {
        Commands::Login { email, password } => {
            commands::session::login(&engine, &email, password).await?;
        }
        Commands::Logout => commands::session::logout(&engine),
        Commands::Whoami => commands::session::whoami(&engine),
        Commands::Refresh => commands::session::refresh(&engine).await?,
        Commands::Cart { action } => match action {
            CartAction::Show { json } => commands::cart::show(&engine, json)?,
            CartAction::Add {
                variant,
                quantity,
                title,
                price,
                original_price,
                discount,
                size,
                thumbnail,
            } => {
                let line = commands::cart::NewLine {
                    title,
                    price,
                    original_price,
                    discount,
                    size,
                    thumbnail,
                };
                commands::cart::add(&engine, variant, quantity, line)?;
            }
            CartAction::Remove { variant } => commands::cart::remove(&engine, &variant),
            CartAction::Inc { variant } => commands::cart::increase(&engine, &variant),
            CartAction::Dec { variant } => commands::cart::decrease(&engine, &variant),
            CartAction::Set { variant, quantity } => {
                commands::cart::set_quantity(&engine, &variant, quantity);
            }
            CartAction::Clear => commands::cart::clear(&engine),
            CartAction::Checkout => commands::cart::checkout(&engine).await?,
            CartAction::Complete => commands::cart::complete(&engine),
        },
        Commands::Voucher { action } => match action {
            VoucherAction::Apply { code, checkout } => {
                commands::voucher::apply(&engine, &code, checkout).await?;
            }
        },
    }
    Ok(())
}
