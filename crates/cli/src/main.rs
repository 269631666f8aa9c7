//! EcoMall CLI - Cart and wishlist from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Log in; the password is read from stdin
//! ecomall login -e asha@example.com
//!
//! # Create an account (also prompts for a password)
//! ecomall register -e meera@example.com -n "Meera Iyer" -p 9845012345
//!
//! # Add two units of item 7 to the cart
//! ecomall cart add 7 -q 2
//!
//! # Show the cart with its subtotal
//! ecomall cart show
//!
//! # Save item 9 for later
//! ecomall wishlist add 9
//!
//! # See the charges, then open an order for the cart
//! ecomall order totals
//! ecomall order place
//!
//! # Hand the gateway's result back once paid
//! ecomall order confirm order_Nx1 pay_Nx2 <signature>
//! ```
//!
//! # Commands
//!
//! - `login` / `register` / `logout` / `whoami` - Session management
//! - `cart` - Show and change the cart
//! - `wishlist` - Show and change the wishlist
//! - `order` - Checkout totals, order placement and payment results
//! - `sync` - Re-fetch both collections from the store

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use ecomall_client::ClientConfig;
use ecomall_core::{ItemId, OrderId};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "ecomall")]
#[command(author, version, about = "EcoMall cart and wishlist")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to the store
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Create an account and log in
    Register {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Full name; the first word is the first name
        #[arg(short, long)]
        name: String,

        /// Mobile number
        #[arg(short, long)]
        phone: String,
    },
    /// End the current session and clear the local cart and wishlist
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Check out the cart
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Re-fetch the cart and wishlist from the store
    Sync,
}

#[derive(Subcommand)]
enum CartAction {
    /// List cart lines and the subtotal
    Show,
    /// Add an item, increasing its quantity if already present
    Add {
        item_id: ItemId,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a line (zero or less removes it)
    Update {
        item_id: ItemId,

        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove { item_id: ItemId },
    /// Remove every line
    Clear,
    /// Move a line to the wishlist
    MoveToWishlist { item_id: ItemId },
}

#[derive(Subcommand)]
enum WishlistAction {
    /// List saved items
    Show,
    /// Save an item
    Add { item_id: ItemId },
    /// Remove a saved item
    Remove { item_id: ItemId },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Show GST, fees and the total for the current cart
    Totals,
    /// Open an order for every cart line
    Place,
    /// Confirm a successful payment and empty the cart
    Confirm {
        razorpay_order_id: String,
        razorpay_payment_id: String,
        razorpay_signature: String,
    },
    /// Report a payment that was closed or failed
    Abandon {
        order_id: OrderId,

        /// The gateway reported a failure rather than a closed window
        #[arg(long)]
        failed: bool,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
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

    tracing::info!("Sentry initialized");
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

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Configuration error: {e}");
            }
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ecomall_client=info,ecomall_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &ClientConfig) -> Result<(), commands::CommandError> {
    let ctx = commands::Context::open(config).await?;
    let result = dispatch(cli.command, &ctx).await;

    // Failures have already been reported as notices
    ctx.print_notices();
    result
}

async fn dispatch(
    command: Commands,
    ctx: &commands::Context,
) -> Result<(), commands::CommandError> {
    match command {
        Commands::Login { email } => commands::session::login(ctx, &email).await?,
        Commands::Register { email, name, phone } => {
            commands::session::register(ctx, &email, &name, &phone).await?;
        }
        Commands::Logout => commands::session::logout(ctx).await,
        Commands::Whoami => commands::session::whoami(ctx),
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(ctx),
            CartAction::Add { item_id, quantity } => {
                commands::cart::add(ctx, item_id, quantity).await?;
            }
            CartAction::Update { item_id, quantity } => {
                commands::cart::update(ctx, item_id, quantity).await?;
            }
            CartAction::Remove { item_id } => commands::cart::remove(ctx, item_id).await?,
            CartAction::Clear => commands::cart::clear(ctx).await?,
            CartAction::MoveToWishlist { item_id } => {
                commands::cart::move_to_wishlist(ctx, item_id).await?;
            }
        },
        Commands::Wishlist { action } => match action {
            WishlistAction::Show => commands::wishlist::show(ctx),
            WishlistAction::Add { item_id } => commands::wishlist::add(ctx, item_id).await?,
            WishlistAction::Remove { item_id } => {
                commands::wishlist::remove(ctx, item_id).await?;
            }
        },
        Commands::Order { action } => match action {
            OrderAction::Totals => commands::order::totals(ctx),
            OrderAction::Place => commands::order::place(ctx).await?,
            OrderAction::Confirm {
                razorpay_order_id,
                razorpay_payment_id,
                razorpay_signature,
            } => {
                commands::order::confirm(
                    ctx,
                    razorpay_order_id,
                    razorpay_payment_id,
                    razorpay_signature,
                )
                .await?;
            }
            OrderAction::Abandon { order_id, failed } => {
                commands::order::abandon(ctx, order_id, failed).await?;
            }
        },
        Commands::Sync => commands::cart::sync(ctx).await?,
    }
    Ok(())
}
