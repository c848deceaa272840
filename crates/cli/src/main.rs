//! New of You CLI - database migrations and the device cart.
//!
//! # Usage
//!
//! ```bash
//! # Run cart API database migrations
//! np-cart migrate
//!
//! # Work with the cart as a guest
//! np-cart cart add P1 --quantity 2
//! np-cart cart update P1 0
//! np-cart cart show
//!
//! # Log in (merges the guest cart), retry a failed merge, log out
//! np-cart login u1
//! np-cart merge
//! np-cart logout
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `cart show|add|update|remove` - Read and change the cart
//! - `login` / `logout` - Switch between guest and authenticated sessions
//! - `merge` - Retry a guest cart merge that did not complete

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "np-cart")]
#[command(author, version, about = "New of You cart tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run cart API database migrations
    Migrate,
    /// Read or change the cart for the current session
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Log in and merge the guest cart into the account cart
    Login {
        /// Account user id
        user_id: String,
    },
    /// Log out and return to the guest cart
    Logout,
    /// Retry a guest cart merge that failed at login
    Merge,
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart
    Show,
    /// Add units of a product
    Add {
        /// Product id
        product_id: String,

        /// Units to add
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Set the quantity of a line already in the cart
    Update {
        /// Product id
        product_id: String,

        /// New quantity (0 removes the line unless the keep policy is set)
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove {
        /// Product id
        product_id: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show().await?,
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(&product_id, quantity).await?,
            CartAction::Update {
                product_id,
                quantity,
            } => commands::cart::update(&product_id, quantity).await?,
            CartAction::Remove { product_id } => commands::cart::remove(&product_id).await?,
        },
        Commands::Login { user_id } => commands::cart::login(&user_id).await?,
        Commands::Logout => commands::cart::logout().await?,
        Commands::Merge => commands::cart::merge().await?,
    }
    Ok(())
}
