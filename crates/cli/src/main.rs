//! Driftwood CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (orders, history, refunds)
//! dw-cli migrate
//!
//! # Mint identity claim headers for local API testing
//! dw-cli claims --user-id 42 --role customer
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `claims` - Mint signed identity claim headers for curl sessions

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use driftwood_core::Role;

mod commands;

#[derive(Parser)]
#[command(name = "dw-cli")]
#[command(author, version, about = "Driftwood CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Mint signed identity claim headers for local API testing
    Claims {
        /// User id to embed in the claims
        #[arg(short, long)]
        user_id: i32,

        /// Role claim (`customer` or `admin`)
        #[arg(short, long, default_value = "customer")]
        role: Role,
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
        Commands::Claims { user_id, role } => commands::claims::mint(user_id, role)?,
    }
    Ok(())
}
