//! Apothecary CLI - database migrations and catalog maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront migrations (including the session table)
//! apo-cli migrate
//!
//! # Load the starter catalog
//! apo-cli seed crates/cli/seed/products.yaml
//!
//! # Delete a product no active order references
//! apo-cli product delete 5b0c3f0e-8c1e-4f57-9a43-0f3f8f2b7a11
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Create products from a YAML file
//! - `product delete` - Delete a product, reporting any blocking orders

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "apo-cli")]
#[command(author, version, about = "Apothecary storefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Create products from a YAML file
    Seed {
        /// Path to the YAML file
        file: String,
    },
    /// Manage catalog products
    Product {
        #[command(subcommand)]
        action: ProductAction,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// Delete a product that no active order references
    Delete {
        /// Product id (UUID)
        id: String,
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
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { file } => commands::seed::products(&file).await?,
        Commands::Product { action } => match action {
            ProductAction::Delete { id } => commands::product::delete(&id).await?,
        },
    }
    Ok(())
}
