//! Affidavit CLI - Shopify setup and maintenance for the affidavit service.
//!
//! # Usage
//!
//! ```bash
//! # Create the product, customer, and order metafield definitions
//! affidavit-cli definitions create
//!
//! # Require an affidavit for a product
//! affidavit-cli product gate 7012345678 --codes A123,B456
//!
//! # Convert a customer's per-product-code records
//! affidavit-cli legacy migrate 6201234567 --dry-run
//!
//! # Print a customer's stored submissions
//! affidavit-cli submissions show 6201234567
//! ```
//!
//! # Environment Variables
//!
//! - `SHOPIFY_STORE`, `SHOPIFY_ACCESS_TOKEN`
//! - `SHOPIFY_API_VERSION`, `METAFIELD_NAMESPACE` (optional)

#![cfg_attr(not(test), forbid(unsafe_code))]

use affidavit_core::{CustomerId, ProductId};
use clap::{Parser, Subcommand};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "affidavit-cli")]
#[command(author, version, about = "Affidavit service operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage metafield definitions
    Definitions {
        #[command(subcommand)]
        action: DefinitionsAction,
    },
    /// Manage product gating
    Product {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Convert records from the per-product-code schema
    Legacy {
        #[command(subcommand)]
        action: LegacyAction,
    },
    /// Inspect stored submissions
    Submissions {
        #[command(subcommand)]
        action: SubmissionsAction,
    },
}

#[derive(Subcommand)]
enum DefinitionsAction {
    /// Create every metafield definition the service reads or writes
    Create,
}

#[derive(Subcommand)]
enum ProductAction {
    /// Require an affidavit for a product
    Gate {
        /// Product ID (numeric or GID)
        product: ProductId,

        /// Comma-separated product codes the affidavit must cover
        #[arg(short, long)]
        codes: String,
    },
    /// Stop requiring an affidavit for a product
    Ungate {
        /// Product ID (numeric or GID)
        product: ProductId,
    },
}

#[derive(Subcommand)]
enum LegacyAction {
    /// Merge a customer's legacy records into their submissions
    Migrate {
        /// Customer ID (numeric or GID)
        customer: CustomerId,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum SubmissionsAction {
    /// Print a customer's submissions as JSON
    Show {
        /// Customer ID (numeric or GID)
        customer: CustomerId,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let client = commands::admin_client()?;

    match cli.command {
        Commands::Definitions { action } => match action {
            DefinitionsAction::Create => commands::definitions::create(&client).await?,
        },
        Commands::Product { action } => match action {
            ProductAction::Gate { product, codes } => {
                commands::product::gate(&client, product, &codes).await?;
            }
            ProductAction::Ungate { product } => {
                commands::product::ungate(&client, product).await?;
            }
        },
        Commands::Legacy { action } => match action {
            LegacyAction::Migrate { customer, dry_run } => {
                commands::legacy::migrate(client, customer, dry_run).await?;
            }
        },
        Commands::Submissions { action } => match action {
            SubmissionsAction::Show { customer } => {
                commands::submissions::show(client, customer).await?;
            }
        },
    }
    Ok(())
}
