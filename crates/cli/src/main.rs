//! GemVault CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! gv-cli migrate
//!
//! # Create admin user (password from GEMVAULT_ADMIN_PASSWORD)
//! gv-cli admin create -e admin@example.com -f Ada -l Admin -r super_admin
//!
//! # Seed approved demo gems for a verified seller
//! gv-cli seed gems demo/gems.yaml --seller-email seller@example.com
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "gv-cli")]
#[command(author, version, about = "GemVault CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Load demo data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin user
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// First name
        #[arg(short, long)]
        first_name: String,

        /// Last name
        #[arg(short, long)]
        last_name: String,

        /// Admin role (`admin`, `super_admin`)
        #[arg(short, long, default_value = "admin")]
        role: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert approved gems from a YAML file
    Gems {
        /// Path to the YAML file
        file: String,

        /// Email of the verified seller who owns the gems
        #[arg(long)]
        seller_email: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                first_name,
                last_name,
                role,
            } => {
                commands::admin::create_user(&email, &first_name, &last_name, &role).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Gems { file, seller_email } => {
                commands::seed::gems(&file, &seller_email).await?;
            }
        },
    }
    Ok(())
}
