//! Agape CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! agape migrate
//!
//! # Load collections and products from a YAML catalog
//! agape seed --file seed/catalog.yaml --skip-existing
//!
//! # Create an admin user, or promote an existing customer
//! agape admin create -e admin@agapelooks.com -n "Admin Name" -p "long passphrase"
//! agape admin promote -e customer@example.com
//! ```
//!
//! # Environment Variables
//!
//! - `AGAPE_DATABASE_URL` (fallback `DATABASE_URL`) - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "agape")]
#[command(author, version, about = "Agape Looks CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed collections and products from a YAML catalog
    Seed {
        /// Path to the catalog file
        #[arg(short, long, default_value = "seed/catalog.yaml")]
        file: String,

        /// Skip collections and products that already exist instead of failing
        #[arg(long)]
        skip_existing: bool,
    },
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin user
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,

        /// Initial password
        #[arg(short, long)]
        password: String,
    },
    /// Give an existing user the admin role
    Promote {
        /// Email of the user to promote
        #[arg(short, long)]
        email: String,
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
        Commands::Seed {
            file,
            skip_existing,
        } => {
            commands::seed::catalog(&file, skip_existing).await?;
        }
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                name,
                password,
            } => {
                commands::admin::create_user(&email, &name, &password).await?;
            }
            AdminAction::Promote { email } => {
                commands::admin::promote(&email).await?;
            }
        },
    }
    Ok(())
}
