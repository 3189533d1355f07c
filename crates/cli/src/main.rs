//! Lumina CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! lumina migrate
//!
//! # Create a staff account
//! lumina admin create -e admin@example.com -n "Admin Name" -r super_admin
//!
//! # Change an existing user's role
//! lumina admin promote -e someone@example.com -r admin
//!
//! # Load the demo catalog
//! lumina seed
//! ```
//!
//! All commands read `LUMINA_DATABASE_URL` (or `DATABASE_URL`), from `.env`
//! when present.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lumina")]
#[command(author, version, about = "Lumina Beauty CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage staff accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Seed the database with a demo catalog
    Seed,
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

        /// Admin role (`super_admin`, `admin`)
        #[arg(short, long, default_value = "admin")]
        role: String,

        /// Initial password (falls back to `LUMINA_ADMIN_PASSWORD`)
        #[arg(short, long, env = "LUMINA_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Change the role of an existing user
    Promote {
        /// User email address
        #[arg(short, long)]
        email: String,

        /// New role (`customer`, `admin`, `super_admin`)
        #[arg(short, long)]
        role: String,
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
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                name,
                role,
                password,
            } => {
                commands::admin::create_user(&email, &name, &role, &password).await?;
            }
            AdminAction::Promote { email, role } => {
                commands::admin::promote(&email, &role).await?;
            }
        },
        Commands::Seed => commands::seed::catalog().await?,
    }
    Ok(())
}
