//! E-Shop CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! eshop-cli migrate
//!
//! # Load or remove the sample catalog
//! eshop-cli seed import
//! eshop-cli seed destroy
//!
//! # Grant admin rights to a registered user
//! eshop-cli admin promote -e admin@example.com
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "eshop-cli")]
#[command(author, version, about = "E-Shop CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Load or remove sample catalog data
    Seed {
        #[command(subcommand)]
        action: SeedAction,
    },
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum SeedAction {
    /// Replace all products with the sample catalog
    Import,
    /// Delete all products
    Destroy,
}

#[derive(Subcommand)]
enum AdminAction {
    /// Make an existing user an admin
    Promote {
        /// Email address of the registered user
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
        Commands::Seed { action } => match action {
            SeedAction::Import => commands::seed::import().await?,
            SeedAction::Destroy => commands::seed::destroy().await?,
        },
        Commands::Admin { action } => match action {
            AdminAction::Promote { email } => commands::admin::promote(&email).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_admin_promote() {
        let cli = Cli::try_parse_from(["eshop-cli", "admin", "promote", "-e", "a@b.co"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Admin { action: AdminAction::Promote { ref email } } if email == "a@b.co"
        ));
    }
}
