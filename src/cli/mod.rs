//! Command-line interface.
//!
//! Without a subcommand the binary starts the server. Subcommands:
//! - `config check` - Validate the configuration file
//! - `create-admin` - Create an admin account in the configured database

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::validation::{validate_email, validate_password_strength};
use crate::auth::AuthError;
use crate::config::Config;
use crate::db::{self, SqliteCredentialStore, UserRole};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "atelier")]
#[command(author, version, about = "Backend for a small studio website: portfolio, bookings and contact", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "atelier.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Keep all data in memory; nothing survives a restart
    #[arg(long)]
    pub ephemeral: bool,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Create an admin account
    CreateAdmin {
        #[arg(long)]
        email: String,

        #[arg(long, env = "ATELIER_ADMIN_PASSWORD")]
        password: String,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate the configuration file and print a summary
    Check,
}

/// Run a CLI command
pub async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(cli),
        Some(Commands::CreateAdmin {
            email,
            password,
            first_name,
            last_name,
        }) => {
            cmd_create_admin(cli, email, password, first_name.clone(), last_name.clone()).await
        }
        None => {
            // No subcommand means start the server - this is handled in main.rs
            Ok(())
        }
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "Enabled"
    } else {
        "Disabled"
    }
}

fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("A default configuration will be used when starting the server.");
        return Ok(());
    }

    // Secrets are not generated here so missing ones show up as warnings
    match Config::read(config_path) {
        Ok(config) => {
            println!("[OK] Configuration file is valid!");
            println!();
            println!("=== Configuration Summary ===");
            println!();
            println!("Server:");
            println!("  Host:          {}", config.server.host);
            println!("  Port:          {}", config.server.port);
            println!("  Data Dir:      {}", config.server.data_dir.display());
            println!();
            println!("Auth:");
            println!("  Issuer:        {}", config.auth.issuer);
            println!("  Audience:      {}", config.auth.audience);
            println!("  Access TTL:    {}s", config.auth.access_token_ttl);
            println!("  Refresh TTL:   {}s", config.auth.refresh_token_ttl);
            println!("  Reset TTL:     {}s", config.auth.reset_token_ttl);
            println!("  Default Role:  {}", config.auth.default_role);
            println!();
            println!("Security:");
            println!("  Rate Limiting: {}", enabled(config.rate_limit.enabled));
            println!();

            let warnings = config.warnings();
            if !warnings.is_empty() {
                println!("Warnings:");
                for warning in warnings {
                    println!("  [!] {}", warning);
                }
                println!();
            }

            Ok(())
        }
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            println!();
            println!("Please check the configuration file syntax and try again.");
            anyhow::bail!("Invalid configuration file");
        }
    }
}

async fn cmd_create_admin(
    cli: &Cli,
    email: &str,
    password: &str,
    first_name: Option<String>,
    last_name: Option<String>,
) -> Result<()> {
    validate_email(email).map_err(anyhow::Error::msg)?;
    validate_password_strength(password).map_err(anyhow::Error::msg)?;

    let config = Config::load(&cli.config)?;
    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data directory: {}",
            config.server.data_dir.display()
        )
    })?;

    let pool = db::init(&config.server.data_dir).await?;
    let auth = crate::build_auth_service(&config, Arc::new(SqliteCredentialStore::new(pool)));

    match auth
        .create_account(email, password, UserRole::Admin, first_name, last_name)
        .await
    {
        Ok(user) => {
            println!("[OK] Created admin {} ({})", user.email, user.id);
            Ok(())
        }
        Err(AuthError::Conflict) => {
            anyhow::bail!("An account with email {} already exists", email.trim())
        }
        Err(e) => Err(e).context("Failed to create admin account"),
    }
}
