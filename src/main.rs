//! maxbridge - Maximizer CRM connector CLI
//!
//! Connects a Maximizer account and runs the Custom record operations
//! from the command line.
//!
//! Available as the `mxb` command.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use maxbridge::cli::commands::{Cli, Commands};
use maxbridge::cli::{auth, config, custom, handle_describe};
use maxbridge::error::{MaxbridgeError, Result};
use maxbridge::maximizer::AuthState;

#[tokio::main]
async fn main() {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        handle_error(e);
        std::process::exit(1);
    }
}

/// Print errors, with a login hint when the session cannot be recovered
fn handle_error(e: MaxbridgeError) {
    match e.auth_state() {
        // Still rejected after the single refresh-and-retry
        AuthState::RefreshRequested => {
            eprintln!("Error: Maximizer rejected the access token again after a refresh.");
            eprintln!();
            eprintln!("  → Run 'mxb auth login' to reconnect.");
        }
        AuthState::Authenticated => {
            eprintln!("Error: {}", e);
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Auth(args) => auth::handle_auth(args.command).await,
        Commands::Custom(args) => custom::handle_custom(args.command).await,
        Commands::Config(args) => config::handle_config(args.command),
        Commands::Describe => handle_describe(),
    }
}
