//! CLI command definitions using clap
//!
//! Defines the command structure for the `mxb` CLI tool.

use clap::{Parser, Subcommand, ValueEnum};

/// maxbridge - Maximizer CRM connector
///
/// Connects to a Maximizer server over OAuth2 and creates, searches and
/// polls Custom records. Output is printed as JSON.
#[derive(Parser, Debug)]
#[command(name = "mxb", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to Maximizer
    Auth(AuthArgs),

    /// Create, search and poll Custom records
    Custom(CustomArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// Print the connector definition as JSON
    Describe,
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Authentication commands
#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Connect a Maximizer account with the authorization-code grant
    Login(LoginArgs),
    /// Exchange the stored refresh token for a new access token
    Refresh,
    /// Test the stored connection with GetSessionInfo
    Test,
    /// Show current authentication status
    Status,
    /// Logout and remove stored credentials
    Logout,
}

/// Login parameters; missing values fall back to config and stored credentials
#[derive(Parser, Debug, Default)]
pub struct LoginArgs {
    /// Maximizer server base URL
    #[arg(long, env = "MAXIMIZER_URL")]
    pub url: Option<String>,

    /// OAuth2 client ID
    #[arg(long)]
    pub client_id: Option<String>,

    /// OAuth2 client secret
    #[arg(long, env = "MAXIMIZER_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Redirect URI registered with the OAuth2 app profile
    #[arg(long)]
    pub redirect_uri: Option<String>,

    /// Authorization code; skips the browser step when given
    #[arg(long)]
    pub code: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Custom Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Custom record commands
#[derive(Parser, Debug)]
pub struct CustomArgs {
    #[command(subcommand)]
    pub command: CustomCommand,
}

#[derive(Subcommand, Debug)]
pub enum CustomCommand {
    /// Create a Custom record
    Create {
        /// Record name
        #[arg(long)]
        name: String,

        /// Record description
        #[arg(long)]
        description: Option<String>,

        /// Text value
        #[arg(long)]
        text1: Option<String>,

        /// Integer value
        #[arg(long)]
        number1: Option<i64>,

        /// Numeric value
        #[arg(long)]
        numeric1: Option<f64>,

        /// Date/time value (RFC 3339)
        #[arg(long)]
        datetime1: Option<String>,
    },

    /// Search Custom records by name
    Search {
        /// Name to search for (may include % wildcard)
        name: String,
    },

    /// List Custom records for new-record polling
    Poll,
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration commands
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Set a configuration value
    Set {
        /// Configuration key
        key: ConfigKey,

        /// Configuration value
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: ConfigKey,
    },

    /// Remove a configuration value
    Remove {
        /// Configuration key
        key: ConfigKey,
    },
}

/// Available configuration keys
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    /// Maximizer server base URL
    #[value(name = "maximizer-url")]
    MaximizerUrl,

    /// OAuth2 client ID
    #[value(name = "client-id")]
    ClientId,

    /// OAuth2 redirect URI
    #[value(name = "redirect-uri")]
    RedirectUri,

    /// ApplicationId stamped on Custom records
    #[value(name = "application-id")]
    ApplicationId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_custom_create() {
        let cli = Cli::try_parse_from([
            "mxb", "custom", "create", "--name", "Widget", "--number1", "7", "--numeric1", "1.5",
        ])
        .unwrap();

        match cli.command {
            Commands::Custom(CustomArgs {
                command:
                    CustomCommand::Create {
                        name,
                        number1,
                        numeric1,
                        description,
                        ..
                    },
            }) => {
                assert_eq!(name, "Widget");
                assert_eq!(number1, Some(7));
                assert_eq!(numeric1, Some(1.5));
                assert!(description.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_create_requires_name() {
        assert!(Cli::try_parse_from(["mxb", "custom", "create"]).is_err());
    }

    #[test]
    fn test_parse_config_key() {
        let cli = Cli::try_parse_from(["mxb", "config", "get", "application-id"]).unwrap();
        match cli.command {
            Commands::Config(ConfigArgs {
                command: ConfigCommand::Get { key },
            }) => assert_eq!(key, ConfigKey::ApplicationId),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
