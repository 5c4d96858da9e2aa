//! Configuration CLI command handlers

use url::Url;

use crate::cli::commands::{ConfigCommand, ConfigKey};
use crate::core::config::Config;
use crate::error::{MaxbridgeError, Result};
use crate::maximizer::custom::DEFAULT_APPLICATION_ID;

/// Handle configuration commands
pub fn handle_config(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Set { key, value } => handle_set(key, value),
        ConfigCommand::Get { key } => handle_get(key),
        ConfigCommand::Remove { key } => handle_remove(key),
    }
}

/// Handle setting a configuration value
fn handle_set(key: ConfigKey, value: String) -> Result<()> {
    let mut config = Config::load()?;
    apply(&mut config, key, Some(value))?;
    config.save()?;

    println!("{} set to: {}", label(key), value_of(&config, key));
    Ok(())
}

/// Handle getting a configuration value
fn handle_get(key: ConfigKey) -> Result<()> {
    let config = Config::load()?;
    println!("{}: {}", label(key), value_of(&config, key));
    Ok(())
}

/// Handle removing a configuration value
fn handle_remove(key: ConfigKey) -> Result<()> {
    let mut config = Config::load()?;
    apply(&mut config, key, None)?;
    config.save()?;

    println!("{} has been removed.", label(key));
    Ok(())
}

/// Set or clear one key; `ApplicationId` resets to its default when cleared
fn apply(config: &mut Config, key: ConfigKey, value: Option<String>) -> Result<()> {
    let value = value.map(|v| v.trim().to_string());
    if value.as_deref() == Some("") {
        return Err(MaxbridgeError::Validation(format!(
            "{} cannot be empty.",
            label(key)
        )));
    }

    match key {
        ConfigKey::MaximizerUrl => {
            if let Some(url) = &value {
                validate_url(url)?;
            }
            config.maximizer_url = value.map(|url| url.trim_end_matches('/').to_string());
        }
        ConfigKey::ClientId => config.client_id = value,
        ConfigKey::RedirectUri => {
            if let Some(url) = &value {
                validate_url(url)?;
            }
            config.redirect_uri = value;
        }
        ConfigKey::ApplicationId => {
            config.application_id = value.unwrap_or_else(|| DEFAULT_APPLICATION_ID.to_string())
        }
    }
    Ok(())
}

fn validate_url(value: &str) -> Result<()> {
    Url::parse(value).map_err(|e| {
        MaxbridgeError::Validation(format!("Invalid URL '{}': {}", value, e))
    })?;
    Ok(())
}

fn label(key: ConfigKey) -> &'static str {
    match key {
        ConfigKey::MaximizerUrl => "Maximizer URL",
        ConfigKey::ClientId => "Client ID",
        ConfigKey::RedirectUri => "Redirect URI",
        ConfigKey::ApplicationId => "Application ID",
    }
}

fn value_of(config: &Config, key: ConfigKey) -> String {
    let value = match key {
        ConfigKey::MaximizerUrl => config.maximizer_url.as_deref(),
        ConfigKey::ClientId => config.client_id.as_deref(),
        ConfigKey::RedirectUri => config.redirect_uri.as_deref(),
        ConfigKey::ApplicationId => Some(config.application_id.as_str()),
    };
    value.unwrap_or("Not configured").to_string()
}
