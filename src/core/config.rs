//! Application configuration management
//!
//! Handles loading and saving non-secret connector settings:
//! - Maximizer server URL, OAuth2 client ID and redirect URI
//! - The `ApplicationId` stamped on created Custom records
//!
//! Secrets live in the keyring (see [`crate::core::credentials`]).

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{MaxbridgeError, Result};
use crate::maximizer::custom::DEFAULT_APPLICATION_ID;

/// Overrides the configured server URL when set
pub const MAXIMIZER_URL_ENV: &str = "MAXIMIZER_URL";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Maximizer server base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximizer_url: Option<String>,

    /// OAuth2 client ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Redirect URI registered with the OAuth2 app profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Application identifier for Custom records
    #[serde(default = "default_application_id")]
    pub application_id: String,
}

fn default_application_id() -> String {
    DEFAULT_APPLICATION_ID.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            maximizer_url: None,
            client_id: None,
            redirect_uri: None,
            application_id: default_application_id(),
        }
    }
}

impl Config {
    /// Load configuration from file, or create default if not exists
    ///
    /// `MAXIMIZER_URL` takes precedence over the stored server URL.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        if let Ok(url) = std::env::var(MAXIMIZER_URL_ENV) {
            if !url.is_empty() {
                config.maximizer_url = Some(url);
            }
        }
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the configuration directory
    pub fn config_dir() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "maxbridge", "maxbridge")
            .ok_or_else(|| MaxbridgeError::Config("Could not determine config directory".into()))?;

        Ok(project_dirs.config_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.application_id, "maxbridge");
        assert!(config.maximizer_url.is_none());
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            maximizer_url: Some("https://crm.example.com".into()),
            client_id: Some("client".into()),
            redirect_uri: None,
            application_id: "zapier".into(),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "client_id = \"abc\"\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.client_id.as_deref(), Some("abc"));
        assert_eq!(loaded.application_id, DEFAULT_APPLICATION_ID);
    }

    #[test]
    fn test_invalid_file_is_a_toml_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "client_id = [").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, MaxbridgeError::Toml(_)));
    }
}
