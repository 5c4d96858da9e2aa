//! Secure credential storage using the system keyring
//!
//! Stores the connected Maximizer account (server, OAuth2 client and the
//! current token pair) as one JSON entry in the system keyring (macOS
//! Keychain, Linux Secret Service), with in-memory caching to minimize
//! keychain prompts.
//!
//! ## Environment Variable Fallback
//!
//! For development and CI, the access token can be overridden with
//! `MAXIMIZER_ACCESS_TOKEN`. The rest of the account still comes from the
//! keyring.
//!
//! Priority: env var > cache > keyring

use std::sync::RwLock;

use keyring::Entry;
use once_cell::sync::Lazy;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::{MaxbridgeError, Result};
use crate::maximizer::auth::{Credentials, StoredCredentials};

const SERVICE_NAME: &str = "maxbridge";
const CREDENTIALS_KEY: &str = "maximizer_credentials";

const ACCESS_TOKEN_ENV: &str = "MAXIMIZER_ACCESS_TOKEN";

// Option<Option<T>>:
//   - None = not yet fetched from keyring
//   - Some(None) = fetched, but no credential exists
//   - Some(Some(value)) = fetched and cached
static CREDENTIALS_CACHE: Lazy<RwLock<Option<Option<Credentials>>>> =
    Lazy::new(|| RwLock::new(None));

/// Credential store for the connected Maximizer account
pub struct CredentialStore;

impl CredentialStore {
    /// Store the account credentials securely
    ///
    /// Updates both the keyring and the in-memory cache.
    pub fn store(credentials: &Credentials) -> Result<()> {
        let json = serde_json::to_string(&credentials.to_stored())
            .map_err(|e| MaxbridgeError::Config(format!("Failed to serialize credentials: {}", e)))?;

        let entry = Entry::new(SERVICE_NAME, CREDENTIALS_KEY)?;
        entry.set_password(&json)?;

        if let Ok(mut cache) = CREDENTIALS_CACHE.write() {
            *cache = Some(Some(credentials.clone()));
        }

        debug!("stored Maximizer credentials");
        Ok(())
    }

    /// Retrieve the stored credentials
    ///
    /// Priority: environment variable (access token only) > cache > keyring
    pub fn get() -> Result<Option<Credentials>> {
        let credentials = Self::cached_or_fetch()?;
        Ok(credentials.map(apply_env_token))
    }

    fn cached_or_fetch() -> Result<Option<Credentials>> {
        if let Ok(cache) = CREDENTIALS_CACHE.read() {
            if let Some(cached_value) = cache.as_ref() {
                return Ok(cached_value.clone());
            }
        }

        let result = Self::fetch_from_keyring()?;

        if let Ok(mut cache) = CREDENTIALS_CACHE.write() {
            *cache = Some(result.clone());
        }

        Ok(result)
    }

    /// Fetch credentials directly from keyring (no cache)
    fn fetch_from_keyring() -> Result<Option<Credentials>> {
        let entry = Entry::new(SERVICE_NAME, CREDENTIALS_KEY)?;
        match entry.get_password() {
            Ok(json) => {
                let stored: StoredCredentials = serde_json::from_str(&json).map_err(|e| {
                    MaxbridgeError::Config(format!("Invalid stored credentials: {}", e))
                })?;
                Ok(Some(Credentials::from_stored(stored)))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(MaxbridgeError::Credential(format!(
                "Cannot access system keychain. Make sure your keyring is unlocked. ({})",
                e
            ))),
        }
    }

    /// Delete the stored credentials
    ///
    /// Clears both the keyring and the in-memory cache.
    pub fn delete() -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, CREDENTIALS_KEY)?;
        let result = match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()), // Already deleted
            Err(e) => Err(MaxbridgeError::Credential(e.to_string())),
        };

        if let Ok(mut cache) = CREDENTIALS_CACHE.write() {
            *cache = Some(None);
        }

        result
    }

    /// Check if an account is stored
    pub fn has_credentials() -> Result<bool> {
        Ok(Self::get()?.is_some())
    }

    /// Get the credentials, returning an error if not connected
    pub fn require() -> Result<Credentials> {
        Self::get()?.ok_or(MaxbridgeError::NotAuthenticated)
    }

    /// Get a masked version of a token for display (shows first 4 and last 4 chars)
    pub fn mask_token(token: &SecretString) -> String {
        let chars: Vec<char> = token.expose_secret().chars().collect();
        if chars.len() <= 8 {
            "*".repeat(chars.len())
        } else {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        }
    }
}

fn apply_env_token(credentials: Credentials) -> Credentials {
    match std::env::var(ACCESS_TOKEN_ENV) {
        Ok(token) if !token.is_empty() => Credentials {
            access_token: Some(SecretString::from(token)),
            ..credentials
        },
        _ => credentials,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        let short = SecretString::from("abc");
        assert_eq!(CredentialStore::mask_token(&short), "***");

        let long = SecretString::from("eyJhbGciOiJIUzI1NiJ9.payload");
        assert_eq!(CredentialStore::mask_token(&long), "eyJh...load");
    }

    #[test]
    fn test_mask_token_non_ascii() {
        let short = SecretString::from("jeton-é");
        assert_eq!(CredentialStore::mask_token(&short), "*******");

        let long = SecretString::from("éééé-secret-ßßßß");
        assert_eq!(CredentialStore::mask_token(&long), "éééé...ßßßß");
    }

    #[test]
    fn test_stored_credentials_keep_every_field() {
        let credentials = Credentials {
            access_token: Some(SecretString::from("access")),
            refresh_token: Some(SecretString::from("refresh")),
            ..Credentials::new("https://crm.example.com", "client", "secret")
                .with_redirect_uri("https://localhost/callback")
        };

        let json = serde_json::to_string(&credentials.to_stored()).unwrap();
        let stored: StoredCredentials = serde_json::from_str(&json).unwrap();
        let restored = Credentials::from_stored(stored);

        assert_eq!(restored.base_url, "https://crm.example.com");
        assert_eq!(restored.client_id, "client");
        assert_eq!(restored.client_secret.expose_secret(), "secret");
        assert_eq!(
            restored.redirect_uri.as_deref(),
            Some("https://localhost/callback")
        );
        assert_eq!(restored.bearer_token(), Some("access"));
        assert_eq!(
            restored.refresh_token.as_ref().map(|t| t.expose_secret()),
            Some("refresh")
        );
    }

    #[test]
    fn test_stored_credentials_without_tokens_deserialize() {
        let json = r#"{"base_url":"https://crm.example.com","client_id":"c","client_secret":"s","version":1}"#;
        let stored: StoredCredentials = serde_json::from_str(json).unwrap();
        let restored = Credentials::from_stored(stored);

        assert!(restored.redirect_uri.is_none());
        assert!(restored.bearer_token().is_none());
        assert!(restored.refresh_token.is_none());
    }
}
