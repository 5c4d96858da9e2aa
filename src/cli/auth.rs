//! Authentication CLI command handlers

use std::io::{self, Write};
use std::process::Command;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::cli::commands::{AuthCommand, LoginArgs};
use crate::core::config::Config;
use crate::core::credentials::CredentialStore;
use crate::core::token_manager::TokenManager;
use crate::error::{MaxbridgeError, Result};
use crate::maximizer::auth::{
    authorize_url, connection_label, AuthorizationInput, Authenticator, Credentials,
};
use crate::maximizer::http::{HttpResponse, ReqwestTransport};
use crate::maximizer::session::AuthenticatedSession;

/// Handle authentication commands
pub async fn handle_auth(command: AuthCommand) -> Result<()> {
    match command {
        AuthCommand::Login(args) => handle_login(args).await,
        AuthCommand::Refresh => handle_refresh().await,
        AuthCommand::Test => handle_test().await,
        AuthCommand::Status => handle_status(),
        AuthCommand::Logout => handle_logout(),
    }
}

/// Handle the login command using the authorization-code grant
async fn handle_login(args: LoginArgs) -> Result<()> {
    let config = Config::load()?;
    let stored = CredentialStore::get()?;

    let code = args.code.clone();
    let mut input = login_input(args, &config, stored.as_ref());

    if input.client_secret.is_none() {
        let secret = prompt("Client secret: ")?;
        input.client_secret = Some(SecretString::from(secret));
    }

    if code.is_none() {
        input.code = Some(request_authorization_code(&input)?);
    }

    let grant = input.resolve()?;
    let transport = ReqwestTransport::new()?;

    println!("Exchanging authorization code...");
    let tokens = Authenticator::new(transport.clone())
        .acquire_token(&grant)
        .await?;
    let credentials = grant.into_credentials(tokens);

    let response = verify(AuthenticatedSession::new(transport, credentials.clone())).await?;
    CredentialStore::store(&credentials)?;

    println!();
    println!("✓ Connected to Maximizer as {}", connection_label(&response));
    Ok(())
}

/// Merge login flags, config and stored credentials, in that order
fn login_input(
    args: LoginArgs,
    config: &Config,
    stored: Option<&Credentials>,
) -> AuthorizationInput {
    let flags = AuthorizationInput {
        base_url: args.url,
        client_id: args.client_id,
        client_secret: args.client_secret.map(SecretString::from),
        code: args.code,
        redirect_uri: args.redirect_uri,
    };
    let configured = AuthorizationInput {
        base_url: config.maximizer_url.clone(),
        client_id: config.client_id.clone(),
        redirect_uri: config.redirect_uri.clone(),
        ..AuthorizationInput::default()
    };

    let input = flags.with_fallback(configured);
    match stored {
        Some(credentials) => input.with_fallback(AuthorizationInput::from(credentials)),
        None => input,
    }
}

/// Send the user to the authorize page and read back the code
fn request_authorization_code(input: &AuthorizationInput) -> Result<String> {
    let base_url = required(&input.base_url, "Maximizer URL")?;
    let client_id = required(&input.client_id, "client ID")?;
    let redirect_uri = required(&input.redirect_uri, "redirect URI")?;

    let state = login_state();
    let url = authorize_url(base_url, client_id, &state, redirect_uri)?;

    println!("Open this URL in your browser and approve the connection:");
    println!("  {}", url);
    println!();

    if open_browser(url.as_str()) {
        println!("✓ Browser opened automatically.");
        println!();
    }

    let answer = prompt("Paste the authorization code or the full redirect URL: ")?;
    parse_authorization_response(&answer, &state)
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value.as_deref().filter(|v| !v.is_empty()).ok_or_else(|| {
        MaxbridgeError::Validation(format!("The {} is required to connect to Maximizer.", name))
    })
}

/// Random per-login state value for CSRF protection
fn login_state() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Extract the authorization code from a pasted code or redirect URL
///
/// A redirect URL must carry the state sent with the authorize request.
fn parse_authorization_response(answer: &str, expected_state: &str) -> Result<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(MaxbridgeError::Cancelled);
    }

    let Ok(url) = Url::parse(answer) else {
        return Ok(answer.to_string());
    };

    let param = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };

    if let Some(error) = param("error") {
        return Err(MaxbridgeError::AuthenticationFailed(error));
    }
    if param("state").as_deref() != Some(expected_state) {
        return Err(MaxbridgeError::AuthenticationFailed(
            "The authorization state did not match. Start the login again.".to_string(),
        ));
    }
    param("code")
        .filter(|code| !code.is_empty())
        .ok_or_else(|| {
            MaxbridgeError::AuthenticationFailed(
                "The redirect URL does not contain an authorization code.".to_string(),
            )
        })
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}

/// Try to open a URL in the default browser
fn open_browser(url: &str) -> bool {
    #[cfg(target_os = "macos")]
    {
        Command::new("open").arg(url).spawn().is_ok()
    }

    #[cfg(target_os = "linux")]
    {
        Command::new("xdg-open").arg(url).spawn().is_ok()
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        false
    }
}

/// Run the connection test through one session
async fn verify(session: AuthenticatedSession<ReqwestTransport>) -> Result<HttpResponse> {
    let base_url = session.credentials().base_url.clone();
    Authenticator::new(session).verify_connection(&base_url).await
}

/// Handle the refresh command
async fn handle_refresh() -> Result<()> {
    let credentials = CredentialStore::require()?;
    let manager = TokenManager::new(ReqwestTransport::new()?).with_persist(CredentialStore::store);
    manager.refresh(credentials).await?;

    println!("✓ Access token refreshed.");
    Ok(())
}

/// Handle the test command
async fn handle_test() -> Result<()> {
    let credentials = CredentialStore::require()?;
    let manager = TokenManager::new(ReqwestTransport::new()?).with_persist(CredentialStore::store);
    let outcome = manager.run(credentials, verify).await?;

    println!("✓ Connected to Maximizer as {}", connection_label(&outcome.value));
    Ok(())
}

/// Handle the logout command
fn handle_logout() -> Result<()> {
    if !CredentialStore::has_credentials()? {
        println!("Not currently authenticated.");
        return Ok(());
    }

    CredentialStore::delete()?;
    println!("Successfully logged out.");
    Ok(())
}

/// Handle the status command
fn handle_status() -> Result<()> {
    let Some(credentials) = CredentialStore::get()? else {
        println!("Authentication Status:");
        println!("  Maximizer: Not authenticated");
        return Ok(());
    };

    println!("Authentication Status:");
    println!("  Maximizer: Authenticated");
    println!("\n  Server: {}", credentials.base_url);
    println!("  Client ID: {}", credentials.client_id);
    if let Some(redirect_uri) = &credentials.redirect_uri {
        println!("  Redirect URI: {}", redirect_uri);
    }
    match &credentials.access_token {
        Some(token) if !token.expose_secret().is_empty() => {
            println!("  Access token: {}", CredentialStore::mask_token(token))
        }
        _ => println!("  Access token: none"),
    }
    println!(
        "  Refresh token: {}",
        if credentials.refresh_token.is_some() {
            "stored (will auto-refresh)"
        } else {
            "none (re-login required when the access token expires)"
        }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_code_is_accepted() {
        assert_eq!(
            parse_authorization_response("  abc123 \n", "state").unwrap(),
            "abc123"
        );
    }

    #[test]
    fn test_redirect_url_yields_code() {
        let code = parse_authorization_response(
            "https://localhost/callback?code=xyz%2F1&state=s1",
            "s1",
        )
        .unwrap();
        assert_eq!(code, "xyz/1");
    }

    #[test]
    fn test_redirect_url_with_wrong_state_is_rejected() {
        let err =
            parse_authorization_response("https://localhost/callback?code=xyz&state=other", "s1")
                .unwrap_err();
        assert!(matches!(err, MaxbridgeError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_redirect_url_with_error_is_rejected() {
        let err = parse_authorization_response(
            "https://localhost/callback?error=access_denied&state=s1",
            "s1",
        )
        .unwrap_err();
        match err {
            MaxbridgeError::AuthenticationFailed(reason) => assert_eq!(reason, "access_denied"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_answer_cancels() {
        assert!(matches!(
            parse_authorization_response("   ", "s1"),
            Err(MaxbridgeError::Cancelled)
        ));
    }

    #[test]
    fn test_login_input_prefers_flags_then_config_then_stored() {
        let args = LoginArgs {
            client_id: Some("flag-client".into()),
            ..LoginArgs::default()
        };
        let config = Config {
            maximizer_url: Some("https://configured.example.com".into()),
            client_id: Some("config-client".into()),
            ..Config::default()
        };
        let stored = Credentials::new("https://stored.example.com", "stored-client", "secret")
            .with_redirect_uri("https://localhost/callback");

        let input = login_input(args, &config, Some(&stored));

        assert_eq!(input.base_url.as_deref(), Some("https://configured.example.com"));
        assert_eq!(input.client_id.as_deref(), Some("flag-client"));
        assert_eq!(input.redirect_uri.as_deref(), Some("https://localhost/callback"));
        assert_eq!(
            input.client_secret.as_ref().map(|s| s.expose_secret()),
            Some("secret")
        );
        assert!(input.code.is_none());
    }

    #[test]
    fn test_login_state_is_random_and_url_safe() {
        let first = login_state();
        let second = login_state();

        assert_eq!(first.len(), 43);
        assert_ne!(first, second);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
