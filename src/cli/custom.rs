//! Custom record CLI command handlers
//!
//! Every operation runs through the [`TokenManager`] so an expired access
//! token is refreshed and stored, and the operation retried once.

use chrono::DateTime;
use serde::Serialize;

use crate::cli::commands::CustomCommand;
use crate::core::config::Config;
use crate::core::credentials::CredentialStore;
use crate::core::token_manager::TokenManager;
use crate::error::{MaxbridgeError, Result};
use crate::maximizer::client::MaximizerClient;
use crate::maximizer::custom::{CreateCustomParams, CustomHandler, CustomRecord, PolledRecord};
use crate::maximizer::http::ReqwestTransport;
use crate::maximizer::session::AuthenticatedSession;

type Session = AuthenticatedSession<ReqwestTransport>;

/// Handle Custom record commands
pub async fn handle_custom(command: CustomCommand) -> Result<()> {
    let config = Config::load()?;
    let credentials = CredentialStore::require()?;
    let manager = TokenManager::new(ReqwestTransport::new()?).with_persist(CredentialStore::store);
    let application_id = config.application_id;

    match command {
        CustomCommand::Create {
            name,
            description,
            text1,
            number1,
            numeric1,
            datetime1,
        } => {
            let params = CreateCustomParams {
                name: Some(name),
                description,
                text1,
                number1,
                numeric1,
                date_time1: datetime1.map(validate_datetime).transpose()?,
            };
            let outcome = manager
                .run(credentials, |session| {
                    create(session, application_id.clone(), params.clone())
                })
                .await?;
            print_json(&outcome.value)
        }
        CustomCommand::Search { name } => {
            let outcome = manager
                .run(credentials, |session| {
                    search(session, application_id.clone(), name.clone())
                })
                .await?;
            print_json(&outcome.value)
        }
        CustomCommand::Poll => {
            let outcome = manager
                .run(credentials, |session| poll(session, application_id.clone()))
                .await?;
            print_json(&outcome.value)
        }
    }
}

async fn create(
    session: Session,
    application_id: String,
    params: CreateCustomParams,
) -> Result<CustomRecord> {
    let client = client(session);
    CustomHandler::with_application_id(&client, &application_id)
        .create(params)
        .await
}

async fn search(session: Session, application_id: String, name: String) -> Result<Vec<CustomRecord>> {
    let client = client(session);
    CustomHandler::with_application_id(&client, &application_id)
        .search(&name)
        .await
}

async fn poll(session: Session, application_id: String) -> Result<Vec<PolledRecord>> {
    let client = client(session);
    CustomHandler::with_application_id(&client, &application_id)
        .poll()
        .await
}

fn client(session: Session) -> MaximizerClient<Session> {
    let base_url = session.credentials().base_url.clone();
    MaximizerClient::new(session, &base_url)
}

/// Accept RFC 3339 date/times only; the value is sent as typed
fn validate_datetime(value: String) -> Result<String> {
    DateTime::parse_from_rfc3339(&value).map_err(|e| {
        MaxbridgeError::Validation(format!(
            "DateTime1 must be an RFC 3339 date/time such as 2024-01-01T00:00:00Z ({})",
            e
        ))
    })?;
    Ok(value)
}

fn print_json<S: Serialize>(value: &S) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc3339_datetime_is_kept_as_typed() {
        assert_eq!(
            validate_datetime("2024-01-01T09:30:00-05:00".to_string()).unwrap(),
            "2024-01-01T09:30:00-05:00"
        );
    }

    #[test]
    fn test_invalid_datetime_is_a_validation_error() {
        let err = validate_datetime("next tuesday".to_string()).unwrap_err();
        assert!(matches!(err, MaxbridgeError::Validation(_)));
    }
}
