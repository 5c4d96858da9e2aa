//! Connector registration records
//!
//! Describes the authentication scheme and the trigger, search and create
//! operations in the shape the host platform registers them.

use serde::Serialize;
use serde_json::{json, Value};

use crate::maximizer::custom::RESOURCE;

/// Field types understood by the host's input forms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Text,
    Integer,
    Number,
    Datetime,
}

/// An input or output field schema
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub key: &'static str,
    pub label: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<&'static str>,
}

impl FieldDefinition {
    fn input(
        key: &'static str,
        label: &'static str,
        field_type: FieldType,
        required: bool,
        help_text: &'static str,
    ) -> Self {
        Self {
            key,
            label,
            field_type,
            required: Some(required),
            help_text: Some(help_text),
        }
    }

    fn output(key: &'static str, label: &'static str, field_type: FieldType) -> Self {
        Self {
            key,
            label,
            field_type,
            required: None,
            help_text: None,
        }
    }
}

/// Label and description shown to users
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Display {
    pub label: &'static str,
    pub description: &'static str,
}

/// One registered trigger, search or create
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDefinition {
    pub key: &'static str,
    pub noun: &'static str,
    pub display: Display,
    pub input_fields: Vec<FieldDefinition>,
    pub output_fields: Vec<FieldDefinition>,
    pub sample: Value,
}

/// Authorize redirect parameters, as host templates
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeUrlTemplate {
    pub url: &'static str,
    pub params: Value,
}

/// OAuth2 authentication registration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationDefinition {
    #[serde(rename = "type")]
    pub auth_type: &'static str,
    pub authorize_url: AuthorizeUrlTemplate,
    pub auto_refresh: bool,
    pub fields: Vec<FieldDefinition>,
    pub connection_label: &'static str,
}

/// Everything the host registers for this connector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectorDefinition {
    pub version: &'static str,
    pub authentication: AuthenticationDefinition,
    pub triggers: Vec<OperationDefinition>,
    pub searches: Vec<OperationDefinition>,
    pub creates: Vec<OperationDefinition>,
}

impl ConnectorDefinition {
    /// The Maximizer connector
    pub fn maximizer() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            authentication: authentication(),
            triggers: vec![OperationDefinition {
                key: "custom",
                noun: RESOURCE,
                display: Display {
                    label: "New Custom Record",
                    description: "Triggers when a new Custom record is created in Maximizer (also known as CustomIndependent records).",
                },
                input_fields: Vec::new(),
                output_fields: record_output_fields(),
                sample: sample_record(),
            }],
            searches: vec![OperationDefinition {
                key: "custom",
                noun: RESOURCE,
                display: Display {
                    label: "Search Custom Records",
                    description: "Searches for Custom records in Maximizer (also known as CustomIndependent records).",
                },
                input_fields: vec![FieldDefinition::input(
                    "name",
                    "Name",
                    FieldType::String,
                    true,
                    "The Name of the Custom record to search for (may include % wildcard).",
                )],
                output_fields: record_output_fields(),
                sample: sample_record(),
            }],
            creates: vec![OperationDefinition {
                key: "custom",
                noun: RESOURCE,
                display: Display {
                    label: "Create Custom Record",
                    description: "Creates a new Custom record in Maximizer (also known as a CustomIndependent record).",
                },
                input_fields: create_input_fields(),
                output_fields: record_output_fields(),
                sample: sample_record(),
            }],
        }
    }
}

fn authentication() -> AuthenticationDefinition {
    AuthenticationDefinition {
        auth_type: "oauth2",
        authorize_url: AuthorizeUrlTemplate {
            url: "{{bundle.inputData.maximizerurl}}/MaximizerWebAuthentication/OAuth2/Authorize",
            params: json!({
                "client_id": "{{bundle.inputData.clientid}}",
                "state": "{{bundle.inputData.state}}",
                "redirect_uri": "{{bundle.inputData.redirect_uri}}",
                "response_type": "code",
            }),
        },
        auto_refresh: true,
        fields: vec![
            FieldDefinition::input(
                "maximizerurl",
                "Maximizer URL",
                FieldType::String,
                true,
                "The base URL where your Maximizer server is located (e.g. https://www.example.com). Do not include the trailing slash, or any subdirectories.",
            ),
            FieldDefinition::input(
                "clientid",
                "Client ID",
                FieldType::String,
                true,
                "The Client ID of the OAuth2 app profile in Maximizer.",
            ),
            FieldDefinition::input(
                "clientsecret",
                "Client Secret",
                FieldType::String,
                true,
                "The Client Secret of the OAuth2 app profile in Maximizer.",
            ),
        ],
        connection_label: "{{json.Data.AddressBook.DisplayValue}} - {{json.Data.User.DisplayName}}",
    }
}

fn create_input_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::input(
            "name",
            "Name",
            FieldType::String,
            true,
            "The name of the Custom record to be saved.",
        ),
        FieldDefinition::input(
            "description",
            "Description",
            FieldType::Text,
            false,
            "The description of the Custom record to be saved.",
        ),
        FieldDefinition::input(
            "text1",
            "Text 1",
            FieldType::Text,
            false,
            "A text value to include with the Custom record to be saved.",
        ),
        FieldDefinition::input(
            "number1",
            "Number1",
            FieldType::Integer,
            false,
            "An integer value to include with the Custom record to be saved.",
        ),
        FieldDefinition::input(
            "numeric1",
            "Numeric1",
            FieldType::Number,
            false,
            "A numeric value to include with the Custom record to be saved.",
        ),
        FieldDefinition::input(
            "datetime1",
            "DateTime1",
            FieldType::Datetime,
            false,
            "A date/time value to include with the Custom record to be saved.",
        ),
    ]
}

fn record_output_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::output("Key", "Custom Record Key", FieldType::String),
        FieldDefinition::output("ApplicationId", "Custom Record Application ID", FieldType::String),
        FieldDefinition::output("Name", "Custom Record Name", FieldType::String),
        FieldDefinition::output("Description", "Custom Record Description", FieldType::Text),
        FieldDefinition::output("Text1", "Custom Record Text1", FieldType::Text),
        FieldDefinition::output("Number1", "Custom Record Number1", FieldType::Integer),
        FieldDefinition::output("Numeric1", "Custom Record Numeric1", FieldType::Number),
        FieldDefinition::output("DateTime1", "Custom Record DateTime1", FieldType::Datetime),
    ]
}

fn sample_record() -> Value {
    json!({
        "Key": "example key",
        "ApplicationId": "example appid",
        "Name": "example name",
        "Description": "example description",
        "Text1": "example text",
        "Number1": 12345,
        "Numeric1": 123.45,
        "DateTime1": "2024-01-01T00:00:00Z",
    })
}
