//! Custom record operations
//!
//! Create, search and poll Maximizer Custom (CustomIndependent) records. Every
//! record written by the connector carries its ApplicationId, and reads are
//! scoped to that ApplicationId so only the connector's own records come back.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::error::{MaxbridgeError, Result};
use crate::maximizer::client::{MaximizerClient, Payload};
use crate::maximizer::http::Transport;

/// Resource name used in request and response payloads
pub const RESOURCE: &str = "Custom";

/// ApplicationId written on every record this connector creates
pub const DEFAULT_APPLICATION_ID: &str = env!("CARGO_PKG_NAME");

/// Fields returned by search and poll
const SCOPE_FIELDS: [&str; 7] = [
    "Key",
    "Name",
    "Description",
    "Text1",
    "Number1",
    "Numeric1",
    "DateTime1",
];

/// A Custom record as returned by the API
///
/// Fields the connector does not model are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomRecord {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number1: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric1: Option<f64>,
    #[serde(rename = "DateTime1", default, skip_serializing_if = "Option::is_none")]
    pub date_time1: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A record emitted by the polling trigger
///
/// `id` equals the record's `Key`; the host deduplicates polls on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolledRecord {
    #[serde(flatten)]
    pub record: CustomRecord,
    pub id: String,
}

/// Input for creating a Custom record
#[derive(Debug, Clone, Default)]
pub struct CreateCustomParams {
    /// Required
    pub name: Option<String>,
    pub description: Option<String>,
    pub text1: Option<String>,
    pub number1: Option<i64>,
    pub numeric1: Option<f64>,
    /// ISO 8601 date/time
    pub date_time1: Option<String>,
}

/// Comparison operator in a search query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Exact match
    Eq,
    /// Pattern match; `%` is the wildcard
    Like,
}

impl Operator {
    /// Wire name of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "$EQ",
            Operator::Like => "$LIKE",
        }
    }
}

/// A `SearchQuery` criterion
#[derive(Debug, Clone, PartialEq)]
pub enum SearchQuery {
    /// `{"$AND": [...]}`
    And(Vec<SearchQuery>),
    /// `{"<field>": {"<op>": <value>}}`
    Condition {
        field: String,
        operator: Operator,
        value: Value,
    },
}

impl SearchQuery {
    /// `field` equals `value`
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        SearchQuery::Condition {
            field: field.to_string(),
            operator: Operator::Eq,
            value: value.into(),
        }
    }

    /// `field` matches the pattern `value`
    pub fn like(field: &str, value: impl Into<Value>) -> Self {
        SearchQuery::Condition {
            field: field.to_string(),
            operator: Operator::Like,
            value: value.into(),
        }
    }
}

impl Serialize for SearchQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            SearchQuery::And(queries) => map.serialize_entry("$AND", queries)?,
            SearchQuery::Condition {
                field,
                operator,
                value,
            } => {
                let condition = Map::from_iter([(operator.as_str().to_string(), value.clone())]);
                map.serialize_entry(field, &condition)?
            }
        }
        map.end()
    }
}

#[derive(Debug, Serialize)]
struct CreateRequest {
    #[serde(rename = "Custom")]
    custom: CreatePayload,
}

#[derive(Debug, Serialize)]
struct CreatePayload {
    #[serde(rename = "Data")]
    data: CustomRecord,
}

#[derive(Debug, Serialize)]
struct ReadRequest {
    #[serde(rename = "Custom")]
    custom: ReadPayload,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReadPayload {
    criteria: Criteria,
    scope: Scope,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Criteria {
    search_query: SearchQuery,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Scope {
    fields: Map<String, Value>,
}

impl Scope {
    fn record_fields() -> Self {
        Self {
            fields: SCOPE_FIELDS
                .iter()
                .map(|field| (field.to_string(), Value::from(1)))
                .collect(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Build the `Create` request body
///
/// `Key` is sent as null so the server assigns one; empty optional fields are left out.
pub fn build_create_request(application_id: &str, params: CreateCustomParams) -> Result<Value> {
    let name = non_empty(params.name)
        .ok_or_else(|| MaxbridgeError::Validation("The name field is required.".to_string()))?;

    let request = CreateRequest {
        custom: CreatePayload {
            data: CustomRecord {
                key: None,
                application_id: Some(application_id.to_string()),
                name: Some(name),
                description: non_empty(params.description),
                text1: non_empty(params.text1),
                number1: params.number1,
                numeric1: params.numeric1,
                date_time1: non_empty(params.date_time1),
                extra: Map::new(),
            },
        },
    };
    Ok(serde_json::to_value(request)?)
}

/// Build a `Read` request body for `query`
pub fn build_read_request(query: SearchQuery) -> Result<Value> {
    let request = ReadRequest {
        custom: ReadPayload {
            criteria: Criteria {
                search_query: query,
            },
            scope: Scope::record_fields(),
        },
    };
    Ok(serde_json::to_value(request)?)
}

/// Query for records owned by `application_id` whose Name matches `name`
pub fn search_query(application_id: &str, name: &str) -> SearchQuery {
    SearchQuery::And(vec![
        SearchQuery::eq("ApplicationId", application_id),
        SearchQuery::like("Name", name),
    ])
}

/// Query for every record owned by `application_id`
pub fn poll_query(application_id: &str) -> SearchQuery {
    SearchQuery::eq("ApplicationId", application_id)
}

/// Keep keyed records and copy each `Key` into `id`
pub fn into_polled(records: Vec<CustomRecord>) -> Vec<PolledRecord> {
    records
        .into_iter()
        .filter_map(|mut record| {
            let id = record.key.clone().filter(|key| !key.is_empty())?;
            // `id` is written from the key
            record.extra.remove("id");
            Some(PolledRecord { record, id })
        })
        .collect()
}

/// Custom record operations against one client
pub struct CustomHandler<'a, T> {
    client: &'a MaximizerClient<T>,
    application_id: String,
}

impl<'a, T: Transport> CustomHandler<'a, T> {
    /// Create a handler tagging records with [`DEFAULT_APPLICATION_ID`]
    pub fn new(client: &'a MaximizerClient<T>) -> Self {
        Self::with_application_id(client, DEFAULT_APPLICATION_ID)
    }

    /// Create a handler with a custom ApplicationId
    pub fn with_application_id(client: &'a MaximizerClient<T>, application_id: &str) -> Self {
        Self {
            client,
            application_id: application_id.to_string(),
        }
    }

    /// ApplicationId used for writes and read scoping
    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    /// Create a Custom record and return it as stored by the server
    #[instrument(level = "info", skip_all, fields(application_id = %self.application_id))]
    pub async fn create(&self, params: CreateCustomParams) -> Result<CustomRecord> {
        let request = build_create_request(&self.application_id, params)?;
        let result = self.client.send("Create", Payload::Json(request), None).await?;

        let record = result.record::<CustomRecord>(RESOURCE)?.ok_or_else(|| {
            MaxbridgeError::Application("Unable to create the Custom record.".to_string())
        })?;
        debug!(key = ?record.key, "created Custom record");
        Ok(record)
    }

    /// Search this connector's records by Name (may include `%` wildcards)
    #[instrument(level = "info", skip(self))]
    pub async fn search(&self, name: &str) -> Result<Vec<CustomRecord>> {
        if name.is_empty() {
            return Err(MaxbridgeError::Validation(
                "The name field is required.".to_string(),
            ));
        }

        let records = self.read(search_query(&self.application_id, name)).await?;
        debug!(count = records.len(), "search returned records");
        Ok(records)
    }

    /// Fetch this connector's records for the polling trigger
    #[instrument(level = "info", skip(self))]
    pub async fn poll(&self) -> Result<Vec<PolledRecord>> {
        let records = self.read(poll_query(&self.application_id)).await?;
        let polled = into_polled(records);
        debug!(count = polled.len(), "poll returned records");
        Ok(polled)
    }

    async fn read(&self, query: SearchQuery) -> Result<Vec<CustomRecord>> {
        let request = build_read_request(query)?;
        let result = self.client.send("Read", Payload::Json(request), None).await?;

        result
            .records::<CustomRecord>(RESOURCE)?
            .ok_or_else(|| MaxbridgeError::Application("The search failed.".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maximizer::http::{HttpResponse, MockTransport, OutboundRequest, RequestBody};
    use serde_json::json;

    fn sent_json(request: &OutboundRequest) -> Value {
        match &request.body {
            RequestBody::Text(text) => serde_json::from_str(text).unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    fn client_returning(
        body: Value,
        check: fn(&OutboundRequest) -> bool,
    ) -> MaximizerClient<MockTransport> {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .withf(move |request| check(request))
            .returning(move |_| Ok(HttpResponse::json(200, body.clone())));
        MaximizerClient::new(transport, "https://crm.example.com")
    }

    fn scope() -> Value {
        json!({"Fields": {
            "Key": 1, "Name": 1, "Description": 1, "Text1": 1,
            "Number1": 1, "Numeric1": 1, "DateTime1": 1
        }})
    }

    #[test]
    fn test_search_query_shape() {
        let request = build_read_request(search_query("maxbridge", "Acme%")).unwrap();
        assert_eq!(
            request,
            json!({"Custom": {
                "Criteria": {"SearchQuery": {"$AND": [
                    {"ApplicationId": {"$EQ": "maxbridge"}},
                    {"Name": {"$LIKE": "Acme%"}}
                ]}},
                "Scope": scope()
            }})
        );
    }

    #[test]
    fn test_poll_query_shape() {
        let request = build_read_request(poll_query("maxbridge")).unwrap();
        assert_eq!(
            request,
            json!({"Custom": {
                "Criteria": {"SearchQuery": {"ApplicationId": {"$EQ": "maxbridge"}}},
                "Scope": scope()
            }})
        );
    }

    #[test]
    fn test_create_request_with_required_fields() {
        let params = CreateCustomParams {
            name: Some("Acme".to_string()),
            description: Some(String::new()),
            ..Default::default()
        };
        let request = build_create_request("maxbridge", params).unwrap();
        assert_eq!(
            request,
            json!({"Custom": {"Data": {
                "Key": null,
                "ApplicationId": "maxbridge",
                "Name": "Acme"
            }}})
        );
    }

    #[test]
    fn test_create_request_with_all_fields() {
        let params = CreateCustomParams {
            name: Some("Acme".to_string()),
            description: Some("desc".to_string()),
            text1: Some("text".to_string()),
            number1: Some(12345),
            numeric1: Some(123.45),
            date_time1: Some("2024-05-01T10:00:00Z".to_string()),
        };
        let request = build_create_request("maxbridge", params).unwrap();
        assert_eq!(
            request,
            json!({"Custom": {"Data": {
                "Key": null,
                "ApplicationId": "maxbridge",
                "Name": "Acme",
                "Description": "desc",
                "Text1": "text",
                "Number1": 12345,
                "Numeric1": 123.45,
                "DateTime1": "2024-05-01T10:00:00Z"
            }}})
        );
    }

    #[tokio::test]
    async fn test_create_without_name_fails_before_sending() {
        let mut transport = MockTransport::new();
        transport.expect_execute().never();
        let client = MaximizerClient::new(transport, "url");
        let handler = CustomHandler::new(&client);

        for name in [None, Some(String::new())] {
            let params = CreateCustomParams {
                name,
                ..Default::default()
            };
            let err = handler.create(params).await.unwrap_err();
            assert!(matches!(err, MaxbridgeError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_search_without_name_fails_before_sending() {
        let mut transport = MockTransport::new();
        transport.expect_execute().never();
        let client = MaximizerClient::new(transport, "url");

        let err = CustomHandler::new(&client).search("").await.unwrap_err();
        assert_eq!(err.to_string(), "The name field is required.");
    }

    #[tokio::test]
    async fn test_create_returns_created_record() {
        let client = client_returning(
            json!({"Code": 0, "Custom": {"Data": {
                "Key": "Q3VzdG9tCTEyMzQ=",
                "ApplicationId": "maxbridge",
                "Name": "Acme"
            }}}),
            |request| {
                request.url.ends_with("/MaximizerWebData/Data.svc/json/Create")
                    && sent_json(request)["Custom"]["Data"]["Name"] == "Acme"
            },
        );
        let params = CreateCustomParams {
            name: Some("Acme".to_string()),
            ..Default::default()
        };

        let record = CustomHandler::with_application_id(&client, "maxbridge")
            .create(params)
            .await
            .unwrap();
        assert_eq!(record.key.as_deref(), Some("Q3VzdG9tCTEyMzQ="));
        assert_eq!(record.name.as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn test_create_without_payload_fails() {
        let client = client_returning(json!({"Code": 0}), |_| true);
        let params = CreateCustomParams {
            name: Some("Acme".to_string()),
            ..Default::default()
        };

        let err = CustomHandler::new(&client).create(params).await.unwrap_err();
        assert_eq!(err.to_string(), "Unable to create the Custom record.");
    }

    #[tokio::test]
    async fn test_search_returns_records() {
        let client = client_returning(
            json!({"Code": 0, "Custom": {"Data": [
                {"Key": "k1", "Name": "Acme One", "Number1": 3},
                {"Key": "k2", "Name": "Acme Two", "Numeric1": 1.5}
            ]}}),
            |request| {
                request.url.ends_with("/Read")
                    && sent_json(request)["Custom"]["Criteria"]["SearchQuery"]["$AND"][1]["Name"]
                        ["$LIKE"]
                        == "Acme%"
            },
        );

        let records = CustomHandler::new(&client).search("Acme%").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].number1, Some(3));
        assert_eq!(records[1].numeric1, Some(1.5));
    }

    #[tokio::test]
    async fn test_search_with_empty_results() {
        let client = client_returning(json!({"Code": 0, "Custom": {"Data": []}}), |_| true);
        let records = CustomHandler::new(&client).search("Nobody").await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_search_without_payload_fails() {
        let client = client_returning(json!({"Code": 0}), |_| true);
        let err = CustomHandler::new(&client).search("Acme").await.unwrap_err();
        assert_eq!(err.to_string(), "The search failed.");
    }

    #[tokio::test]
    async fn test_poll_drops_unkeyed_records_and_sets_id() {
        let client = client_returning(
            json!({"Code": 0, "Custom": {"Data": [
                {"Key": "k1", "Name": "one"},
                {"Key": null, "Name": "two"},
                {"Key": "k2", "Name": "three"}
            ]}}),
            |request| {
                sent_json(request)["Custom"]["Criteria"]["SearchQuery"]
                    == json!({"ApplicationId": {"$EQ": DEFAULT_APPLICATION_ID}})
            },
        );

        let polled = CustomHandler::new(&client).poll().await.unwrap();
        let ids: Vec<&str> = polled.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["k1", "k2"]);
        for item in &polled {
            assert_eq!(item.record.key.as_deref(), Some(item.id.as_str()));
        }
    }

    #[tokio::test]
    async fn test_poll_without_payload_fails() {
        let client = client_returning(json!({"Code": 0, "Custom": {"Data": null}}), |_| true);
        let err = CustomHandler::new(&client).poll().await.unwrap_err();
        assert_eq!(err.to_string(), "The search failed.");
    }

    #[test]
    fn test_polled_record_serializes_id_next_to_fields() {
        let polled = into_polled(vec![CustomRecord {
            key: Some("k1".to_string()),
            name: Some("one".to_string()),
            ..Default::default()
        }]);
        assert_eq!(
            serde_json::to_value(&polled[0]).unwrap(),
            json!({"Key": "k1", "Name": "one", "id": "k1"})
        );
    }

    #[test]
    fn test_polled_record_replaces_server_id() {
        let record: CustomRecord =
            serde_json::from_value(json!({"Key": "k1", "id": "server-7", "Text2": "x"})).unwrap();
        let polled = into_polled(vec![record]);

        let text = serde_json::to_string(&polled[0]).unwrap();
        assert_eq!(text.matches("\"id\"").count(), 1);
        assert_eq!(
            serde_json::to_value(&polled[0]).unwrap(),
            json!({"Key": "k1", "Text2": "x", "id": "k1"})
        );
    }

    #[test]
    fn test_unknown_fields_are_preserved() {
        let record: CustomRecord =
            serde_json::from_value(json!({"Key": "k1", "Text2": "extra"})).unwrap();
        assert_eq!(record.extra.get("Text2"), Some(&json!("extra")));
    }
}
