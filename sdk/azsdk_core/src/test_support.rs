//! Record/playback helpers for tests in sibling crates.
//!
//! A [`Recording`] is a list of captured HTTP exchanges. Mounting it on a
//! [`MockServer`] replays each exchange once, in order, so a test can drive a
//! client through a multi-step conversation without a live service.
//!
//! ```json
//! {
//!   "entries": [
//!     {"method": "PUT", "path": "/share1", "query": {"restype": "share"}, "status": 201},
//!     {"method": "HEAD", "path": "/share1", "status": 200,
//!      "response_headers": {"x-ms-share-quota": "10"}}
//!   ]
//! }
//! ```

use crate::auth::AzureCredential;
use crate::client::{AzureClient, RetryPolicy};
use crate::error::AzureResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Bearer token used by [`mock_client`].
pub const TEST_ACCESS_TOKEN: &str = "test-access-token";

/// One captured request/response pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedExchange {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    pub status: u16,
    #[serde(default)]
    pub response_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub response_body: Option<serde_json::Value>,
}

/// An ordered set of exchanges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recording {
    pub entries: Vec<RecordedExchange>,
}

impl Recording {
    /// Parse a recording from JSON.
    pub fn from_json(json: &str) -> AzureResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Mount every exchange on `server`. Each one answers a single request.
    pub async fn mount(&self, server: &MockServer) {
        for entry in &self.entries {
            let mut template = ResponseTemplate::new(entry.status);
            for (name, value) in &entry.response_headers {
                template = template.insert_header(name.as_str(), value.as_str());
            }
            template = match &entry.response_body {
                Some(serde_json::Value::String(text)) => template.set_body_string(text.clone()),
                Some(json) => template.set_body_json(json),
                None => template,
            };

            let mut mock = Mock::given(method(entry.method.as_str())).and(path(entry.path.as_str()));
            for (key, value) in &entry.query {
                mock = mock.and(query_param(key.as_str(), value.as_str()));
            }

            mock.respond_with(template)
                .up_to_n_times(1)
                .mount(server)
                .await;
        }
    }
}

/// A client pointed at `server` with a static bearer token and fast retries.
pub fn mock_client(server: &MockServer, api_version: &str) -> AzureClient {
    AzureClient::builder()
        .endpoint(server.uri())
        .credential(AzureCredential::access_token(TEST_ACCESS_TOKEN))
        .api_version(api_version)
        .retry_policy(RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(50),
        })
        .build()
        .expect("mock client should build")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_replays_in_order() {
        let server = MockServer::start().await;
        let recording = Recording::from_json(
            r#"{"entries": [
                {"method": "GET", "path": "/state", "status": 200, "response_body": {"step": 1}},
                {"method": "GET", "path": "/state", "status": 200, "response_body": {"step": 2}}
            ]}"#,
        )
        .expect("valid recording");
        recording.mount(&server).await;

        let client = mock_client(&server, "2021-11-01");
        let first: serde_json::Value = client.get("/state").await.unwrap().json().await.unwrap();
        let second: serde_json::Value = client.get("/state").await.unwrap().json().await.unwrap();

        assert_eq!(first["step"], 1);
        assert_eq!(second["step"], 2);
    }
}
