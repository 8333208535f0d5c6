//! Service Bus namespaces.
//!
//! ## Example
//!
//! ```rust,no_run
//! use azsdk_core::auth::AzureCredential;
//! use azsdk_servicebus_mgmt::models::{management_client_builder, NamespaceId};
//! use azsdk_servicebus_mgmt::namespace::{self, NamespaceCreateRequest, SkuName};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = management_client_builder()
//!     .credential(AzureCredential::developer_tools()?)
//!     .build()?;
//!
//! let id = NamespaceId::new("00000000-0000-0000-0000-000000000000", "rg-messaging", "contoso-bus")?;
//! let request = NamespaceCreateRequest::builder()
//!     .location("westeurope")
//!     .sku(SkuName::Standard)
//!     .tag("env", "dev")
//!     .build()?;
//! namespace::create_or_update(&client, &id, &request).await?;
//!
//! let keys = namespace::list_keys(&client, &id).await?;
//! println!("key name: {:?}", keys.key_name);
//! # Ok(())
//! # }
//! ```

use azsdk_core::client::AzureClient;
use azsdk_core::error::{AzureError, AzureResult};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::models::{validate_name, NamespaceId, ROOT_MANAGE_SHARED_ACCESS_KEY};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Pricing tier of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkuName {
    Basic,
    Standard,
    Premium,
}

/// SKU of a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBusSku {
    pub name: SkuName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<SkuName>,
    /// Messaging units (Premium only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

/// Properties of a namespace. Most are reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceProperties {
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<String>,
    #[serde(default, skip_serializing)]
    pub status: Option<String>,
    #[serde(default, skip_serializing)]
    pub service_bus_endpoint: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub metric_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_redundant: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_local_auth: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_tls_version: Option<String>,
}

/// A Service Bus namespace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceBusNamespace {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
    pub location: String,
    #[serde(default)]
    pub sku: Option<ServiceBusSku>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub properties: NamespaceProperties,
}

impl ServiceBusNamespace {
    /// The namespace's identifier, parsed from its resource ID.
    pub fn namespace_id(&self) -> AzureResult<NamespaceId> {
        NamespaceId::from_resource_id(&self.id)
    }
}

fn secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<SecretString>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// Keys and connection strings of an authorization rule.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKeys {
    #[serde(default)]
    pub key_name: Option<String>,
    #[serde(default, deserialize_with = "secret")]
    pub primary_connection_string: Option<SecretString>,
    #[serde(default, deserialize_with = "secret")]
    pub secondary_connection_string: Option<SecretString>,
    #[serde(default, deserialize_with = "secret")]
    pub primary_key: Option<SecretString>,
    #[serde(default, deserialize_with = "secret")]
    pub secondary_key: Option<SecretString>,
}

impl std::fmt::Debug for AccessKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessKeys")
            .field("key_name", &self.key_name)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A request to create or update a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceCreateRequest {
    pub location: String,
    pub sku: ServiceBusSku,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    pub properties: NamespaceProperties,
}

impl NamespaceCreateRequest {
    pub fn builder() -> NamespaceCreateRequestBuilder {
        NamespaceCreateRequestBuilder::default()
    }
}

/// Builder for [`NamespaceCreateRequest`].
#[derive(Debug, Default)]
pub struct NamespaceCreateRequestBuilder {
    location: Option<String>,
    sku: Option<SkuName>,
    capacity: Option<u32>,
    tags: BTreeMap<String, String>,
    properties: NamespaceProperties,
}

impl NamespaceCreateRequestBuilder {
    /// **Required.** Azure region, e.g. `"westeurope"`.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// **Required.** Pricing tier.
    pub fn sku(mut self, sku: SkuName) -> Self {
        self.sku = Some(sku);
        self
    }

    /// Messaging units for a Premium namespace (1, 2, 4, 8, or 16).
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn zone_redundant(mut self, enabled: bool) -> Self {
        self.properties.zone_redundant = Some(enabled);
        self
    }

    /// Disable SAS key authentication, leaving only Entra ID.
    pub fn disable_local_auth(mut self, disabled: bool) -> Self {
        self.properties.disable_local_auth = Some(disabled);
        self
    }

    pub fn minimum_tls_version(mut self, version: impl Into<String>) -> Self {
        self.properties.minimum_tls_version = Some(version.into());
        self
    }

    pub fn build(self) -> AzureResult<NamespaceCreateRequest> {
        let location = self
            .location
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| AzureError::Builder("location is required".into()))?;
        let sku = self
            .sku
            .ok_or_else(|| AzureError::Builder("sku is required".into()))?;

        if let Some(capacity) = self.capacity {
            if sku != SkuName::Premium {
                return Err(AzureError::Builder(
                    "capacity can only be set on Premium namespaces".into(),
                ));
            }
            if ![1, 2, 4, 8, 16].contains(&capacity) {
                return Err(AzureError::Builder(format!(
                    "capacity must be 1, 2, 4, 8, or 16, got {}",
                    capacity
                )));
            }
        }

        Ok(NamespaceCreateRequest {
            location,
            sku: ServiceBusSku {
                name: sku,
                tier: Some(sku),
                capacity: self.capacity,
            },
            tags: self.tags,
            properties: self.properties,
        })
    }
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

/// List every namespace in a subscription.
///
/// # Tracing
///
/// Emits a span named `azsdk::servicebus::namespace::list`.
#[tracing::instrument(name = "azsdk::servicebus::namespace::list", skip(client))]
pub async fn list(client: &AzureClient, subscription_id: &str) -> AzureResult<Vec<ServiceBusNamespace>> {
    validate_name("subscription", subscription_id)?;
    let path = format!(
        "/subscriptions/{}/providers/Microsoft.ServiceBus/namespaces",
        subscription_id
    );
    let namespaces: Vec<ServiceBusNamespace> = client.list_all(&path).await?;
    tracing::debug!(count = namespaces.len(), "listed namespaces");
    Ok(namespaces)
}

/// List the namespaces in a resource group.
#[tracing::instrument(name = "azsdk::servicebus::namespace::list_by_resource_group", skip(client))]
pub async fn list_by_resource_group(
    client: &AzureClient,
    subscription_id: &str,
    resource_group: &str,
) -> AzureResult<Vec<ServiceBusNamespace>> {
    validate_name("subscription", subscription_id)?;
    validate_name("resource group", resource_group)?;
    let path = format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ServiceBus/namespaces",
        subscription_id, resource_group
    );
    client.list_all(&path).await
}

/// Get a namespace.
#[tracing::instrument(name = "azsdk::servicebus::namespace::get", skip(client), fields(namespace = %id.namespace))]
pub async fn get(client: &AzureClient, id: &NamespaceId) -> AzureResult<ServiceBusNamespace> {
    let response = client.get(&id.path()).await?;
    Ok(response.json().await?)
}

/// Create or update a namespace.
///
/// Provisioning continues after this returns; the result's
/// `properties.provisioning_state` reports progress.
#[tracing::instrument(
    name = "azsdk::servicebus::namespace::create_or_update",
    skip(client, request),
    fields(namespace = %id.namespace)
)]
pub async fn create_or_update(
    client: &AzureClient,
    id: &NamespaceId,
    request: &NamespaceCreateRequest,
) -> AzureResult<ServiceBusNamespace> {
    let response = client.put_json(&id.path(), request).await?;
    let namespace: ServiceBusNamespace = response.json().await?;
    tracing::debug!(state = ?namespace.properties.provisioning_state, "namespace saved");
    Ok(namespace)
}

/// Delete a namespace and everything in it.
#[tracing::instrument(name = "azsdk::servicebus::namespace::delete", skip(client), fields(namespace = %id.namespace))]
pub async fn delete(client: &AzureClient, id: &NamespaceId) -> AzureResult<()> {
    client.delete(&id.path()).await?;
    Ok(())
}

/// Keys of the namespace's `RootManageSharedAccessKey` rule.
pub async fn list_keys(client: &AzureClient, id: &NamespaceId) -> AzureResult<AccessKeys> {
    list_rule_keys(client, id, ROOT_MANAGE_SHARED_ACCESS_KEY).await
}

/// Keys of a namespace-level authorization rule.
#[tracing::instrument(name = "azsdk::servicebus::namespace::list_keys", skip(client), fields(namespace = %id.namespace))]
pub async fn list_rule_keys(client: &AzureClient, id: &NamespaceId, rule: &str) -> AzureResult<AccessKeys> {
    let path = format!("{}/listKeys", id.child_path("authorizationRules", Some(rule))?);
    let response = client.post_json(&path, &serde_json::json!({})).await?;
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{namespace_id, namespace_json, setup_mock_client, TEST_SUBSCRIPTION};
    use azsdk_core::test_support::TEST_ACCESS_TOKEN;
    use secrecy::ExposeSecret;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn builder_requires_location_and_sku() {
        let err = NamespaceCreateRequest::builder()
            .sku(SkuName::Basic)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("location"));

        let err = NamespaceCreateRequest::builder()
            .location("westeurope")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("sku"));
    }

    #[test]
    fn capacity_is_premium_only() {
        assert!(NamespaceCreateRequest::builder()
            .location("westeurope")
            .sku(SkuName::Standard)
            .capacity(1)
            .build()
            .is_err());
        assert!(NamespaceCreateRequest::builder()
            .location("westeurope")
            .sku(SkuName::Premium)
            .capacity(3)
            .build()
            .is_err());
        assert!(NamespaceCreateRequest::builder()
            .location("westeurope")
            .sku(SkuName::Premium)
            .capacity(4)
            .build()
            .is_ok());
    }

    #[test]
    fn access_keys_debug_hides_secrets() {
        let keys: AccessKeys = serde_json::from_value(json!({
            "keyName": "RootManageSharedAccessKey",
            "primaryKey": "super-secret"
        }))
        .unwrap();

        assert!(!format!("{:?}", keys).contains("super-secret"));
        assert_eq!(keys.primary_key.unwrap().expose_secret(), "super-secret");
    }

    #[tokio::test]
    async fn list_follows_next_link() {
        let server = MockServer::start().await;
        let base = format!(
            "/subscriptions/{}/providers/Microsoft.ServiceBus/namespaces",
            TEST_SUBSCRIPTION
        );

        Mock::given(method("GET"))
            .and(path(base.as_str()))
            .and(query_param("$skiptoken", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [namespace_json("ns-2")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(base.as_str()))
            .and(query_param("api-version", "2021-11-01"))
            .and(header("authorization", format!("Bearer {}", TEST_ACCESS_TOKEN).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [namespace_json("ns-1")],
                "nextLink": format!("{}{}?api-version=2021-11-01&$skiptoken=abc", server.uri(), base)
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let namespaces = list(&client, TEST_SUBSCRIPTION).await.expect("should list");

        let names: Vec<_> = namespaces.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["ns-1", "ns-2"]);
        assert_eq!(namespaces[0].sku.as_ref().unwrap().name, SkuName::Standard);
        assert_eq!(namespaces[0].namespace_id().unwrap().namespace, "ns-1");
    }

    #[tokio::test]
    async fn create_sends_location_and_sku() {
        let server = MockServer::start().await;
        let id = namespace_id("ns-1");

        Mock::given(method("PUT"))
            .and(path(id.path()))
            .and(body_json(json!({
                "location": "westeurope",
                "sku": {"name": "Standard", "tier": "Standard"},
                "tags": {"env": "dev"},
                "properties": {"disableLocalAuth": true}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(namespace_json("ns-1")))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let request = NamespaceCreateRequest::builder()
            .location("westeurope")
            .sku(SkuName::Standard)
            .tag("env", "dev")
            .disable_local_auth(true)
            .build()
            .unwrap();

        let namespace = create_or_update(&client, &id, &request).await.expect("should create");
        assert_eq!(namespace.properties.provisioning_state.as_deref(), Some("Succeeded"));
    }

    #[tokio::test]
    async fn list_keys_uses_root_rule() {
        let server = MockServer::start().await;
        let id = namespace_id("ns-1");

        Mock::given(method("POST"))
            .and(path(format!(
                "{}/authorizationRules/RootManageSharedAccessKey/listKeys",
                id.path()
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keyName": "RootManageSharedAccessKey",
                "primaryConnectionString": "Endpoint=sb://ns-1.servicebus.windows.net/;SharedAccessKeyName=RootManageSharedAccessKey;SharedAccessKey=abc"
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let keys = list_keys(&client, &id).await.expect("should list keys");

        assert_eq!(keys.key_name.as_deref(), Some("RootManageSharedAccessKey"));
        assert!(keys
            .primary_connection_string
            .unwrap()
            .expose_secret()
            .starts_with("Endpoint=sb://ns-1"));
    }

    #[tokio::test]
    async fn get_missing_namespace() {
        let server = MockServer::start().await;
        let id = namespace_id("gone");

        Mock::given(method("GET"))
            .and(path(id.path()))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": "ResourceNotFound", "message": "The Resource 'Microsoft.ServiceBus/namespaces/gone' was not found."}
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(id.path()))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let err = get(&client, &id).await.unwrap_err();
        assert!(err.is_not_found());

        delete(&client, &id).await.expect("delete is idempotent on the service side");
    }

    #[tokio::test]
    async fn list_by_resource_group_path() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!(
                "/subscriptions/{}/resourceGroups/rg-1/providers/Microsoft.ServiceBus/namespaces",
                TEST_SUBSCRIPTION
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let namespaces = list_by_resource_group(&client, TEST_SUBSCRIPTION, "rg-1").await.unwrap();
        assert!(namespaces.is_empty());
    }
}
