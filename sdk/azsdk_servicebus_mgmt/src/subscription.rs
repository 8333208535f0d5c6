//! Subscriptions of a Service Bus topic.

use azsdk_core::client::AzureClient;
use azsdk_core::error::{AzureError, AzureResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::{
    to_iso8601_duration, validate_name, ArmResource, EntityStatus, MessageCountDetails, NamespaceId,
    PropertiesBody,
};
use crate::queue::{validate_auto_delete, validate_lock_duration, validate_positive};
use crate::topic::TOPICS;

/// Properties of a topic subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_session: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_message_time_to_live: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_lettering_on_filter_evaluation_exceptions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_lettering_on_message_expiration: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_detection_history_time_window: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delivery_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EntityStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_batched_operations: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_delete_on_idle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_dead_lettered_messages_to: Option<String>,

    // reported
    #[serde(default, skip_serializing)]
    pub message_count: Option<u64>,
    #[serde(default, skip_serializing)]
    pub count_details: Option<MessageCountDetails>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub accessed_at: Option<String>,
}

/// A topic subscription.
pub type ServiceBusSubscription = ArmResource<SubscriptionProperties>;

/// A request to create or update a subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionCreateRequest {
    pub properties: SubscriptionProperties,
}

impl SubscriptionCreateRequest {
    pub fn builder() -> SubscriptionCreateRequestBuilder {
        SubscriptionCreateRequestBuilder::default()
    }
}

/// Builder for [`SubscriptionCreateRequest`].
#[derive(Debug, Default)]
pub struct SubscriptionCreateRequestBuilder {
    lock_duration: Option<Duration>,
    default_message_time_to_live: Option<Duration>,
    duplicate_detection_history_time_window: Option<Duration>,
    auto_delete_on_idle: Option<Duration>,
    properties: SubscriptionProperties,
}

impl SubscriptionCreateRequestBuilder {
    pub fn lock_duration(mut self, duration: Duration) -> Self {
        self.lock_duration = Some(duration);
        self
    }

    pub fn requires_session(mut self, enabled: bool) -> Self {
        self.properties.requires_session = Some(enabled);
        self
    }

    pub fn default_message_time_to_live(mut self, ttl: Duration) -> Self {
        self.default_message_time_to_live = Some(ttl);
        self
    }

    pub fn dead_lettering_on_filter_evaluation_exceptions(mut self, enabled: bool) -> Self {
        self.properties.dead_lettering_on_filter_evaluation_exceptions = Some(enabled);
        self
    }

    pub fn dead_lettering_on_message_expiration(mut self, enabled: bool) -> Self {
        self.properties.dead_lettering_on_message_expiration = Some(enabled);
        self
    }

    pub fn duplicate_detection_history_time_window(mut self, window: Duration) -> Self {
        self.duplicate_detection_history_time_window = Some(window);
        self
    }

    pub fn max_delivery_count(mut self, count: u32) -> Self {
        self.properties.max_delivery_count = Some(count);
        self
    }

    pub fn status(mut self, status: EntityStatus) -> Self {
        self.properties.status = Some(status);
        self
    }

    pub fn enable_batched_operations(mut self, enabled: bool) -> Self {
        self.properties.enable_batched_operations = Some(enabled);
        self
    }

    pub fn auto_delete_on_idle(mut self, idle: Duration) -> Self {
        self.auto_delete_on_idle = Some(idle);
        self
    }

    pub fn forward_to(mut self, entity: impl Into<String>) -> Self {
        self.properties.forward_to = Some(entity.into());
        self
    }

    pub fn forward_dead_lettered_messages_to(mut self, entity: impl Into<String>) -> Self {
        self.properties.forward_dead_lettered_messages_to = Some(entity.into());
        self
    }

    pub fn build(self) -> AzureResult<SubscriptionCreateRequest> {
        let mut properties = self.properties;

        if let Some(lock) = self.lock_duration {
            validate_lock_duration(lock)?;
            properties.lock_duration = Some(to_iso8601_duration(lock));
        }
        if properties.max_delivery_count == Some(0) {
            return Err(AzureError::Builder("max_delivery_count must be at least 1".into()));
        }
        if let Some(ttl) = self.default_message_time_to_live {
            validate_positive("default_message_time_to_live", ttl)?;
            properties.default_message_time_to_live = Some(to_iso8601_duration(ttl));
        }
        if let Some(window) = self.duplicate_detection_history_time_window {
            validate_positive("duplicate_detection_history_time_window", window)?;
            properties.duplicate_detection_history_time_window = Some(to_iso8601_duration(window));
        }
        if let Some(idle) = self.auto_delete_on_idle {
            validate_auto_delete(idle)?;
            properties.auto_delete_on_idle = Some(to_iso8601_duration(idle));
        }

        Ok(SubscriptionCreateRequest { properties })
    }
}

fn subscriptions_path(namespace: &NamespaceId, topic: &str, name: Option<&str>) -> AzureResult<String> {
    let mut path = format!("{}/subscriptions", namespace.child_path(TOPICS, Some(topic))?);
    if let Some(name) = name {
        validate_name("subscription", name)?;
        path.push('/');
        path.push_str(name);
    }
    Ok(path)
}

/// List the subscriptions of a topic.
#[tracing::instrument(name = "azsdk::servicebus::subscription::list", skip(client), fields(namespace = %namespace.namespace))]
pub async fn list(
    client: &AzureClient,
    namespace: &NamespaceId,
    topic: &str,
) -> AzureResult<Vec<ServiceBusSubscription>> {
    client.list_all(&subscriptions_path(namespace, topic, None)?).await
}

/// Get a subscription.
#[tracing::instrument(name = "azsdk::servicebus::subscription::get", skip(client), fields(namespace = %namespace.namespace))]
pub async fn get(
    client: &AzureClient,
    namespace: &NamespaceId,
    topic: &str,
    name: &str,
) -> AzureResult<ServiceBusSubscription> {
    let response = client.get(&subscriptions_path(namespace, topic, Some(name))?).await?;
    Ok(response.json().await?)
}

/// Create a subscription, or update an existing one.
#[tracing::instrument(
    name = "azsdk::servicebus::subscription::create_or_update",
    skip(client, request),
    fields(namespace = %namespace.namespace)
)]
pub async fn create_or_update(
    client: &AzureClient,
    namespace: &NamespaceId,
    topic: &str,
    name: &str,
    request: &SubscriptionCreateRequest,
) -> AzureResult<ServiceBusSubscription> {
    let body = PropertiesBody {
        properties: &request.properties,
    };
    let response = client
        .put_json(&subscriptions_path(namespace, topic, Some(name))?, &body)
        .await?;
    Ok(response.json().await?)
}

/// Delete a subscription.
#[tracing::instrument(name = "azsdk::servicebus::subscription::delete", skip(client), fields(namespace = %namespace.namespace))]
pub async fn delete(client: &AzureClient, namespace: &NamespaceId, topic: &str, name: &str) -> AzureResult<()> {
    client.delete(&subscriptions_path(namespace, topic, Some(name))?).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{namespace_id, setup_mock_client};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn subscription_path_nests_under_topic() {
        let ns = namespace_id("ns-1");
        assert_eq!(
            subscriptions_path(&ns, "events", Some("audit")).unwrap(),
            format!("{}/topics/events/subscriptions/audit", ns.path())
        );
        assert!(subscriptions_path(&ns, "", Some("audit")).is_err());
        assert!(subscriptions_path(&ns, "events", Some("a/b")).is_err());
    }

    #[tokio::test]
    async fn create_with_forwarding_and_dead_lettering() {
        let server = MockServer::start().await;
        let ns = namespace_id("ns-1");

        Mock::given(method("PUT"))
            .and(path(format!("{}/topics/events/subscriptions/audit", ns.path())))
            .and(body_json(json!({
                "properties": {
                    "lockDuration": "PT30S",
                    "maxDeliveryCount": 10,
                    "deadLetteringOnFilterEvaluationExceptions": true,
                    "forwardTo": "audit-queue",
                    "status": "Active"
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "audit",
                "properties": {"lockDuration": "PT30S", "forwardTo": "audit-queue", "messageCount": 0}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let request = SubscriptionCreateRequest::builder()
            .lock_duration(Duration::from_secs(30))
            .max_delivery_count(10)
            .dead_lettering_on_filter_evaluation_exceptions(true)
            .forward_to("audit-queue")
            .status(EntityStatus::Active)
            .build()
            .unwrap();

        let sub = create_or_update(&client, &ns, "events", "audit", &request)
            .await
            .expect("should create");

        assert_eq!(sub.properties.forward_to.as_deref(), Some("audit-queue"));
        assert_eq!(sub.properties.message_count, Some(0));
    }

    #[tokio::test]
    async fn list_pages_and_delete() {
        let server = MockServer::start().await;
        let ns = namespace_id("ns-1");
        let base = format!("{}/topics/events/subscriptions", ns.path());

        Mock::given(method("GET"))
            .and(path(base.as_str()))
            .and(query_param("$skip", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"name": "b", "properties": {}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(base.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"name": "a", "properties": {}}],
                "nextLink": format!("{}{}?api-version=2021-11-01&$skip=1", server.uri(), base)
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{}/a", base)))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let subs = list(&client, &ns, "events").await.expect("should list");
        let names: Vec<_> = subs.iter().filter_map(|s| s.name.as_deref()).collect();
        assert_eq!(names, ["a", "b"]);

        delete(&client, &ns, "events", "a").await.expect("should delete");
    }

    #[tokio::test]
    async fn missing_topic_is_not_found() {
        let server = MockServer::start().await;
        let ns = namespace_id("ns-1");

        Mock::given(method("GET"))
            .and(path(format!("{}/topics/nope/subscriptions/x", ns.path())))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": "NotFound", "message": "Entity 'ns-1:Topic:nope' was not found."}
            })))
            .mount(&server)
            .await;

        let client = setup_mock_client(&server);
        let err = get(&client, &ns, "nope", "x").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
