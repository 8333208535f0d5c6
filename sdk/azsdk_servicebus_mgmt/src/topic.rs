//! Topics in a Service Bus namespace.

use azsdk_core::client::AzureClient;
use azsdk_core::error::AzureResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::{
    to_iso8601_duration, validate_name, ArmResource, EntityStatus, MessageCountDetails, NamespaceId,
    PropertiesBody,
};
use crate::queue::{validate_auto_delete, validate_max_size, validate_positive};

pub(crate) const TOPICS: &str = "topics";

/// Properties of a topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_message_time_to_live: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_in_megabytes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_message_size_in_kilobytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_duplicate_detection: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_detection_history_time_window: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_batched_operations: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EntityStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_ordering: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_delete_on_idle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_partitioning: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_express: Option<bool>,

    // reported
    #[serde(default, skip_serializing)]
    pub subscription_count: Option<u32>,
    #[serde(default, skip_serializing)]
    pub size_in_bytes: Option<u64>,
    #[serde(default, skip_serializing)]
    pub count_details: Option<MessageCountDetails>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub accessed_at: Option<String>,
}

/// A topic.
pub type ServiceBusTopic = ArmResource<TopicProperties>;

/// A request to create or update a topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicCreateRequest {
    pub properties: TopicProperties,
}

impl TopicCreateRequest {
    pub fn builder() -> TopicCreateRequestBuilder {
        TopicCreateRequestBuilder::default()
    }
}

/// Builder for [`TopicCreateRequest`].
#[derive(Debug, Default)]
pub struct TopicCreateRequestBuilder {
    default_message_time_to_live: Option<Duration>,
    duplicate_detection_history_time_window: Option<Duration>,
    auto_delete_on_idle: Option<Duration>,
    properties: TopicProperties,
}

impl TopicCreateRequestBuilder {
    pub fn default_message_time_to_live(mut self, ttl: Duration) -> Self {
        self.default_message_time_to_live = Some(ttl);
        self
    }

    /// Topic size in megabytes (1024 to 81920).
    pub fn max_size_in_megabytes(mut self, size: u32) -> Self {
        self.properties.max_size_in_megabytes = Some(size);
        self
    }

    pub fn max_message_size_in_kilobytes(mut self, size: u64) -> Self {
        self.properties.max_message_size_in_kilobytes = Some(size);
        self
    }

    pub fn requires_duplicate_detection(mut self, enabled: bool) -> Self {
        self.properties.requires_duplicate_detection = Some(enabled);
        self
    }

    pub fn duplicate_detection_history_time_window(mut self, window: Duration) -> Self {
        self.duplicate_detection_history_time_window = Some(window);
        self
    }

    pub fn enable_batched_operations(mut self, enabled: bool) -> Self {
        self.properties.enable_batched_operations = Some(enabled);
        self
    }

    pub fn status(mut self, status: EntityStatus) -> Self {
        self.properties.status = Some(status);
        self
    }

    pub fn support_ordering(mut self, enabled: bool) -> Self {
        self.properties.support_ordering = Some(enabled);
        self
    }

    pub fn auto_delete_on_idle(mut self, idle: Duration) -> Self {
        self.auto_delete_on_idle = Some(idle);
        self
    }

    pub fn enable_partitioning(mut self, enabled: bool) -> Self {
        self.properties.enable_partitioning = Some(enabled);
        self
    }

    pub fn enable_express(mut self, enabled: bool) -> Self {
        self.properties.enable_express = Some(enabled);
        self
    }

    pub fn build(self) -> AzureResult<TopicCreateRequest> {
        let mut properties = self.properties;

        if let Some(size) = properties.max_size_in_megabytes {
            validate_max_size(size)?;
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

        Ok(TopicCreateRequest { properties })
    }
}

/// List the topics in a namespace.
#[tracing::instrument(name = "azsdk::servicebus::topic::list", skip(client), fields(namespace = %namespace.namespace))]
pub async fn list(client: &AzureClient, namespace: &NamespaceId) -> AzureResult<Vec<ServiceBusTopic>> {
    client.list_all(&namespace.child_path(TOPICS, None)?).await
}

/// Get a topic.
#[tracing::instrument(name = "azsdk::servicebus::topic::get", skip(client), fields(namespace = %namespace.namespace))]
pub async fn get(client: &AzureClient, namespace: &NamespaceId, name: &str) -> AzureResult<ServiceBusTopic> {
    let response = client.get(&namespace.child_path(TOPICS, Some(name))?).await?;
    Ok(response.json().await?)
}

/// Create a topic, or update an existing one.
#[tracing::instrument(
    name = "azsdk::servicebus::topic::create_or_update",
    skip(client, request),
    fields(namespace = %namespace.namespace)
)]
pub async fn create_or_update(
    client: &AzureClient,
    namespace: &NamespaceId,
    name: &str,
    request: &TopicCreateRequest,
) -> AzureResult<ServiceBusTopic> {
    validate_name("topic", name)?;
    let body = PropertiesBody {
        properties: &request.properties,
    };
    let response = client
        .put_json(&namespace.child_path(TOPICS, Some(name))?, &body)
        .await?;
    Ok(response.json().await?)
}

/// Delete a topic and all of its subscriptions.
#[tracing::instrument(name = "azsdk::servicebus::topic::delete", skip(client), fields(namespace = %namespace.namespace))]
pub async fn delete(client: &AzureClient, namespace: &NamespaceId, name: &str) -> AzureResult<()> {
    client.delete(&namespace.child_path(TOPICS, Some(name))?).await?;
    tracing::debug!("topic deleted");
    Ok(())
}
