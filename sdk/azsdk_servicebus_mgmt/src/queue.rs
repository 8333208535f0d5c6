//! Queues in a Service Bus namespace.
//!
//! ## Example
//!
//! ```rust,no_run
//! use azsdk_servicebus_mgmt::models::NamespaceId;
//! use azsdk_servicebus_mgmt::queue::{self, QueueCreateRequest};
//! use std::time::Duration;
//! # use azsdk_core::client::AzureClient;
//!
//! # async fn example(client: &AzureClient) -> azsdk_core::AzureResult<()> {
//! let ns = NamespaceId::new("00000000-0000-0000-0000-000000000000", "rg-messaging", "contoso-bus")?;
//! let request = QueueCreateRequest::builder()
//!     .lock_duration(Duration::from_secs(60))
//!     .max_delivery_count(5)
//!     .requires_session(true)
//!     .dead_lettering_on_message_expiration(true)
//!     .build()?;
//!
//! let created = queue::create_or_update(client, &ns, "orders", &request).await?;
//! println!("{:?}", created.properties.status);
//! # Ok(())
//! # }
//! ```

use azsdk_core::client::AzureClient;
use azsdk_core::error::{AzureError, AzureResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::{
    to_iso8601_duration, validate_name, ArmResource, EntityStatus, MessageCountDetails, NamespaceId,
    PropertiesBody,
};

/// Longest message lock the service allows.
pub const MAX_LOCK_DURATION: Duration = Duration::from_secs(5 * 60);

/// Queue and topic size limits in megabytes.
pub const MAX_SIZE_RANGE_MB: std::ops::RangeInclusive<u32> = 1024..=81920;

const QUEUES: &str = "queues";

/// Properties of a queue.
///
/// Durations are ISO-8601 strings as the service reports them; use
/// [`parse_iso8601_duration`](crate::models::parse_iso8601_duration) to read
/// them. Fields under "reported" are ignored on create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_in_megabytes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_message_size_in_kilobytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_duplicate_detection: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_session: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_message_time_to_live: Option<String>,
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
    pub enable_partitioning: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_express: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_dead_lettered_messages_to: Option<String>,

    // reported
    #[serde(default, skip_serializing)]
    pub message_count: Option<u64>,
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

/// A queue.
pub type ServiceBusQueue = ArmResource<QueueProperties>;

/// A request to create or update a queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueCreateRequest {
    pub properties: QueueProperties,
}

impl QueueCreateRequest {
    pub fn builder() -> QueueCreateRequestBuilder {
        QueueCreateRequestBuilder::default()
    }
}

/// Builder for [`QueueCreateRequest`].
#[derive(Debug, Default)]
pub struct QueueCreateRequestBuilder {
    lock_duration: Option<Duration>,
    default_message_time_to_live: Option<Duration>,
    duplicate_detection_history_time_window: Option<Duration>,
    auto_delete_on_idle: Option<Duration>,
    properties: QueueProperties,
}

impl QueueCreateRequestBuilder {
    /// How long a received message stays locked (at most 5 minutes).
    pub fn lock_duration(mut self, duration: Duration) -> Self {
        self.lock_duration = Some(duration);
        self
    }

    /// Queue size in megabytes (1024 to 81920).
    pub fn max_size_in_megabytes(mut self, size: u32) -> Self {
        self.properties.max_size_in_megabytes = Some(size);
        self
    }

    /// Largest accepted message (Premium only).
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

    pub fn requires_session(mut self, enabled: bool) -> Self {
        self.properties.requires_session = Some(enabled);
        self
    }

    pub fn default_message_time_to_live(mut self, ttl: Duration) -> Self {
        self.default_message_time_to_live = Some(ttl);
        self
    }

    pub fn dead_lettering_on_message_expiration(mut self, enabled: bool) -> Self {
        self.properties.dead_lettering_on_message_expiration = Some(enabled);
        self
    }

    /// Deliveries before a message is dead-lettered (at least 1).
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

    /// Delete the queue after it has been idle this long (at least 5 minutes).
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

    /// Auto-forward messages to another queue or topic in the namespace.
    pub fn forward_to(mut self, entity: impl Into<String>) -> Self {
        self.properties.forward_to = Some(entity.into());
        self
    }

    pub fn forward_dead_lettered_messages_to(mut self, entity: impl Into<String>) -> Self {
        self.properties.forward_dead_lettered_messages_to = Some(entity.into());
        self
    }

    pub fn build(self) -> AzureResult<QueueCreateRequest> {
        let mut properties = self.properties;

        if let Some(lock) = self.lock_duration {
            validate_lock_duration(lock)?;
            properties.lock_duration = Some(to_iso8601_duration(lock));
        }
        if let Some(size) = properties.max_size_in_megabytes {
            validate_max_size(size)?;
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

        Ok(QueueCreateRequest { properties })
    }
}

pub(crate) fn validate_lock_duration(lock: Duration) -> AzureResult<()> {
    if lock.is_zero() || lock > MAX_LOCK_DURATION {
        return Err(AzureError::Builder(
            "lock_duration must be between 1 second and 5 minutes".into(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_max_size(size: u32) -> AzureResult<()> {
    if !MAX_SIZE_RANGE_MB.contains(&size) {
        return Err(AzureError::Builder(format!(
            "max_size_in_megabytes must be between {} and {}, got {}",
            MAX_SIZE_RANGE_MB.start(),
            MAX_SIZE_RANGE_MB.end(),
            size
        )));
    }
    Ok(())
}

pub(crate) fn validate_positive(field: &str, duration: Duration) -> AzureResult<()> {
    if duration.is_zero() {
        return Err(AzureError::Builder(format!("{} must be greater than zero", field)));
    }
    Ok(())
}

pub(crate) fn validate_auto_delete(idle: Duration) -> AzureResult<()> {
    if idle < Duration::from_secs(5 * 60) {
        return Err(AzureError::Builder(
            "auto_delete_on_idle must be at least 5 minutes".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

/// List the queues in a namespace.
///
/// # Tracing
///
/// Emits a span named `azsdk::servicebus::queue::list` with field `namespace`.
#[tracing::instrument(name = "azsdk::servicebus::queue::list", skip(client), fields(namespace = %namespace.namespace))]
pub async fn list(client: &AzureClient, namespace: &NamespaceId) -> AzureResult<Vec<ServiceBusQueue>> {
    let queues: Vec<ServiceBusQueue> = client.list_all(&namespace.child_path(QUEUES, None)?).await?;
    tracing::debug!(count = queues.len(), "listed queues");
    Ok(queues)
}

/// Get a queue, including its message counts.
#[tracing::instrument(name = "azsdk::servicebus::queue::get", skip(client), fields(namespace = %namespace.namespace))]
pub async fn get(client: &AzureClient, namespace: &NamespaceId, name: &str) -> AzureResult<ServiceBusQueue> {
    let response = client.get(&namespace.child_path(QUEUES, Some(name))?).await?;
    Ok(response.json().await?)
}

/// Create a queue, or update an existing one.
#[tracing::instrument(
    name = "azsdk::servicebus::queue::create_or_update",
    skip(client, request),
    fields(namespace = %namespace.namespace)
)]
pub async fn create_or_update(
    client: &AzureClient,
    namespace: &NamespaceId,
    name: &str,
    request: &QueueCreateRequest,
) -> AzureResult<ServiceBusQueue> {
    validate_name("queue", name)?;
    let body = PropertiesBody {
        properties: &request.properties,
    };
    let response = client
        .put_json(&namespace.child_path(QUEUES, Some(name))?, &body)
        .await?;
    let queue: ServiceBusQueue = response.json().await?;
    tracing::debug!(status = ?queue.properties.status, "queue saved");
    Ok(queue)
}

/// Delete a queue.
#[tracing::instrument(name = "azsdk::servicebus::queue::delete", skip(client), fields(namespace = %namespace.namespace))]
pub async fn delete(client: &AzureClient, namespace: &NamespaceId, name: &str) -> AzureResult<()> {
    client.delete(&namespace.child_path(QUEUES, Some(name))?).await?;
    Ok(())
}
