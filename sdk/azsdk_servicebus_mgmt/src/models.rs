//! Resource identifiers and shared models for the Service Bus management plane.

use azsdk_core::client::{AzureClient, AzureClientBuilder};
use azsdk_core::error::{AzureError, AzureResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Service Bus resource provider API version.
pub const SERVICEBUS_API_VERSION: &str = "2021-11-01";

/// Azure Resource Manager endpoint.
pub const MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// Token scope for Azure Resource Manager.
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Name of the namespace-level rule every namespace is created with.
pub const ROOT_MANAGE_SHARED_ACCESS_KEY: &str = "RootManageSharedAccessKey";

const PROVIDER: &str = "Microsoft.ServiceBus/namespaces";

/// A client builder for Azure Resource Manager.
///
/// The endpoint defaults to the public cloud; override it with
/// [`AzureClientBuilder::endpoint`] for sovereign clouds.
pub fn management_client_builder() -> AzureClientBuilder {
    AzureClient::builder()
        .endpoint(MANAGEMENT_ENDPOINT)
        .scope(MANAGEMENT_SCOPE)
        .api_version(SERVICEBUS_API_VERSION)
}

pub(crate) fn validate_name(kind: &str, name: &str) -> AzureResult<()> {
    if name.trim().is_empty() {
        return Err(AzureError::Builder(format!("{} name is required", kind)));
    }
    if name.contains('/') || name.contains('?') || name.contains('#') {
        return Err(AzureError::Builder(format!(
            "{} name '{}' contains a reserved character",
            kind, name
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifies a Service Bus namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub namespace: String,
}

impl NamespaceId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        namespace: impl Into<String>,
    ) -> AzureResult<Self> {
        let id = Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            namespace: namespace.into(),
        };
        validate_name("subscription", &id.subscription_id)?;
        validate_name("resource group", &id.resource_group)?;
        validate_name("namespace", &id.namespace)?;
        Ok(id)
    }

    /// Parse an ARM resource ID such as
    /// `/subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.ServiceBus/namespaces/{ns}`.
    ///
    /// IDs of child resources (queues, topics, ...) resolve to their namespace.
    pub fn from_resource_id(resource_id: &str) -> AzureResult<Self> {
        let invalid = || AzureError::Builder(format!("'{}' is not a Service Bus namespace ID", resource_id));

        let segments: Vec<&str> = resource_id.trim_matches('/').split('/').collect();
        let value_after = |key: &str| {
            segments
                .windows(2)
                .find(|w| w[0].eq_ignore_ascii_case(key))
                .map(|w| w[1])
        };

        let provider_ok = segments
            .windows(2)
            .any(|w| w[0].eq_ignore_ascii_case("Microsoft.ServiceBus") && w[1].eq_ignore_ascii_case("namespaces"));
        if !provider_ok {
            return Err(invalid());
        }

        Self::new(
            value_after("subscriptions").ok_or_else(invalid)?,
            value_after("resourceGroups").ok_or_else(invalid)?,
            value_after("namespaces").ok_or_else(invalid)?,
        )
    }

    /// The namespace's ARM path.
    pub fn path(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
            self.subscription_id, self.resource_group, PROVIDER, self.namespace
        )
    }

    /// Path of a child collection (`queues`, `topics`, ...) or one of its members.
    pub(crate) fn child_path(&self, collection: &str, name: Option<&str>) -> AzureResult<String> {
        let mut path = format!("{}/{}", self.path(), collection);
        if let Some(name) = name {
            validate_name(collection.trim_end_matches('s'), name)?;
            path.push('/');
            path.push_str(name);
        }
        Ok(path)
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// An ARM child resource (queue, topic, subscription).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArmResource<P> {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
    pub properties: P,
}

#[derive(Serialize)]
pub(crate) struct PropertiesBody<'a, P> {
    pub properties: &'a P,
}

/// Messaging entity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityStatus {
    Active,
    Disabled,
    SendDisabled,
    ReceiveDisabled,
    Creating,
    Deleting,
    Renaming,
    Restoring,
    #[serde(other)]
    Unknown,
}

/// Message counts of a queue, topic, or subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCountDetails {
    #[serde(default)]
    pub active_message_count: u64,
    #[serde(default)]
    pub dead_letter_message_count: u64,
    #[serde(default)]
    pub scheduled_message_count: u64,
    #[serde(default)]
    pub transfer_message_count: u64,
    #[serde(default)]
    pub transfer_dead_letter_message_count: u64,
}

// ---------------------------------------------------------------------------
// ISO-8601 durations
// ---------------------------------------------------------------------------

/// Format a duration the way ARM expects, e.g. `PT1M` or `P14DT12H`.
pub fn to_iso8601_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let millis = duration.subsec_millis();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut out = String::from("P");
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    if hours > 0 || minutes > 0 || seconds > 0 || millis > 0 || days == 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if millis > 0 {
            out.push_str(&format!("{}.{:03}S", seconds, millis));
        } else if seconds > 0 || (hours == 0 && minutes == 0) {
            out.push_str(&format!("{}S", seconds));
        }
    }
    out
}

/// Parse an ISO-8601 duration of days and time (`P[nD][T[nH][nM][n[.f]S]]`).
///
/// Years, months, and weeks are not used by Service Bus and are rejected.
pub fn parse_iso8601_duration(value: &str) -> Option<Duration> {
    let rest = value.strip_prefix('P')?;
    let (date, time) = match rest.split_once('T') {
        Some((date, time)) if !time.is_empty() => (date, Some(time)),
        Some(_) => return None,
        None => (rest, None),
    };

    let mut secs = 0f64;
    let mut seen = false;
    let mut number = String::new();

    for c in date.chars() {
        match c {
            '0'..='9' | '.' => number.push(c),
            'D' => {
                secs += number.parse::<f64>().ok()? * 86_400.0;
                number.clear();
                seen = true;
            }
            _ => return None,
        }
    }
    if !number.is_empty() {
        return None;
    }

    for c in time.unwrap_or_default().chars() {
        let unit = match c {
            '0'..='9' | '.' => {
                number.push(c);
                continue;
            }
            'H' => 3_600.0,
            'M' => 60.0,
            'S' => 1.0,
            _ => return None,
        };
        secs += number.parse::<f64>().ok()? * unit;
        number.clear();
        seen = true;
    }

    (seen && number.is_empty()).then(|| Duration::from_secs_f64(secs))
}
