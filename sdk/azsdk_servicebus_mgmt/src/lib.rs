//! # azsdk_servicebus_mgmt
//!
//! Azure Resource Manager client for Service Bus namespaces and the
//! messaging entities inside them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use azsdk_core::auth::AzureCredential;
//! use azsdk_servicebus_mgmt::models::{management_client_builder, NamespaceId};
//! use azsdk_servicebus_mgmt::queue;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = management_client_builder()
//!         .credential(AzureCredential::azure_cli()?)
//!         .build()?;
//!
//!     let ns = NamespaceId::new("00000000-0000-0000-0000-000000000000", "rg-messaging", "contoso-bus")?;
//!     for q in queue::list(&client, &ns).await? {
//!         let counts = q.properties.count_details.unwrap_or_default();
//!         println!("{:?}: {} active, {} dead-lettered", q.name, counts.active_message_count, counts.dead_letter_message_count);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`namespace`] - Namespaces and their access keys
//! - [`queue`] - Queues
//! - [`topic`] - Topics
//! - [`subscription`] - Topic subscriptions
//! - [`models`] - Resource IDs, entity status, ISO-8601 durations

pub mod models;
pub mod namespace;
pub mod queue;
pub mod subscription;
pub mod topic;

/// Test utilities shared across modules.
#[cfg(test)]
pub(crate) mod test_utils {
    use crate::models::{NamespaceId, SERVICEBUS_API_VERSION};
    use azsdk_core::client::AzureClient;
    use azsdk_core::test_support::mock_client;
    use wiremock::MockServer;

    /// Subscription ID used in test resource paths.
    pub const TEST_SUBSCRIPTION: &str = "11111111-2222-3333-4444-555555555555";

    /// Create a management client connected to a mock server.
    pub fn setup_mock_client(server: &MockServer) -> AzureClient {
        mock_client(server, SERVICEBUS_API_VERSION)
    }

    pub fn namespace_id(name: &str) -> NamespaceId {
        NamespaceId::new(TEST_SUBSCRIPTION, "rg-1", name).expect("valid namespace id")
    }

    /// A namespace as ARM returns it.
    pub fn namespace_json(name: &str) -> serde_json::Value {
        serde_json::json!({
            "id": namespace_id(name).path(),
            "name": name,
            "type": "Microsoft.ServiceBus/Namespaces",
            "location": "West Europe",
            "sku": {"name": "Standard", "tier": "Standard"},
            "tags": {},
            "properties": {
                "provisioningState": "Succeeded",
                "status": "Active",
                "serviceBusEndpoint": format!("https://{}.servicebus.windows.net:443/", name)
            }
        })
    }
}
