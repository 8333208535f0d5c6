//! Shared constants and client construction for Key Vault administration.

use azsdk_core::challenge::BearerChallengePolicy;
use azsdk_core::client::{AzureClient, AzureClientBuilder};
use serde::{Deserialize, Serialize};

/// Key Vault data-plane API version.
pub const KEYVAULT_API_VERSION: &str = "7.5";

/// A client builder for a Managed HSM or vault URL.
///
/// Key Vault announces the token audience and tenant in a
/// `WWW-Authenticate` challenge, so the client authenticates through a
/// [`BearerChallengePolicy`] instead of a fixed scope.
///
/// ```rust,no_run
/// use azsdk_core::auth::AzureCredential;
/// use azsdk_keyvault_admin::models::keyvault_client_builder;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = keyvault_client_builder("https://myhsm.managedhsm.azure.net")
///     .credential(AzureCredential::developer_tools()?)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub fn keyvault_client_builder(vault_url: impl Into<String>) -> AzureClientBuilder {
    AzureClient::builder()
        .endpoint(vault_url)
        .challenge_auth(BearerChallengePolicy::new())
        .api_version(KEYVAULT_API_VERSION)
}

/// Error detail carried by failed long-running operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyVaultErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
