//! Shared types for the Blob and File Share services.

use azsdk_core::client::{ApiVersionLocation, AzureClient, AzureClientBuilder};
use reqwest::header::HeaderMap;
use std::collections::BTreeMap;

/// Storage REST API version sent as `x-ms-version`.
pub const STORAGE_API_VERSION: &str = "2023-11-03";

/// Token scope for Entra ID authentication against Storage.
pub const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";

/// Prefix of user-defined metadata headers.
pub(crate) const META_PREFIX: &str = "x-ms-meta-";

/// A client builder preconfigured for a Storage account endpoint.
///
/// ```rust,no_run
/// use azsdk_core::auth::AzureCredential;
/// use azsdk_storage::models::storage_client_builder;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = storage_client_builder("https://myaccount.blob.core.windows.net")
///     .credential(AzureCredential::sas("sv=2022-11-02&ss=b&sig=..."))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub fn storage_client_builder(account_url: impl Into<String>) -> AzureClientBuilder {
    AzureClient::builder()
        .endpoint(account_url)
        .scope(STORAGE_SCOPE)
        .api_version(STORAGE_API_VERSION)
        .api_version_location(ApiVersionLocation::Header("x-ms-version".into()))
}

/// Read a header as a string.
pub(crate) fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Read a header as a number.
pub(crate) fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Collect `x-ms-meta-*` headers into a map keyed by the bare metadata name.
pub(crate) fn metadata_from_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let key = name.as_str().strip_prefix(META_PREFIX)?;
            Some((key.to_string(), value.to_str().ok()?.to_string()))
        })
        .collect()
}
