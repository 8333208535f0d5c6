//! Azure File Share lifecycle.
//!
//! ## Example
//!
//! ```rust,no_run
//! use azsdk_core::auth::AzureCredential;
//! use azsdk_storage::models::storage_client_builder;
//! use azsdk_storage::share::{self, ShareAccessTier, ShareCreateOptions, ShareProtocol};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = storage_client_builder("https://myaccount.file.core.windows.net")
//!     .credential(AzureCredential::from_env()?)
//!     .build()?;
//!
//! let options = ShareCreateOptions::builder()
//!     .quota_gb(100)
//!     .access_tier(ShareAccessTier::Hot)
//!     .protocol(ShareProtocol::Smb)
//!     .metadata("owner", "data-team")
//!     .build()?;
//! share::create(&client, "reports", &options).await?;
//!
//! let props = share::get_properties(&client, "reports").await?;
//! println!("quota: {:?} GB", props.quota_gb);
//! # Ok(())
//! # }
//! ```

use azsdk_core::client::{AzureClient, AzureRequest};
use azsdk_core::error::{AzureError, AzureResult};
use reqwest::header::{ETAG, LAST_MODIFIED};
use reqwest::Method;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

use crate::models::{header_str, header_u64, metadata_from_headers, META_PREFIX};

/// Smallest share quota, in GiB.
pub const MIN_SHARE_QUOTA_GB: u32 = 1;

/// Largest share quota, in GiB.
pub const MAX_SHARE_QUOTA_GB: u32 = 102_400;

const SHARE_QUOTA: &str = "x-ms-share-quota";
const ACCESS_TIER: &str = "x-ms-access-tier";
const ENABLED_PROTOCOLS: &str = "x-ms-enabled-protocols";
const ROOT_SQUASH: &str = "x-ms-root-squash";

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Storage tier of a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareAccessTier {
    TransactionOptimized,
    Hot,
    Cool,
    Premium,
}

impl ShareAccessTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransactionOptimized => "TransactionOptimized",
            Self::Hot => "Hot",
            Self::Cool => "Cool",
            Self::Premium => "Premium",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "TransactionOptimized" => Some(Self::TransactionOptimized),
            "Hot" => Some(Self::Hot),
            "Cool" => Some(Self::Cool),
            "Premium" => Some(Self::Premium),
            _ => None,
        }
    }
}

impl fmt::Display for ShareAccessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File protocol enabled on a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareProtocol {
    Smb,
    Nfs,
}

impl ShareProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Smb => "SMB",
            Self::Nfs => "NFS",
        }
    }
}

/// Root squash behavior for NFS shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareRootSquash {
    NoRootSquash,
    RootSquash,
    AllSquash,
}

impl ShareRootSquash {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRootSquash => "NoRootSquash",
            Self::RootSquash => "RootSquash",
            Self::AllSquash => "AllSquash",
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Validated options for [`create`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareCreateOptions {
    pub quota_gb: Option<u32>,
    pub access_tier: Option<ShareAccessTier>,
    pub protocol: Option<ShareProtocol>,
    pub root_squash: Option<ShareRootSquash>,
    pub metadata: BTreeMap<String, String>,
}

impl ShareCreateOptions {
    pub fn builder() -> ShareCreateOptionsBuilder {
        ShareCreateOptionsBuilder::default()
    }
}

/// Builder for [`ShareCreateOptions`].
#[derive(Debug, Default)]
pub struct ShareCreateOptionsBuilder {
    options: ShareCreateOptions,
}

impl ShareCreateOptionsBuilder {
    /// Share size limit in GiB (1 to 102400).
    pub fn quota_gb(mut self, quota: u32) -> Self {
        self.options.quota_gb = Some(quota);
        self
    }

    pub fn access_tier(mut self, tier: ShareAccessTier) -> Self {
        self.options.access_tier = Some(tier);
        self
    }

    pub fn protocol(mut self, protocol: ShareProtocol) -> Self {
        self.options.protocol = Some(protocol);
        self
    }

    /// Only valid together with [`ShareProtocol::Nfs`].
    pub fn root_squash(mut self, squash: ShareRootSquash) -> Self {
        self.options.root_squash = Some(squash);
        self
    }

    pub fn metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.metadata.insert(name.into(), value.into());
        self
    }

    /// # Errors
    ///
    /// Returns [`AzureError::Builder`] if the quota is out of range or root
    /// squash is set on a non-NFS share.
    pub fn build(self) -> AzureResult<ShareCreateOptions> {
        if let Some(quota) = self.options.quota_gb {
            validate_quota(quota)?;
        }
        if self.options.root_squash.is_some() && self.options.protocol != Some(ShareProtocol::Nfs) {
            return Err(AzureError::Builder(
                "root squash requires the NFS protocol".into(),
            ));
        }
        Ok(self.options)
    }
}

fn validate_quota(quota: u32) -> AzureResult<()> {
    if !(MIN_SHARE_QUOTA_GB..=MAX_SHARE_QUOTA_GB).contains(&quota) {
        return Err(AzureError::Builder(format!(
            "share quota must be between {} and {} GB, got {}",
            MIN_SHARE_QUOTA_GB, MAX_SHARE_QUOTA_GB, quota
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Properties of a share, read from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareProperties {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub quota_gb: Option<u64>,
    pub access_tier: Option<ShareAccessTier>,
    pub enabled_protocols: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

fn share_url(client: &AzureClient, share: &str, comp: Option<&str>) -> AzureResult<Url> {
    if share.is_empty() {
        return Err(AzureError::Builder("share name is required".into()));
    }
    let mut url = client.url_with_segments(&[share])?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("restype", "share");
        if let Some(comp) = comp {
            query.append_pair("comp", comp);
        }
    }
    Ok(url)
}

/// Create a share.
///
/// # Errors
///
/// Returns [`AzureError::ResourceExists`] if the share already exists.
///
/// # Tracing
///
/// Emits a span named `azsdk::share::create` with field `share`.
#[tracing::instrument(name = "azsdk::share::create", skip(client, options))]
pub async fn create(
    client: &AzureClient,
    share: &str,
    options: &ShareCreateOptions,
) -> AzureResult<ShareProperties> {
    let mut request = AzureRequest::new(Method::PUT, share_url(client, share, None)?);

    if let Some(quota) = options.quota_gb {
        request = request.try_header(SHARE_QUOTA, &quota.to_string())?;
    }
    if let Some(tier) = options.access_tier {
        request = request.try_header(ACCESS_TIER, tier.as_str())?;
    }
    if let Some(protocol) = options.protocol {
        request = request.try_header(ENABLED_PROTOCOLS, protocol.as_str())?;
    }
    if let Some(squash) = options.root_squash {
        request = request.try_header(ROOT_SQUASH, squash.as_str())?;
    }
    for (name, value) in &options.metadata {
        request = request.try_header(&format!("{}{}", META_PREFIX, name), value)?;
    }

    let response = client.execute(request).await?;
    let headers = response.headers();
    tracing::debug!("share created");

    Ok(ShareProperties {
        etag: header_str(headers, ETAG.as_str()),
        last_modified: header_str(headers, LAST_MODIFIED.as_str()),
        quota_gb: options.quota_gb.map(u64::from),
        access_tier: options.access_tier,
        enabled_protocols: options.protocol.map(|p| p.as_str().to_string()),
        metadata: options.metadata.clone(),
    })
}

/// Read a share's properties.
#[tracing::instrument(name = "azsdk::share::get_properties", skip(client))]
pub async fn get_properties(client: &AzureClient, share: &str) -> AzureResult<ShareProperties> {
    let url = share_url(client, share, None)?;
    let response = client.execute(AzureRequest::new(Method::GET, url)).await?;
    let headers = response.headers();

    Ok(ShareProperties {
        etag: header_str(headers, ETAG.as_str()),
        last_modified: header_str(headers, LAST_MODIFIED.as_str()),
        quota_gb: header_u64(headers, SHARE_QUOTA),
        access_tier: header_str(headers, ACCESS_TIER).and_then(|t| ShareAccessTier::parse(&t)),
        enabled_protocols: header_str(headers, ENABLED_PROTOCOLS),
        metadata: metadata_from_headers(headers),
    })
}

/// Change a share's quota.
#[tracing::instrument(name = "azsdk::share::set_quota", skip(client))]
pub async fn set_quota(client: &AzureClient, share: &str, quota_gb: u32) -> AzureResult<()> {
    validate_quota(quota_gb)?;
    let request = AzureRequest::new(Method::PUT, share_url(client, share, Some("properties"))?)
        .try_header(SHARE_QUOTA, &quota_gb.to_string())?;
    client.execute(request).await?;
    Ok(())
}

/// Whether a share exists.
pub async fn exists(client: &AzureClient, share: &str) -> AzureResult<bool> {
    match get_properties(client, share).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Delete a share. With `include_snapshots` its snapshots go too; otherwise
/// a share that has snapshots cannot be deleted.
#[tracing::instrument(name = "azsdk::share::delete", skip(client))]
pub async fn delete(client: &AzureClient, share: &str, include_snapshots: bool) -> AzureResult<()> {
    let mut request = AzureRequest::new(Method::DELETE, share_url(client, share, None)?);
    if include_snapshots {
        request = request.try_header("x-ms-delete-snapshots", "include")?;
    }
    client.execute(request).await?;
    tracing::debug!("share deleted");
    Ok(())
}
