//! Block blob operations.
//!
//! ## Example
//!
//! ```rust,no_run
//! use azsdk_core::auth::AzureCredential;
//! use azsdk_storage::blob::{self, BlobDownloadOptions, BlobRange, BlobUploadOptions};
//! use azsdk_storage::models::storage_client_builder;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = storage_client_builder("https://myaccount.blob.core.windows.net")
//!     .credential(AzureCredential::sas("sv=2022-11-02&ss=b&sig=..."))
//!     .build()?;
//!
//! blob::upload(&client, "logs", "2024/app.log", "line 1\n", &BlobUploadOptions::default()).await?;
//!
//! let options = BlobDownloadOptions::new().range(BlobRange::new(0).count(4));
//! let head = blob::download(&client, "logs", "2024/app.log", &options)
//!     .await?
//!     .content
//!     .collect()
//!     .await?;
//! assert_eq!(&head[..], b"line");
//! # Ok(())
//! # }
//! ```

use azsdk_core::client::{AzureClient, AzureRequest};
use azsdk_core::error::{AzureError, AzureResult};
use bytes::Bytes;
use futures::FutureExt;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE, ETAG, IF_MATCH, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::Method;
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

use crate::download::{self, DownloadResponse, DownloadRetryOptions, HttpGetterInfo, RangeGetter};
use crate::models::{header_str, header_u64, metadata_from_headers, META_PREFIX};

/// Header carrying the requested byte range.
const MS_RANGE: &str = "x-ms-range";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// A byte range within a blob.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobRange {
    /// First byte of the range.
    pub offset: u64,
    /// Number of bytes; `None` reads to the end of the blob.
    pub count: Option<u64>,
}

impl BlobRange {
    /// A range starting at `offset` and running to the end of the blob.
    pub fn new(offset: u64) -> Self {
        Self {
            offset,
            count: None,
        }
    }

    /// Limit the range to `count` bytes.
    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Reject empty ranges and ranges that end past `u64::MAX`.
    pub fn validate(&self) -> AzureResult<()> {
        match self.count {
            Some(0) => Err(AzureError::Builder("range count must be greater than zero".into())),
            Some(count) if self.offset.checked_add(count - 1).is_none() => Err(AzureError::Builder(
                format!("range {}+{} overflows the addressable size", self.offset, count),
            )),
            _ => Ok(()),
        }
    }

    /// The `x-ms-range` header value, or `None` for the whole blob.
    pub fn to_header(&self) -> Option<String> {
        HttpGetterInfo::new(self.offset, self.count, None).range_header()
    }
}

/// ETag preconditions for a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobRequestConditions {
    /// Only proceed if the blob's ETag matches.
    pub if_match: Option<String>,
    /// Only proceed if the blob's ETag does not match (`*` = blob must not exist).
    pub if_none_match: Option<String>,
}

impl BlobRequestConditions {
    pub fn if_match(mut self, etag: impl Into<String>) -> Self {
        self.if_match = Some(etag.into());
        self
    }

    pub fn if_none_match(mut self, etag: impl Into<String>) -> Self {
        self.if_none_match = Some(etag.into());
        self
    }

    fn apply(&self, mut request: AzureRequest) -> AzureResult<AzureRequest> {
        if let Some(etag) = &self.if_match {
            request = request.try_header(IF_MATCH.as_str(), etag)?;
        }
        if let Some(etag) = &self.if_none_match {
            request = request.try_header(IF_NONE_MATCH.as_str(), etag)?;
        }
        Ok(request)
    }
}

/// Options for [`download`].
#[derive(Debug, Clone, Default)]
pub struct BlobDownloadOptions {
    range: Option<BlobRange>,
    retry: DownloadRetryOptions,
    conditions: BlobRequestConditions,
}

impl BlobDownloadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Download only part of the blob.
    pub fn range(mut self, range: BlobRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Resume budget for interrupted bodies.
    pub fn retry_options(mut self, retry: DownloadRetryOptions) -> Self {
        self.retry = retry;
        self
    }

    pub fn conditions(mut self, conditions: BlobRequestConditions) -> Self {
        self.conditions = conditions;
        self
    }
}

/// Options for [`upload`].
#[derive(Debug, Clone, Default)]
pub struct BlobUploadOptions {
    content_type: Option<String>,
    metadata: BTreeMap<String, String>,
    overwrite: bool,
    conditions: BlobRequestConditions,
}

impl BlobUploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Add a metadata entry (sent as `x-ms-meta-<name>`).
    pub fn metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }

    /// Replace an existing blob. When `false` (the default) the upload fails
    /// with [`AzureError::ResourceExists`] if the blob is already there.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn conditions(mut self, conditions: BlobRequestConditions) -> Self {
        self.conditions = conditions;
        self
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// System properties and metadata of a blob, read from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobProperties {
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub blob_type: Option<String>,
    pub lease_state: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl BlobProperties {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            content_length: header_u64(headers, CONTENT_LENGTH.as_str()),
            content_type: header_str(headers, CONTENT_TYPE.as_str()),
            etag: header_str(headers, ETAG.as_str()),
            last_modified: header_str(headers, LAST_MODIFIED.as_str()),
            blob_type: header_str(headers, "x-ms-blob-type"),
            lease_state: header_str(headers, "x-ms-lease-state"),
            metadata: metadata_from_headers(headers),
        }
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobUploadResult {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// A blob download: properties of the blob plus its (resumable) content.
#[derive(Debug)]
pub struct BlobDownloadResponse {
    pub properties: BlobProperties,
    pub content: DownloadResponse,
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

/// URL of a blob. `/` in the blob name separates virtual directories.
fn blob_url(client: &AzureClient, container: &str, blob: &str) -> AzureResult<Url> {
    if container.is_empty() || blob.is_empty() {
        return Err(AzureError::Builder("container and blob names are required".into()));
    }
    let mut segments = vec![container];
    segments.extend(blob.split('/'));
    client.url_with_segments(&segments)
}

fn container_url(client: &AzureClient, container: &str) -> AzureResult<Url> {
    if container.is_empty() {
        return Err(AzureError::Builder("container name is required".into()));
    }
    let mut url = client.url_with_segments(&[container])?;
    url.query_pairs_mut().append_pair("restype", "container");
    Ok(url)
}

/// Create a container.
///
/// # Tracing
///
/// Emits a span named `azsdk::blob::create_container` with field `container`.
#[tracing::instrument(name = "azsdk::blob::create_container", skip(client))]
pub async fn create_container(client: &AzureClient, container: &str) -> AzureResult<()> {
    let url = container_url(client, container)?;
    client.execute(AzureRequest::new(Method::PUT, url)).await?;
    tracing::debug!("container created");
    Ok(())
}

/// Delete a container and everything in it.
#[tracing::instrument(name = "azsdk::blob::delete_container", skip(client))]
pub async fn delete_container(client: &AzureClient, container: &str) -> AzureResult<()> {
    let url = container_url(client, container)?;
    client.execute(AzureRequest::new(Method::DELETE, url)).await?;
    Ok(())
}

/// Upload `data` as a block blob in a single request.
///
/// # Tracing
///
/// Emits a span named `azsdk::blob::upload` with fields `container`, `blob`,
/// and `size`.
#[tracing::instrument(
    name = "azsdk::blob::upload",
    skip(client, data, options),
    fields(size)
)]
pub async fn upload(
    client: &AzureClient,
    container: &str,
    blob: &str,
    data: impl Into<Bytes>,
    options: &BlobUploadOptions,
) -> AzureResult<BlobUploadResult> {
    let data = data.into();
    tracing::Span::current().record("size", data.len());

    let mut request = AzureRequest::new(Method::PUT, blob_url(client, container, blob)?)
        .try_header("x-ms-blob-type", "BlockBlob")?;

    if let Some(content_type) = &options.content_type {
        request = request.try_header("x-ms-blob-content-type", content_type)?;
    }
    for (name, value) in &options.metadata {
        request = request.try_header(&format!("{}{}", META_PREFIX, name), value)?;
    }

    let mut conditions = options.conditions.clone();
    if !options.overwrite && conditions.if_none_match.is_none() {
        conditions.if_none_match = Some("*".into());
    }
    request = conditions.apply(request)?;

    let response = client.execute(request.body(data)).await?;
    let headers = response.headers();

    let result = BlobUploadResult {
        etag: header_str(headers, ETAG.as_str()),
        last_modified: header_str(headers, LAST_MODIFIED.as_str()),
    };
    tracing::debug!(etag = ?result.etag, "blob uploaded");
    Ok(result)
}

/// Build the ranged GET used for both the first request and any resumes.
fn download_request(
    url: Url,
    info: &HttpGetterInfo,
    conditions: &BlobRequestConditions,
) -> AzureResult<AzureRequest> {
    let mut request = AzureRequest::new(Method::GET, url).streaming();
    if let Some(range) = info.range_header() {
        request = request.try_header(MS_RANGE, &range)?;
    }
    conditions.apply(request)
}

/// Download a blob (or a range of it).
///
/// The returned content stream resumes transparently after mid-stream
/// failures, up to the configured retry budget. Resumed requests carry
/// `If-Match` with the ETag of the first response, so a blob modified during
/// the download fails with [`AzureError::ResourceModified`] instead of
/// splicing two versions together.
///
/// # Tracing
///
/// Emits a span named `azsdk::blob::download` with fields `container` and `blob`.
#[tracing::instrument(name = "azsdk::blob::download", skip(client, options))]
pub async fn download(
    client: &AzureClient,
    container: &str,
    blob: &str,
    options: &BlobDownloadOptions,
) -> AzureResult<BlobDownloadResponse> {
    let range = options.range.unwrap_or_default();
    range.validate()?;

    let url = blob_url(client, container, blob)?;
    let initial = HttpGetterInfo::new(range.offset, range.count, options.conditions.if_match.clone());
    let response = client
        .execute(download_request(url.clone(), &initial, &options.conditions)?)
        .await?;

    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let properties = BlobProperties::from_headers(&headers);

    // Resumes read exactly what is left of this response and must see the same blob version.
    let info = HttpGetterInfo::new(
        range.offset,
        properties.content_length.or(range.count),
        properties.etag.clone().or(initial.etag),
    );

    let resume_client = client.clone();
    let resume_conditions = BlobRequestConditions {
        if_match: info.etag.clone(),
        if_none_match: None,
    };
    let getter: RangeGetter = Arc::new(move |info: HttpGetterInfo| {
        let client = resume_client.clone();
        let request = download_request(url.clone(), &info, &resume_conditions);
        async move {
            let response = client.execute(request?).await?;
            Ok(download::body_stream(response))
        }
        .boxed()
    });

    tracing::debug!(status, length = ?properties.content_length, "download started");

    let body = download::resumable(download::body_stream(response), info, options.retry, getter);
    Ok(BlobDownloadResponse {
        properties,
        content: DownloadResponse::new(status, headers, body),
    })
}

/// Download a whole blob into memory.
pub async fn download_content(
    client: &AzureClient,
    container: &str,
    blob: &str,
) -> AzureResult<Bytes> {
    download(client, container, blob, &BlobDownloadOptions::default())
        .await?
        .content
        .collect()
        .await
}

/// Read a blob's properties and metadata.
#[tracing::instrument(name = "azsdk::blob::get_properties", skip(client))]
pub async fn get_properties(
    client: &AzureClient,
    container: &str,
    blob: &str,
) -> AzureResult<BlobProperties> {
    let url = blob_url(client, container, blob)?;
    let response = client.execute(AzureRequest::new(Method::HEAD, url)).await?;
    Ok(BlobProperties::from_headers(response.headers()))
}

/// Whether a blob exists.
pub async fn exists(client: &AzureClient, container: &str, blob: &str) -> AzureResult<bool> {
    match get_properties(client, container, blob).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Delete a blob and its snapshots.
#[tracing::instrument(name = "azsdk::blob::delete", skip(client))]
pub async fn delete(client: &AzureClient, container: &str, blob: &str) -> AzureResult<()> {
    let request = AzureRequest::new(Method::DELETE, blob_url(client, container, blob)?)
        .try_header("x-ms-delete-snapshots", "include")?;
    client.execute(request).await?;
    tracing::debug!("blob deleted");
    Ok(())
}
