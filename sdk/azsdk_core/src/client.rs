//! HTTP client shared by every azsdk service crate.
//!
//! [`AzureClient`] owns the transport, endpoint, credential, API version, and
//! retry policy. Service crates build an [`AzureRequest`] (or use the
//! `get`/`put_json`/... shortcuts) and get back a successful
//! [`reqwest::Response`] or a typed [`AzureError`].
//!
//! # Examples
//!
//! ## Storage with a SAS token
//! ```rust,no_run
//! use azsdk_core::client::{AzureClient, ApiVersionLocation};
//! use azsdk_core::auth::AzureCredential;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AzureClient::builder()
//!     .endpoint("https://myaccount.blob.core.windows.net")
//!     .credential(AzureCredential::sas("sv=2022-11-02&ss=b&sig=..."))
//!     .api_version("2023-11-03")
//!     .api_version_location(ApiVersionLocation::Header("x-ms-version".into()))
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Vault with challenge-based authentication
//! ```rust,no_run
//! use azsdk_core::client::AzureClient;
//! use azsdk_core::auth::AzureCredential;
//! use azsdk_core::challenge::BearerChallengePolicy;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AzureClient::builder()
//!     .endpoint("https://myvault.vault.azure.net")
//!     .credential(AzureCredential::azure_cli()?)
//!     .challenge_auth(BearerChallengePolicy::new())
//!     .api_version("7.5")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::auth::AzureCredential;
use crate::challenge::{authority, BearerChallengePolicy};
use crate::error::{AzureError, AzureResult};
use crate::models::Page;
use bytes::Bytes;
use futures::stream::{self, Stream, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use std::time::Duration;

/// Environment variable consulted when no endpoint is configured.
pub const ENDPOINT_ENV: &str = "AZURE_ENDPOINT";

/// Default connection timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read/response timeout (60 seconds).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for requests whose body is consumed as a stream (5 minutes).
///
/// Downloads read their body long after the headers arrive, so they get a
/// longer budget than ordinary requests.
pub const DEFAULT_STREAMING_TIMEOUT: Duration = Duration::from_secs(300);

/// Determines if an HTTP status code represents a retriable error.
///
/// Retriable errors are transient server-side issues that may succeed on retry:
/// - 408 Request Timeout
/// - 429 Too Many Requests (rate limiting)
/// - 500 Internal Server Error
/// - 502 Bad Gateway
/// - 503 Service Unavailable
/// - 504 Gateway Timeout
#[inline]
pub fn is_retriable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Transport failures worth retrying: the request never produced a response.
#[inline]
fn is_retriable_transport(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

/// Configuration for automatic retry behavior on transient errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not counting the initial request).
    pub max_retries: u32,
    /// Initial backoff duration before the first retry.
    /// Subsequent retries use exponential backoff (2^attempt * initial_backoff).
    pub initial_backoff: Duration,
    /// Upper bound for any single delay, including server `Retry-After` hints.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    ///
    /// A server-provided `Retry-After` wins over the computed backoff. The
    /// computed backoff carries ±25% jitter.
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = match retry_after {
            Some(hint) => hint,
            None => {
                let base = self
                    .initial_backoff
                    .saturating_mul(2_u32.saturating_pow(attempt));
                let jitter = 0.75 + fastrand::f64() * 0.5; // 0.75 to 1.25
                base.mul_f64(jitter)
            }
        };
        delay.min(self.max_backoff)
    }
}

/// Where the API version is sent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ApiVersionLocation {
    /// `?api-version=<version>` (ARM, Key Vault).
    #[default]
    Query,
    /// A request header such as `x-ms-version` (Storage).
    Header(String),
}

/// How bearer tokens are obtained.
#[derive(Debug, Clone)]
pub enum AuthScheme {
    /// Tokens are requested for fixed scopes.
    Scopes(Vec<String>),
    /// Scopes are learned from `WWW-Authenticate` challenges.
    Challenge(BearerChallengePolicy),
}

impl Default for AuthScheme {
    fn default() -> Self {
        Self::Scopes(Vec::new())
    }
}

/// A request to be executed by [`AzureClient::execute`].
#[derive(Debug, Clone)]
pub struct AzureRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
    streaming: bool,
}

impl AzureRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            streaming: false,
        }
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add a header from strings, failing on names or values HTTP cannot carry.
    pub fn try_header(self, name: &str, value: &str) -> AzureResult<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| AzureError::Builder(format!("invalid header name '{}'", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| AzureError::Builder(format!("invalid value for header '{}'", name)))?;
        Ok(self.header(name, value))
    }

    /// Set a raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `body` as JSON and set the content type.
    pub fn json<T: serde::Serialize + ?Sized>(mut self, body: &T) -> AzureResult<Self> {
        self.body = Some(Bytes::from(serde_json::to_vec(body)?));
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Use the streaming timeout instead of the read timeout.
    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// The base client for interacting with an Azure service.
///
/// The client is cheaply cloneable and can be shared across threads; clones
/// share the token and challenge caches.
#[derive(Debug, Clone)]
pub struct AzureClient {
    pub(crate) http: HttpClient,
    pub(crate) endpoint: Url,
    pub(crate) credential: AzureCredential,
    pub(crate) auth: AuthScheme,
    pub(crate) api_version: Option<String>,
    pub(crate) api_version_location: ApiVersionLocation,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) streaming_timeout: Duration,
}

/// Builder for constructing an [`AzureClient`].
///
/// Use [`AzureClient::builder()`] to create a new builder.
#[derive(Debug, Default)]
pub struct AzureClientBuilder {
    endpoint: Option<String>,
    credential: Option<AzureCredential>,
    auth: Option<AuthScheme>,
    api_version: Option<String>,
    api_version_location: ApiVersionLocation,
    http_client: Option<HttpClient>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    streaming_timeout: Option<Duration>,
    retry_policy: Option<RetryPolicy>,
}

impl AzureClient {
    /// Create a new builder for configuring an `AzureClient`.
    pub fn builder() -> AzureClientBuilder {
        AzureClientBuilder::default()
    }

    /// Get the base endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Get the API version being used, if any.
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    /// Get the retry policy configuration.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Get the timeout applied to streaming requests.
    pub fn streaming_timeout(&self) -> Duration {
        self.streaming_timeout
    }

    /// Get the credential.
    pub fn credential(&self) -> &AzureCredential {
        &self.credential
    }

    /// Get the authentication scheme.
    pub fn auth_scheme(&self) -> &AuthScheme {
        &self.auth
    }

    /// Build a full URL for an API path, which may carry its own query string.
    pub fn url(&self, path: &str) -> AzureResult<Url> {
        self.endpoint
            .join(path)
            .map_err(|e| AzureError::invalid_endpoint_with_source("failed to construct URL", e))
    }

    /// Build a URL by appending percent-encoded path segments to the endpoint.
    pub fn url_with_segments(&self, segments: &[&str]) -> AzureResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| AzureError::invalid_endpoint("endpoint cannot be a base URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a GET request.
    pub async fn get(&self, path: &str) -> AzureResult<reqwest::Response> {
        self.execute(AzureRequest::new(Method::GET, self.url(path)?))
            .await
    }

    /// Send a HEAD request.
    pub async fn head(&self, path: &str) -> AzureResult<reqwest::Response> {
        self.execute(AzureRequest::new(Method::HEAD, self.url(path)?))
            .await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> AzureResult<reqwest::Response> {
        self.execute(AzureRequest::new(Method::DELETE, self.url(path)?))
            .await
    }

    /// Send a PUT request with a JSON body.
    pub async fn put_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> AzureResult<reqwest::Response> {
        self.execute(AzureRequest::new(Method::PUT, self.url(path)?).json(body)?)
            .await
    }

    /// Send a POST request with a JSON body.
    pub async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> AzureResult<reqwest::Response> {
        self.execute(AzureRequest::new(Method::POST, self.url(path)?).json(body)?)
            .await
    }

    /// Send a PATCH request with a JSON body.
    pub async fn patch_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> AzureResult<reqwest::Response> {
        self.execute(AzureRequest::new(Method::PATCH, self.url(path)?).json(body)?)
            .await
    }

    /// Stream every item of a paged list, following `nextLink` across pages.
    pub fn pages<'a, T>(&'a self, path: &str) -> impl Stream<Item = AzureResult<T>> + 'a
    where
        T: DeserializeOwned + 'a,
    {
        let first = self.url(path);
        stream::once(async move { first })
            .map_ok(move |url| {
                stream::try_unfold(Some(url), move |next| async move {
                    let Some(url) = next else {
                        return Ok::<_, AzureError>(None);
                    };
                    let response = self.execute(AzureRequest::new(Method::GET, url)).await?;
                    let page = response.json::<Page<T>>().await?;
                    let next = match page.next_link.as_deref().filter(|l| !l.is_empty()) {
                        Some(link) => Some(Url::parse(link).map_err(|e| {
                            AzureError::invalid_endpoint_with_source("invalid nextLink", e)
                        })?),
                        None => None,
                    };
                    tracing::trace!(items = page.value.len(), has_next = next.is_some(), "received page");
                    Ok(Some((stream::iter(page.value.into_iter().map(Ok::<T, AzureError>)), next)))
                })
                .try_flatten()
            })
            .try_flatten()
    }

    /// Collect every item of a paged list.
    pub async fn list_all<T: DeserializeOwned>(&self, path: &str) -> AzureResult<Vec<T>> {
        self.pages(path).try_collect().await
    }

    /// Execute a request with authentication, API versioning, and retries.
    ///
    /// Retries on retriable HTTP statuses (408, 429, 500, 502, 503, 504) and
    /// on connect/timeout transport errors with exponential backoff. With
    /// challenge authentication a `401` carrying `WWW-Authenticate` is
    /// answered once by replaying the request with a fresh token.
    pub async fn execute(&self, request: AzureRequest) -> AzureResult<reqwest::Response> {
        let url = self.prepare_url(request.url.clone());
        let mut authorization = self.initial_authorization(&url).await?;
        let mut challenged = false;
        let mut attempt = 0;

        loop {
            let probe = matches!(self.auth, AuthScheme::Challenge(_))
                && authorization.is_none()
                && !challenged
                && self.credential.is_bearer();

            let mut builder = self
                .http
                .request(request.method.clone(), url.clone())
                .headers(request.headers.clone());

            if let Some(auth) = &authorization {
                builder = builder.header(AUTHORIZATION, auth);
            }
            if let (ApiVersionLocation::Header(name), Some(version)) =
                (&self.api_version_location, &self.api_version)
            {
                builder = builder.header(name.as_str(), version);
            }
            if request.streaming {
                builder = builder.timeout(self.streaming_timeout);
            }
            // Until the challenge is known the body is withheld so it is not sent unauthenticated.
            match (&request.body, probe) {
                (Some(_), true) => builder = builder.body(Bytes::new()),
                (Some(body), false) => builder = builder.body(body.clone()),
                (None, _) => {}
            }

            tracing::debug!(
                method = %request.method,
                url = %redact_url(&url),
                attempt,
                "sending request"
            );

            let response = match builder.send().await {
                Ok(response) => response,
                Err(e) if is_retriable_transport(&e) && attempt < self.retry_policy.max_retries => {
                    tracing::warn!(error = %e, attempt, "transport error, retrying");
                    tokio::time::sleep(self.retry_policy.delay(attempt, None)).await;
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::UNAUTHORIZED && !challenged {
                if let AuthScheme::Challenge(policy) = &self.auth {
                    if let Some(auth) = policy
                        .on_challenge(&self.credential, &url, response.headers())
                        .await?
                    {
                        authorization = Some(auth);
                        challenged = true;
                        continue;
                    }
                }
            }

            if status == StatusCode::UNAUTHORIZED && challenged {
                // Forget the challenge so the next request is challenged afresh.
                if let AuthScheme::Challenge(policy) = &self.auth {
                    policy.cache().remove(&authority(&url)).await;
                }
                let err = Self::error_from_response(response).await;
                return Err(AzureError::Auth(format!(
                    "token rejected after answering the challenge: {}",
                    err
                )));
            }

            if is_retriable_status(status.as_u16()) && attempt < self.retry_policy.max_retries {
                let delay = self
                    .retry_policy
                    .delay(attempt, retry_after(response.headers()));
                tracing::debug!(status = status.as_u16(), ?delay, attempt, "retriable status");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return Err(Self::error_from_response(response).await);
        }
    }

    /// Authorization header for the first attempt.
    async fn initial_authorization(&self, url: &Url) -> AzureResult<Option<String>> {
        match &self.auth {
            AuthScheme::Scopes(scopes) => {
                let scopes: Vec<&str> = scopes.iter().map(String::as_str).collect();
                self.credential.authorization(&scopes).await
            }
            AuthScheme::Challenge(policy) => policy.authorize(&self.credential, url).await,
        }
    }

    /// Add the API version query parameter and SAS token where configured.
    fn prepare_url(&self, mut url: Url) -> Url {
        if let (ApiVersionLocation::Query, Some(version)) =
            (&self.api_version_location, &self.api_version)
        {
            if !url.query_pairs().any(|(k, _)| k == "api-version") {
                url.query_pairs_mut().append_pair("api-version", version);
            }
        }

        if let Some(sas) = self.credential.sas_query() {
            let existing: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
            let pairs: Vec<(String, String)> = url::form_urlencoded::parse(sas.as_bytes())
                .filter(|(k, _)| !existing.iter().any(|e| e == k))
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            if !pairs.is_empty() {
                url.query_pairs_mut().extend_pairs(pairs);
            }
        }

        url
    }

    /// Maximum length for error messages to prevent sensitive data leaks.
    const MAX_ERROR_MESSAGE_LEN: usize = 1000;

    /// Sanitize error messages by removing bearer tokens and SAS signatures.
    pub(crate) fn sanitize_error_message(msg: &str) -> String {
        let mut result = msg.to_string();

        for marker in ["Bearer ", "sig="] {
            let mut search_start = 0;
            while search_start < result.len() {
                let Some(relative_pos) = result[search_start..].find(marker) else {
                    break;
                };
                let secret_start = search_start + relative_pos + marker.len();

                if result[secret_start..].starts_with("[REDACTED]") {
                    search_start = secret_start + 10;
                    continue;
                }

                let secret_end = result[secret_start..]
                    .find(|c: char| {
                        c.is_whitespace() || c == '"' || c == '\'' || c == ',' || c == '&' || c == '<'
                    })
                    .map(|pos| secret_start + pos)
                    .unwrap_or(result.len());

                if secret_end > secret_start {
                    result.replace_range(secret_start..secret_end, "[REDACTED]");
                    search_start = secret_start + 10; // "[REDACTED]" is 10 chars
                } else {
                    search_start = secret_start;
                }
            }
        }

        result
    }

    /// Sanitize then truncate a message to [`Self::MAX_ERROR_MESSAGE_LEN`].
    pub(crate) fn truncate_message(msg: &str) -> String {
        let sanitized = Self::sanitize_error_message(msg);

        if sanitized.len() > Self::MAX_ERROR_MESSAGE_LEN {
            let mut cut = Self::MAX_ERROR_MESSAGE_LEN;
            while !sanitized.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}... (truncated)", &sanitized[..cut])
        } else {
            sanitized
        }
    }

    /// Convert a non-success response into a typed error.
    pub async fn error_from_response(response: reqwest::Response) -> AzureError {
        let status_code = response.status();
        let status = status_code.as_u16();
        let header_code = response
            .headers()
            .get("x-ms-error-code")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await.unwrap_or_default();

        let mut code = header_code;
        let mut message = None;
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
            if let Some(err_obj) = value.get("error") {
                code = err_obj
                    .get("code")
                    .and_then(|c| c.as_str())
                    .map(str::to_owned)
                    .or(code)
                    .or_else(|| Some("unknown".to_string()));
                message = err_obj
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_owned);
            }
        }
        let mut message = Self::truncate_message(message.as_deref().unwrap_or(&body));
        if message.is_empty() && code.is_none() {
            message = status_code
                .canonical_reason()
                .unwrap_or("no error details")
                .to_string();
        }
        let detail = match &code {
            Some(code) if message.is_empty() => code.clone(),
            Some(code) => format!("{}: {}", code, message),
            None => message.clone(),
        };

        match status {
            404 => AzureError::ResourceNotFound { message: detail },
            409 => AzureError::ResourceExists { message: detail },
            412 => AzureError::ResourceModified { message: detail },
            _ => match code {
                Some(code) => AzureError::Api { code, message },
                None => AzureError::http(status, message),
            },
        }
    }
}

/// Parse `Retry-After` given in seconds.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Render a URL for logs with any SAS signature removed.
pub fn redact_url(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == "sig") {
        return url.to_string();
    }
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "sig" { "REDACTED".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

impl AzureClientBuilder {
    /// Set the service endpoint URL.
    ///
    /// If not set, the builder will check the `AZURE_ENDPOINT` environment
    /// variable.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the credential to use for authentication.
    ///
    /// If not set, the builder will use [`AzureCredential::from_env()`].
    pub fn credential(mut self, credential: AzureCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Add a fixed token scope (e.g. `https://management.azure.com/.default`).
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        match &mut self.auth {
            Some(AuthScheme::Scopes(scopes)) => scopes.push(scope.into()),
            _ => self.auth = Some(AuthScheme::Scopes(vec![scope.into()])),
        }
        self
    }

    /// Learn token scopes from authentication challenges.
    pub fn challenge_auth(mut self, policy: BearerChallengePolicy) -> Self {
        self.auth = Some(AuthScheme::Challenge(policy));
        self
    }

    /// Set the API version. No version is sent when unset.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Choose where the API version is sent. Defaults to the query string.
    pub fn api_version_location(mut self, location: ApiVersionLocation) -> Self {
        self.api_version_location = location;
        self
    }

    /// Set a custom HTTP client.
    ///
    /// **Note:** If you provide a custom HTTP client, any timeout configuration
    /// via [`connect_timeout`](Self::connect_timeout) and
    /// [`read_timeout`](Self::read_timeout) will be ignored.
    pub fn http_client(mut self, client: HttpClient) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the read timeout.
    ///
    /// This covers the entire request/response cycle including reading the body.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the timeout for streaming requests such as downloads.
    ///
    /// Defaults to [`DEFAULT_STREAMING_TIMEOUT`].
    pub fn streaming_timeout(mut self, timeout: Duration) -> Self {
        self.streaming_timeout = Some(timeout);
        self
    }

    /// Set the retry policy for transient errors.
    ///
    /// Defaults to 3 retries with 500ms initial backoff.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Build the `AzureClient`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No endpoint is provided and `AZURE_ENDPOINT` is not set
    /// - The endpoint URL is invalid
    /// - A token credential is configured without scopes or challenge auth
    /// - Credential creation fails (when using environment-based credentials)
    pub fn build(self) -> AzureResult<AzureClient> {
        let http = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
                .timeout(self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT))
                .build()?,
        };

        let endpoint_str = self
            .endpoint
            .or_else(|| std::env::var(ENDPOINT_ENV).ok())
            .ok_or_else(|| {
                AzureError::MissingConfig(
                    "endpoint is required. Set it via builder or AZURE_ENDPOINT env var.".into(),
                )
            })?;

        let endpoint = Url::parse(&endpoint_str)
            .map_err(|e| AzureError::invalid_endpoint_with_source("invalid endpoint URL", e))?;

        let credential = self
            .credential
            .map(Ok)
            .unwrap_or_else(AzureCredential::from_env)?;

        let auth = self.auth.unwrap_or_default();
        if let (AuthScheme::Scopes(scopes), AzureCredential::TokenCredential { .. }) =
            (&auth, &credential)
        {
            if scopes.is_empty() {
                return Err(AzureError::MissingConfig(
                    "a token scope or challenge auth is required for token credentials".into(),
                ));
            }
        }

        Ok(AzureClient {
            http,
            endpoint,
            credential,
            auth,
            api_version: self.api_version,
            api_version_location: self.api_version_location,
            retry_policy: self.retry_policy.unwrap_or_default(),
            streaming_timeout: self.streaming_timeout.unwrap_or(DEFAULT_STREAMING_TIMEOUT),
        })
    }
}
