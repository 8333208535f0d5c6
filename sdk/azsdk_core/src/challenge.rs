//! Bearer-token challenge authentication.
//!
//! Some services (Key Vault in particular) do not publish the token scope or
//! tenant up front. The first request goes out without a token; the service
//! answers `401` with a header such as:
//!
//! ```text
//! WWW-Authenticate: Bearer authorization="https://login.microsoftonline.com/<tenant>",
//!                   resource="https://vault.azure.net"
//! ```
//!
//! [`BearerChallengePolicy`] parses that challenge, caches it per authority
//! (`host[:port]`), acquires a token for the advertised scope, and lets the
//! client replay the request. Later requests to the same authority reuse the
//! cached challenge and are authorized on the first attempt.

use crate::auth::AzureCredential;
use crate::error::{AzureError, AzureResult};
use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

/// Suffix appended to a challenge `resource` to form a token scope.
const DEFAULT_SCOPE_SUFFIX: &str = "/.default";

/// Parameters extracted from a `WWW-Authenticate: Bearer` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationChallenge {
    /// Authority URI, e.g. `https://login.microsoftonline.com/<tenant>`.
    pub authorization: String,
    /// Token scope, e.g. `https://vault.azure.net/.default`.
    pub scope: String,
    /// Tenant id taken from the first path segment of the authority URI.
    pub tenant_id: Option<String>,
}

impl AuthenticationChallenge {
    /// Parse a `WWW-Authenticate` header value.
    ///
    /// Accepts `authorization` or `authorization_uri`, and `scope` or
    /// `resource` (which gets `/.default` appended).
    pub fn parse(header: &str) -> AzureResult<Self> {
        let header = header.trim();
        let (scheme, rest) = header.split_once(char::is_whitespace).unwrap_or((header, ""));
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(AzureError::Challenge(format!(
                "unsupported authentication scheme '{}'",
                scheme
            )));
        }

        let params = parse_params(rest);

        let authorization = params
            .get("authorization")
            .or_else(|| params.get("authorization_uri"))
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| AzureError::Challenge("missing authorization parameter".into()))?;

        let scope = match (params.get("scope"), params.get("resource")) {
            (Some(scope), _) if !scope.is_empty() => scope.clone(),
            (_, Some(resource)) if !resource.is_empty() => {
                format!("{}{}", resource.trim_end_matches('/'), DEFAULT_SCOPE_SUFFIX)
            }
            _ => {
                return Err(AzureError::Challenge(
                    "missing scope or resource parameter".into(),
                ))
            }
        };

        let tenant_id = Url::parse(&authorization).ok().and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next())
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        });

        Ok(Self {
            authorization,
            scope,
            tenant_id,
        })
    }

    /// Host named by the scope, used to check the challenge targets the request host.
    fn scope_host(&self) -> Option<String> {
        Url::parse(&self.scope)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
    }
}

/// Split `k1="v1", k2=v2` into a map. Quoted values may contain commas.
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }

        let key: String = chars
            .by_ref()
            .take_while(|c| *c != '=')
            .collect::<String>()
            .trim()
            .to_ascii_lowercase();
        if key.is_empty() {
            break;
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                value.push(c);
            }
        } else {
            while let Some(c) = chars.peek() {
                if *c == ',' {
                    break;
                }
                value.push(*c);
                chars.next();
            }
        }

        params.insert(key, value.trim().to_string());
    }

    params
}

/// Authority key for a URL: `host` or `host:port`.
pub fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    }
}

/// Challenges cached per authority.
#[derive(Debug, Clone, Default)]
pub struct ChallengeCache {
    entries: Arc<RwLock<HashMap<String, AuthenticationChallenge>>>,
}

impl ChallengeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, authority: &str) -> Option<AuthenticationChallenge> {
        self.entries.read().await.get(authority).cloned()
    }

    /// Store a challenge and return the one it replaced, if any.
    pub async fn insert(
        &self,
        authority: String,
        challenge: AuthenticationChallenge,
    ) -> Option<AuthenticationChallenge> {
        self.entries.write().await.insert(authority, challenge)
    }

    pub async fn remove(&self, authority: &str) {
        self.entries.write().await.remove(authority);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Resolves bearer tokens from service-issued authentication challenges.
#[derive(Debug, Clone)]
pub struct BearerChallengePolicy {
    cache: ChallengeCache,
    verify_challenge_resource: bool,
}

impl Default for BearerChallengePolicy {
    fn default() -> Self {
        Self {
            cache: ChallengeCache::new(),
            verify_challenge_resource: true,
        }
    }
}

impl BearerChallengePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the challenge scope's host to match the request host (default `true`).
    pub fn verify_challenge_resource(mut self, verify: bool) -> Self {
        self.verify_challenge_resource = verify;
        self
    }

    /// The cache backing this policy.
    pub fn cache(&self) -> &ChallengeCache {
        &self.cache
    }

    /// Authorization header for `url` from a previously cached challenge.
    ///
    /// Returns `Ok(None)` when no challenge is cached for the authority yet.
    pub async fn authorize(
        &self,
        credential: &AzureCredential,
        url: &Url,
    ) -> AzureResult<Option<String>> {
        match self.cache.get(&authority(url)).await {
            Some(challenge) => credential.authorization(&[challenge.scope.as_str()]).await,
            None => Ok(None),
        }
    }

    /// Handle a `401` response.
    ///
    /// Returns `Ok(None)` when the response carries no `WWW-Authenticate`
    /// header; otherwise the header to replay the request with.
    #[tracing::instrument(name = "azsdk::challenge::on_challenge", skip_all, fields(authority))]
    pub async fn on_challenge(
        &self,
        credential: &AzureCredential,
        url: &Url,
        headers: &HeaderMap,
    ) -> AzureResult<Option<String>> {
        let Some(raw) = headers.get(WWW_AUTHENTICATE) else {
            return Ok(None);
        };
        let raw = raw
            .to_str()
            .map_err(|_| AzureError::Challenge("non-ASCII WWW-Authenticate header".into()))?;

        let challenge = AuthenticationChallenge::parse(raw)?;
        let key = authority(url);
        tracing::Span::current().record("authority", key.as_str());

        if self.verify_challenge_resource {
            let request_host = url.host_str().unwrap_or_default().to_ascii_lowercase();
            let scope_host = challenge.scope_host().ok_or_else(|| {
                AzureError::Challenge(format!("scope '{}' is not a valid URI", challenge.scope))
            })?;
            let matches = request_host == scope_host
                || request_host.ends_with(&format!(".{}", scope_host));
            if !matches {
                return Err(AzureError::Challenge(format!(
                    "challenge resource '{}' does not match request host '{}'",
                    scope_host, request_host
                )));
            }
        }

        let previous = self.cache.insert(key, challenge.clone()).await;
        if previous.as_ref() == Some(&challenge) {
            // The cached scope was right, so the token itself was rejected.
            credential.invalidate(&[challenge.scope.as_str()]).await;
        }

        tracing::debug!(scope = %challenge.scope, tenant = ?challenge.tenant_id, "resolved authentication challenge");
        credential.authorization(&[challenge.scope.as_str()]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::MockCredential;
    use reqwest::header::HeaderValue;
    use std::sync::atomic::Ordering;

    const KV_CHALLENGE: &str = r#"Bearer authorization="https://login.microsoftonline.com/72f988bf-86f1-41af-91ab-2d7cd011db47", resource="https://vault.azure.net""#;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(WWW_AUTHENTICATE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn parses_resource_challenge() {
        let challenge = AuthenticationChallenge::parse(KV_CHALLENGE).unwrap();

        assert_eq!(
            challenge.authorization,
            "https://login.microsoftonline.com/72f988bf-86f1-41af-91ab-2d7cd011db47"
        );
        assert_eq!(challenge.scope, "https://vault.azure.net/.default");
        assert_eq!(
            challenge.tenant_id.as_deref(),
            Some("72f988bf-86f1-41af-91ab-2d7cd011db47")
        );
    }

    #[test]
    fn parses_scope_and_authorization_uri() {
        let challenge = AuthenticationChallenge::parse(
            r#"bearer authorization_uri="https://login.windows.net/tenant-1",scope="https://managedhsm.azure.net/.default""#,
        )
        .unwrap();

        assert_eq!(challenge.scope, "https://managedhsm.azure.net/.default");
        assert_eq!(challenge.tenant_id.as_deref(), Some("tenant-1"));
    }

    #[test]
    fn resource_trailing_slash_is_normalized() {
        let challenge = AuthenticationChallenge::parse(
            r#"Bearer authorization="https://login.microsoftonline.com/t", resource="https://vault.azure.net/""#,
        )
        .unwrap();
        assert_eq!(challenge.scope, "https://vault.azure.net/.default");
    }

    #[test]
    fn rejects_non_bearer_scheme() {
        let err = AuthenticationChallenge::parse(r#"Basic realm="x""#).unwrap_err();
        assert!(matches!(err, AzureError::Challenge(_)));
    }

    #[test]
    fn rejects_missing_parameters() {
        assert!(AuthenticationChallenge::parse(r#"Bearer resource="https://vault.azure.net""#).is_err());
        assert!(AuthenticationChallenge::parse(
            r#"Bearer authorization="https://login.microsoftonline.com/t""#
        )
        .is_err());
    }

    #[test]
    fn authority_includes_explicit_port() {
        let with_port = Url::parse("http://127.0.0.1:8080/keys").unwrap();
        let default_port = Url::parse("https://MyVault.vault.azure.net/keys").unwrap();

        assert_eq!(authority(&with_port), "127.0.0.1:8080");
        assert_eq!(authority(&default_port), "myvault.vault.azure.net");
    }

    #[tokio::test]
    async fn authorize_without_cached_challenge_is_none() {
        let policy = BearerChallengePolicy::new();
        let cred = AzureCredential::token_credential(MockCredential::new());
        let url = Url::parse("https://myvault.vault.azure.net/secrets").unwrap();

        assert!(policy.authorize(&cred, &url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn challenge_is_cached_and_reused() {
        let mock = MockCredential::new();
        let cred = AzureCredential::token_credential(mock.clone());
        let policy = BearerChallengePolicy::new();
        let url = Url::parse("https://myvault.vault.azure.net/roleDefinitions").unwrap();

        let header = policy
            .on_challenge(&cred, &url, &headers_with(KV_CHALLENGE))
            .await
            .unwrap();
        assert_eq!(header.as_deref(), Some("Bearer token-1"));

        let cached = policy.authorize(&cred, &url).await.unwrap();
        assert_eq!(cached.as_deref(), Some("Bearer token-1"));
        assert_eq!(policy.cache().len().await, 1);
        assert_eq!(
            *mock.scopes.lock().unwrap(),
            vec!["https://vault.azure.net/.default".to_string()]
        );
    }

    #[tokio::test]
    async fn repeated_challenge_refreshes_token() {
        let mock = MockCredential::new();
        let cred = AzureCredential::token_credential(mock.clone());
        let policy = BearerChallengePolicy::new();
        let url = Url::parse("https://myvault.vault.azure.net/").unwrap();
        let headers = headers_with(KV_CHALLENGE);

        policy.on_challenge(&cred, &url, &headers).await.unwrap();
        let second = policy.on_challenge(&cred, &url, &headers).await.unwrap();

        assert_eq!(second.as_deref(), Some("Bearer token-2"));
        assert_eq!(mock.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn mismatched_resource_is_rejected() {
        let cred = AzureCredential::token_credential(MockCredential::new());
        let policy = BearerChallengePolicy::new();
        let url = Url::parse("https://evil.example.com/").unwrap();

        let err = policy
            .on_challenge(&cred, &url, &headers_with(KV_CHALLENGE))
            .await
            .unwrap_err();
        assert!(matches!(err, AzureError::Challenge(_)));
        assert!(policy.cache().is_empty().await);
    }

    #[tokio::test]
    async fn verification_can_be_disabled() {
        let cred = AzureCredential::token_credential(MockCredential::new());
        let policy = BearerChallengePolicy::new().verify_challenge_resource(false);
        let url = Url::parse("http://127.0.0.1:9000/").unwrap();

        let header = policy
            .on_challenge(&cred, &url, &headers_with(KV_CHALLENGE))
            .await
            .unwrap();
        assert!(header.is_some());
    }

    #[tokio::test]
    async fn missing_header_yields_none() {
        let cred = AzureCredential::token_credential(MockCredential::new());
        let policy = BearerChallengePolicy::new();
        let url = Url::parse("https://myvault.vault.azure.net/").unwrap();

        let header = policy.on_challenge(&cred, &url, &HeaderMap::new()).await.unwrap();
        assert!(header.is_none());
    }
}
