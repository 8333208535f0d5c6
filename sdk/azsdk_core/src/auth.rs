//! Credentials used to authorize requests against Azure services.
//!
//! Three shapes are supported:
//!
//! - **SAS tokens**, appended to the request query string (Storage).
//! - **Pre-acquired access tokens**, sent as `Authorization: Bearer ...`.
//! - Any [`azure_core::credentials::TokenCredential`] (Entra ID). Tokens are
//!   cached per scope set and refreshed shortly before they expire.

use crate::error::{AzureError, AzureResult};
use azure_core::credentials::TokenCredential;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// Environment variable holding a SAS token.
pub const SAS_TOKEN_ENV: &str = "AZURE_SAS_TOKEN";

/// Environment variable holding a pre-acquired bearer token.
pub const ACCESS_TOKEN_ENV: &str = "AZURE_ACCESS_TOKEN";

/// Tokens are refreshed when they have less than this many seconds left.
pub const TOKEN_REFRESH_MARGIN_SECS: u64 = 300;

/// Credential types supported by the SDK.
#[derive(Clone)]
pub enum AzureCredential {
    /// Shared Access Signature, sent as URL query parameters.
    Sas(SecretString),

    /// A bearer token acquired out of band.
    AccessToken(SecretString),

    /// A token credential from `azure_identity` or a custom implementation.
    TokenCredential {
        credential: Arc<dyn TokenCredential>,
        cache: TokenCache,
    },
}

impl AzureCredential {
    /// Create a credential from the environment.
    ///
    /// Checks `AZURE_SAS_TOKEN`, then `AZURE_ACCESS_TOKEN`, and falls back to
    /// the developer tools credential chain (Azure CLI, Azure Developer CLI).
    pub fn from_env() -> AzureResult<Self> {
        if let Ok(sas) = std::env::var(SAS_TOKEN_ENV) {
            if !sas.is_empty() {
                return Ok(Self::sas(sas));
            }
        }
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.is_empty() {
                return Ok(Self::access_token(token));
            }
        }
        Self::developer_tools()
    }

    /// Create a SAS credential. A leading `?` is stripped.
    pub fn sas(token: impl Into<String>) -> Self {
        let token = token.into();
        let token = token.strip_prefix('?').map(str::to_owned).unwrap_or(token);
        Self::Sas(SecretString::from(token))
    }

    /// Create a credential from a pre-acquired bearer token.
    pub fn access_token(token: impl Into<String>) -> Self {
        Self::AccessToken(SecretString::from(token.into()))
    }

    /// Wrap any [`TokenCredential`].
    pub fn token_credential(credential: Arc<dyn TokenCredential>) -> Self {
        Self::TokenCredential {
            credential,
            cache: TokenCache::new(),
        }
    }

    /// Use the Azure CLI for token acquisition.
    pub fn azure_cli() -> AzureResult<Self> {
        let credential = azure_identity::AzureCliCredential::new(None)
            .map_err(|e| AzureError::Credential(e.to_string()))?;
        Ok(Self::token_credential(credential))
    }

    /// Use the developer tools credential chain.
    pub fn developer_tools() -> AzureResult<Self> {
        let credential = azure_identity::DeveloperToolsCredential::new(None)
            .map_err(|e| AzureError::Credential(e.to_string()))?;
        Ok(Self::token_credential(credential))
    }

    /// The SAS query string, if this is a SAS credential.
    pub fn sas_query(&self) -> Option<&str> {
        match self {
            Self::Sas(token) => Some(token.expose_secret()),
            _ => None,
        }
    }

    /// Whether this credential can produce bearer tokens.
    pub fn is_bearer(&self) -> bool {
        !matches!(self, Self::Sas(_))
    }

    /// Resolve an `Authorization` header value for the given scopes.
    ///
    /// Returns `Ok(None)` for SAS credentials, which authorize through the URL.
    pub async fn authorization(&self, scopes: &[&str]) -> AzureResult<Option<String>> {
        match self {
            Self::Sas(_) => Ok(None),
            Self::AccessToken(token) => Ok(Some(format!("Bearer {}", token.expose_secret()))),
            Self::TokenCredential { credential, cache } => {
                let key = scopes.join(" ");
                if let Some(token) = cache.get(&key).await {
                    return Ok(Some(format!("Bearer {}", token.expose_secret())));
                }

                tracing::debug!(scopes = %key, "acquiring access token");
                let access = credential
                    .get_token(scopes, None)
                    .await
                    .map_err(|e| AzureError::Credential(e.to_string()))?;

                let expires_at = u64::try_from(access.expires_on.unix_timestamp()).unwrap_or(0);
                let secret = SecretString::from(access.token.secret().to_string());
                let header = format!("Bearer {}", secret.expose_secret());
                cache.set(key, CachedToken::new(secret, expires_at)).await;
                Ok(Some(header))
            }
        }
    }

    /// Drop the cached token for `scopes`, forcing the next call for them to hit the credential.
    pub async fn invalidate(&self, scopes: &[&str]) {
        if let Self::TokenCredential { cache, .. } = self {
            cache.invalidate(&scopes.join(" ")).await;
        }
    }
}

impl std::fmt::Debug for AzureCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sas(_) => write!(f, "AzureCredential::Sas(****)"),
            Self::AccessToken(_) => write!(f, "AzureCredential::AccessToken(****)"),
            Self::TokenCredential { .. } => write!(f, "AzureCredential::TokenCredential"),
        }
    }
}

/// A token with its absolute expiry as a Unix timestamp.
#[derive(Clone)]
pub struct CachedToken {
    token: SecretString,
    expires_at: u64,
}

impl CachedToken {
    pub fn new(token: SecretString, expires_at: u64) -> Self {
        Self { token, expires_at }
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    pub fn is_expired(&self) -> bool {
        Self::now() >= self.expires_at
    }

    /// True once the token is inside the refresh margin.
    pub fn needs_refresh(&self) -> bool {
        Self::now() + TOKEN_REFRESH_MARGIN_SECS >= self.expires_at
    }
}

/// Scope-keyed cache of bearer tokens.
#[derive(Clone, Default)]
pub struct TokenCache {
    cache: Arc<RwLock<HashMap<String, CachedToken>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is still usable and not inside the refresh margin.
    pub async fn get(&self, key: &str) -> Option<SecretString> {
        let cache = self.cache.read().await;
        cache
            .get(key)
            .filter(|token| !token.needs_refresh())
            .map(|token| token.token.clone())
    }

    pub async fn set(&self, key: String, token: CachedToken) {
        let mut cache = self.cache.write().await;
        cache.insert(key, token);
    }

    pub async fn invalidate(&self, key: &str) {
        let mut cache = self.cache.write().await;
        cache.remove(key);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use azure_core::credentials::{AccessToken, TokenRequestOptions};
    use azure_core::time::{Duration, OffsetDateTime};
    use serial_test::serial;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Token credential that hands out numbered tokens and records requested scopes.
    #[derive(Debug, Default)]
    pub(crate) struct MockCredential {
        pub calls: AtomicU32,
        pub scopes: Mutex<Vec<String>>,
        pub lifetime_secs: i64,
    }

    impl MockCredential {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                lifetime_secs: 3600,
                ..Default::default()
            })
        }

        pub fn expiring_within(secs: i64) -> Arc<Self> {
            Arc::new(Self {
                lifetime_secs: secs,
                ..Default::default()
            })
        }
    }

    #[async_trait::async_trait]
    impl TokenCredential for MockCredential {
        async fn get_token(
            &self,
            scopes: &[&str],
            _options: Option<TokenRequestOptions<'_>>,
        ) -> azure_core::Result<AccessToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.scopes.lock().unwrap().push(scopes.join(" "));
            Ok(AccessToken::new(
                format!("token-{n}"),
                OffsetDateTime::now_utc() + Duration::seconds(self.lifetime_secs),
            ))
        }
    }

    #[test]
    fn sas_strips_leading_question_mark() {
        let cred = AzureCredential::sas("?sv=2022-11-02&sig=abc");
        assert_eq!(cred.sas_query(), Some("sv=2022-11-02&sig=abc"));
        assert!(!cred.is_bearer());
    }

    #[test]
    fn debug_hides_secrets() {
        let cred = AzureCredential::access_token("super-secret");
        let printed = format!("{:?}", cred);
        assert!(!printed.contains("super-secret"));
        assert_eq!(printed, "AzureCredential::AccessToken(****)");
    }

    #[tokio::test]
    async fn sas_has_no_authorization_header() {
        let cred = AzureCredential::sas("sig=abc");
        assert!(cred.authorization(&["scope"]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn access_token_is_sent_as_bearer() {
        let cred = AzureCredential::access_token("abc");
        let header = cred.authorization(&["scope"]).await.unwrap();
        assert_eq!(header.as_deref(), Some("Bearer abc"));
    }

    #[tokio::test]
    async fn token_credential_is_cached_per_scope() {
        let mock = MockCredential::new();
        let cred = AzureCredential::token_credential(mock.clone());

        let first = cred.authorization(&["https://vault.azure.net/.default"]).await.unwrap();
        let second = cred.authorization(&["https://vault.azure.net/.default"]).await.unwrap();
        let other = cred.authorization(&["https://storage.azure.com/.default"]).await.unwrap();

        assert_eq!(first.as_deref(), Some("Bearer token-1"));
        assert_eq!(second.as_deref(), Some("Bearer token-1"));
        assert_eq!(other.as_deref(), Some("Bearer token-2"));
        assert_eq!(mock.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn token_inside_refresh_margin_is_reacquired() {
        let mock = MockCredential::expiring_within(60);
        let cred = AzureCredential::token_credential(mock.clone());

        cred.authorization(&["s"]).await.unwrap();
        let again = cred.authorization(&["s"]).await.unwrap();

        assert_eq!(again.as_deref(), Some("Bearer token-2"));
        assert_eq!(mock.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_reacquire() {
        let mock = MockCredential::new();
        let cred = AzureCredential::token_credential(mock.clone());

        cred.authorization(&["s"]).await.unwrap();
        cred.authorization(&["t"]).await.unwrap();
        cred.invalidate(&["s"]).await;
        cred.authorization(&["s"]).await.unwrap();
        cred.authorization(&["t"]).await.unwrap();

        // Only the invalidated scope is fetched again.
        assert_eq!(mock.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn cached_token_expiry() {
        let past = CachedToken::new(SecretString::from("t".to_string()), 1);
        assert!(past.is_expired());
        assert!(past.needs_refresh());

        let future = CachedToken::new(SecretString::from("t".to_string()), CachedToken::now() + 3600);
        assert!(!future.is_expired());
        assert!(!future.needs_refresh());
    }

    #[test]
    #[serial]
    fn from_env_prefers_sas_token() {
        std::env::set_var(SAS_TOKEN_ENV, "sv=1&sig=x");
        std::env::set_var(ACCESS_TOKEN_ENV, "bearer");

        let cred = AzureCredential::from_env().expect("should resolve");
        assert!(matches!(cred, AzureCredential::Sas(_)));

        std::env::remove_var(SAS_TOKEN_ENV);
        std::env::remove_var(ACCESS_TOKEN_ENV);
    }

    #[test]
    #[serial]
    fn from_env_uses_access_token() {
        std::env::remove_var(SAS_TOKEN_ENV);
        std::env::set_var(ACCESS_TOKEN_ENV, "bearer");

        let cred = AzureCredential::from_env().expect("should resolve");
        assert!(matches!(cred, AzureCredential::AccessToken(_)));

        std::env::remove_var(ACCESS_TOKEN_ENV);
    }
}
