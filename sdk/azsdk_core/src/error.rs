use thiserror::Error;

/// Errors that can occur when interacting with an Azure service.
#[derive(Error, Debug)]
pub enum AzureError {
    /// The request failed due to an HTTP error.
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// The requested resource does not exist (HTTP 404).
    #[error("Resource not found: {message}")]
    ResourceNotFound { message: String },

    /// The resource already exists or is in a conflicting state (HTTP 409).
    #[error("Resource conflict: {message}")]
    ResourceExists { message: String },

    /// A precondition such as `If-Match` failed (HTTP 412).
    #[error("Resource modified: {message}")]
    ResourceModified { message: String },

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A credential could not produce a token.
    #[error("Credential error: {0}")]
    Credential(String),

    /// A `WWW-Authenticate` challenge was missing or malformed.
    #[error("Invalid authentication challenge: {0}")]
    Challenge(String),

    /// The request payload could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request failed at the transport level.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint URL is invalid.
    #[error("Invalid endpoint URL: {message}")]
    InvalidEndpoint {
        message: String,
        #[source]
        source: Option<url::ParseError>,
    },

    /// A required configuration value is missing.
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// The API returned an error response.
    #[error("API error ({code}): {message}")]
    Api { code: String, message: String },

    /// A streamed response body failed.
    #[error("Stream error: {0}")]
    Stream(String),

    /// A request builder was given invalid input.
    #[error("Invalid request: {0}")]
    Builder(String),
}

impl AzureError {
    /// Create an [`AzureError::Http`] error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Create an [`AzureError::InvalidEndpoint`] error with no underlying parse error.
    pub fn invalid_endpoint(message: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            message: message.into(),
            source: None,
        }
    }

    /// Create an [`AzureError::InvalidEndpoint`] error wrapping a URL parse error.
    pub fn invalid_endpoint_with_source(message: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidEndpoint {
            message: message.into(),
            source: Some(source),
        }
    }

    /// The HTTP status code associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::ResourceNotFound { .. } => Some(404),
            Self::ResourceExists { .. } => Some(409),
            Self::ResourceModified { .. } => Some(412),
            Self::Auth(_) => Some(401),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether this error means the target resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Result type alias for azsdk operations.
pub type AzureResult<T> = std::result::Result<T, AzureError>;
