//! Content provider errors

use thiserror::Error;

/// Failure talking to the content service
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection, TLS or timeout failure. The underlying `reqwest::Error`
    /// is preserved.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{url} answered with HTTP {status}")]
    Status { status: u16, url: String },

    /// The requested document does not exist
    #[error("no `{document_type}` document with uid `{uid}`")]
    NotFound { document_type: String, uid: String },

    /// The response body does not have the expected shape
    #[error("malformed response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("the content API did not advertise a master ref")]
    NoMasterRef,

    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("content provider endpoint is not configured (set provider.endpoint or PRISMIC_ENDPOINT)")]
    NotConfigured,
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Network(e) if e.is_timeout())
    }
}
