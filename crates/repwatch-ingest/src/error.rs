use repwatch_core::Platform;
use thiserror::Error;

/// Errors produced while fetching, normalizing, or classifying mentions.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform rejected our bearer token (HTTP 401). Terminal after a
    /// single re-acquire attempt in [`crate::CredentialManager`].
    #[error("authorization rejected by {platform}")]
    Auth { platform: Platform },

    /// No token grant registered for the platform; a wiring error at startup.
    #[error("no credential grant registered for {0}")]
    NoGrant(Platform),

    /// The platform asked us to back off (HTTP 429 or provider equivalent).
    /// The orchestrator suspends the platform for the rest of the cycle.
    #[error("{platform} rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        platform: Platform,
        retry_after_secs: u64,
    },

    /// Non-2xx HTTP status that is neither 401 nor 429.
    #[error("unexpected status {status} from {context}")]
    UnexpectedStatus { context: String, status: u16 },

    /// The provider returned 200 with an application-level error payload.
    #[error("{platform} API error: {message}")]
    Api { platform: Platform, message: String },

    /// The response body could not be deserialized into the expected shape.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The classification service broke its label contract. Never surfaced
    /// to callers: the classifier falls back to keyword scoring instead.
    #[error("classifier error: {0}")]
    Classifier(String),

    /// A single raw item could not be turned into a mention. Skipped and
    /// counted by the batch normalizer, never fatal to a run.
    #[error("normalization error: {0}")]
    Normalization(String),
}
