//! Mention ingestion: platform connectors, credential management, sentiment
//! classification, and crisis scoring.
//!
//! Everything outbound goes through [`transport`], so retry and backoff
//! policy is uniform across platforms and testable on its own.

pub mod classify;
pub mod connectors;
pub mod credentials;
pub mod error;
pub mod normalize;
pub mod scorer;
pub mod transport;

pub use classify::SentimentClassifier;
pub use connectors::{build_connectors, Connector, FetchPage, RawItem, SubjectQuery};
pub use credentials::{CachedToken, CredentialManager, TokenGrant};
pub use error::IngestError;
pub use normalize::{normalize, normalize_batch, NewMention};
pub use transport::RetryPolicy;
