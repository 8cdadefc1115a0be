//! Platform connectors: one implementation per external source, all behind
//! the uniform [`Connector`] capability so the orchestrator has a single
//! code path.

mod forum;
mod microblog;
pub(crate) mod query;
mod reviews;
mod video;

pub use forum::{ForumConnector, ForumPost};
pub use microblog::{MicroblogConnector, MicroblogPost};
pub use reviews::{PlaceReview, PlaceReviewConnector};
pub use video::{VideoComment, VideoConnector};

use std::sync::Arc;

use async_trait::async_trait;

use repwatch_core::{AppConfig, Platform, SubjectType};

use crate::credentials::{
    ClientCredentialsGrant, CredentialManager, PasswordGrant, RefreshTokenGrant,
};
use crate::error::IngestError;
use crate::transport::RetryPolicy;

/// One tracked subject, as seen by connectors.
#[derive(Debug, Clone)]
pub struct SubjectQuery {
    pub value: String,
    pub subject_type: SubjectType,
    pub is_competitor: bool,
}

/// One raw platform item, prior to normalization.
#[derive(Debug, Clone)]
pub enum RawItem {
    Forum(ForumPost),
    Microblog(MicroblogPost),
    Video(VideoComment),
    PlaceReview(PlaceReview),
}

/// One page of raw items plus the platform-native continuation cursor.
#[derive(Debug, Default)]
pub struct FetchPage {
    pub items: Vec<RawItem>,
    pub next_cursor: Option<String>,
}

/// Uniform mention-fetch capability implemented by every platform.
#[async_trait]
pub trait Connector: Send + Sync {
    fn platform(&self) -> Platform;

    /// Fetches recent items matching the subject, optionally resuming from
    /// a cursor returned by a previous page.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::RateLimited`] when the platform asks us to
    /// back off (the orchestrator suspends the platform for the cycle), and
    /// other [`IngestError`] variants for transport/auth/parse failures.
    async fn fetch_mentions(
        &self,
        subject: &SubjectQuery,
        cursor: Option<&str>,
    ) -> Result<FetchPage, IngestError>;
}

/// Builds the connector set for every platform enabled in config, wiring
/// each platform's grant flow into the shared credential manager.
///
/// Returns the connectors together with the manager (callers keep it alive
/// for the process lifetime).
#[must_use]
pub fn build_connectors(
    config: &AppConfig,
    http: &reqwest::Client,
) -> (Vec<Box<dyn Connector>>, Arc<CredentialManager>) {
    let policy = RetryPolicy {
        max_retries: config.fetch_max_retries,
        backoff_base_ms: config.fetch_backoff_base_ms,
        retry_non_idempotent: false,
    };

    let mut manager = CredentialManager::new(http.clone(), policy);
    let mut connectors: Vec<Box<dyn Connector>> = Vec::new();

    for platform in &config.platforms {
        match platform {
            Platform::Forum => {
                if let Some(creds) = &config.forum {
                    manager.register(Arc::new(PasswordGrant {
                        platform: Platform::Forum,
                        token_url: forum::default_token_url(),
                        client_id: creds.client_id.clone(),
                        client_secret: creds.client_secret.clone(),
                        username: creds.username.clone(),
                        password: creds.password.clone(),
                        user_agent: config.fetch_user_agent.clone(),
                    }));
                }
            }
            Platform::Microblog => {
                if let Some(creds) = &config.microblog {
                    manager.register(Arc::new(ClientCredentialsGrant {
                        platform: Platform::Microblog,
                        token_url: microblog::default_token_url(),
                        client_id: creds.client_id.clone(),
                        client_secret: creds.client_secret.clone(),
                    }));
                }
            }
            Platform::Video => {
                if let Some(creds) = &config.video {
                    manager.register(Arc::new(RefreshTokenGrant {
                        platform: Platform::Video,
                        token_url: video::default_token_url(),
                        client_id: creds.client_id.clone(),
                        client_secret: creds.client_secret.clone(),
                        refresh_token: creds.refresh_token.clone(),
                    }));
                }
            }
            Platform::PlaceReview => {}
        }
    }

    let manager = Arc::new(manager);

    for platform in &config.platforms {
        match platform {
            Platform::Forum => {
                if let Some(creds) = &config.forum {
                    connectors.push(Box::new(ForumConnector::new(
                        http.clone(),
                        Arc::clone(&manager),
                        policy,
                        creds,
                        &config.fetch_user_agent,
                    )));
                }
            }
            Platform::Microblog => {
                if config.microblog.is_some() {
                    connectors.push(Box::new(MicroblogConnector::new(
                        http.clone(),
                        Arc::clone(&manager),
                        policy,
                    )));
                }
            }
            Platform::Video => {
                if config.video.is_some() {
                    connectors.push(Box::new(VideoConnector::new(
                        http.clone(),
                        Arc::clone(&manager),
                        policy,
                    )));
                }
            }
            Platform::PlaceReview => {
                if let Some(creds) = &config.place_review {
                    connectors.push(Box::new(PlaceReviewConnector::new(
                        http.clone(),
                        policy,
                        creds.api_key.clone(),
                    )));
                }
            }
        }
    }

    (connectors, manager)
}
