//! Microblog recent-search connector (client-credentials grant, token-based
//! pagination, engagement metrics carried through for scoring).

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use repwatch_core::{Platform, SubjectType};

use super::{Connector, FetchPage, RawItem, SubjectQuery};
use crate::credentials::CredentialManager;
use crate::error::IngestError;
use crate::transport::{check_response, read_json, retry_with_backoff, RetryPolicy};

const DEFAULT_API_BASE: &str = "https://api.microblog.example.com";
const DEFAULT_TOKEN_URL: &str = "https://api.microblog.example.com/oauth2/token";
const MAX_RESULTS: usize = 50;

pub(super) fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<TweetItem>,
    #[serde(default)]
    includes: Option<Includes>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<UserItem>,
}

#[derive(Debug, Deserialize)]
struct UserItem {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct Meta {
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TweetItem {
    id: String,
    text: String,
    author_id: Option<String>,
    created_at: Option<String>,
    public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    like_count: i64,
    #[serde(default)]
    retweet_count: i64,
    #[serde(default)]
    reply_count: i64,
}

/// One microblog post with the author handle already resolved.
#[derive(Debug, Clone)]
pub struct MicroblogPost {
    pub id: String,
    pub text: String,
    pub author: Option<String>,
    pub created_at: Option<String>,
    pub engagement_count: i64,
}

pub struct MicroblogConnector {
    http: reqwest::Client,
    credentials: Arc<CredentialManager>,
    policy: RetryPolicy,
    api_base: String,
}

impl MicroblogConnector {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        credentials: Arc<CredentialManager>,
        policy: RetryPolicy,
    ) -> Self {
        Self::with_api_base(http, credentials, policy, DEFAULT_API_BASE)
    }

    /// Points the connector at a custom API base (wiremock in tests).
    #[must_use]
    pub fn with_api_base(
        http: reqwest::Client,
        credentials: Arc<CredentialManager>,
        policy: RetryPolicy,
        api_base: &str,
    ) -> Self {
        Self {
            http,
            credentials,
            policy,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Handle subjects search both addressed (`@handle`) and named forms;
    /// keyword subjects search the quoted phrase.
    fn build_query(subject: &SubjectQuery) -> String {
        match subject.subject_type {
            SubjectType::Handle => {
                let handle = subject.value.trim_start_matches('@');
                format!("@{handle} OR {handle}")
            }
            SubjectType::Keyword => format!("\"{}\"", subject.value),
        }
    }

    async fn search_page(
        &self,
        token: &str,
        query: &str,
        cursor: Option<&str>,
    ) -> Result<SearchResponse, IngestError> {
        let mut params: Vec<(&str, String)> = vec![
            ("query", query.to_string()),
            ("max_results", MAX_RESULTS.to_string()),
            ("tweet.fields", "created_at,author_id,public_metrics".to_string()),
            ("expansions", "author_id".to_string()),
            ("user.fields", "username".to_string()),
        ];
        if let Some(next_token) = cursor {
            params.push(("next_token", next_token.to_string()));
        }

        let endpoint = format!("{}/2/tweets/search/recent", self.api_base);
        let response = retry_with_backoff(&self.policy, true, || {
            let req = self
                .http
                .get(&endpoint)
                .bearer_auth(token)
                .query(&params);
            async move {
                let resp = req.send().await?;
                check_response(Platform::Microblog, "microblog recent search", resp)
            }
        })
        .await?;

        read_json("microblog search body", response).await
    }
}

#[async_trait::async_trait]
impl Connector for MicroblogConnector {
    fn platform(&self) -> Platform {
        Platform::Microblog
    }

    async fn fetch_mentions(
        &self,
        subject: &SubjectQuery,
        cursor: Option<&str>,
    ) -> Result<FetchPage, IngestError> {
        let query = Self::build_query(subject);
        let response = self
            .credentials
            .with_auth_retry(Platform::Microblog, |token| {
                let query = query.clone();
                async move { self.search_page(&token, &query, cursor).await }
            })
            .await?;

        let usernames: HashMap<String, String> = response
            .includes
            .map(|inc| {
                inc.users
                    .into_iter()
                    .map(|u| (u.id, u.username))
                    .collect()
            })
            .unwrap_or_default();

        let items = response
            .data
            .into_iter()
            .map(|tweet| {
                let author = tweet
                    .author_id
                    .as_ref()
                    .and_then(|id| usernames.get(id).cloned());
                let metrics = tweet.public_metrics.unwrap_or_default();
                RawItem::Microblog(MicroblogPost {
                    id: tweet.id,
                    text: tweet.text,
                    author,
                    created_at: tweet.created_at,
                    engagement_count: metrics.like_count
                        + metrics.retweet_count
                        + metrics.reply_count,
                })
            })
            .collect();

        Ok(FetchPage {
            items,
            next_cursor: response.meta.and_then(|m| m.next_token),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::ClientCredentialsGrant;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn no_backoff() -> RetryPolicy {
        RetryPolicy {
            max_retries: 0,
            backoff_base_ms: 0,
            retry_non_idempotent: false,
        }
    }

    async fn connector_for(server: &MockServer) -> MicroblogConnector {
        let mut manager = CredentialManager::new(reqwest::Client::new(), no_backoff());
        manager.register(Arc::new(ClientCredentialsGrant {
            platform: Platform::Microblog,
            token_url: format!("{}/oauth2/token", server.uri()),
            client_id: "id".into(),
            client_secret: "secret".into(),
        }));
        MicroblogConnector::with_api_base(
            reqwest::Client::new(),
            Arc::new(manager),
            no_backoff(),
            &server.uri(),
        )
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok",
                "expires_in": 3600,
            })))
            .mount(server)
            .await;
    }

    fn handle_subject(value: &str) -> SubjectQuery {
        SubjectQuery {
            value: value.to_string(),
            subject_type: SubjectType::Handle,
            is_competitor: false,
        }
    }

    #[test]
    fn handle_query_includes_addressed_and_bare_forms() {
        assert_eq!(
            MicroblogConnector::build_query(&handle_subject("acme")),
            "@acme OR acme"
        );
        assert_eq!(
            MicroblogConnector::build_query(&handle_subject("@acme")),
            "@acme OR acme"
        );
    }

    #[tokio::test]
    async fn maps_posts_and_resolves_authors() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/2/tweets/search/recent"))
            .and(query_param("query", "@acme OR acme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{
                    "id": "111",
                    "text": "acme support is terrible",
                    "author_id": "u1",
                    "created_at": "2026-08-01T12:00:00Z",
                    "public_metrics": { "like_count": 5, "retweet_count": 2, "reply_count": 1 },
                }],
                "includes": { "users": [{ "id": "u1", "username": "angry_customer" }] },
                "meta": { "result_count": 1, "next_token": "page-2" },
            })))
            .mount(&server)
            .await;

        let connector = connector_for(&server).await;
        let page = connector
            .fetch_mentions(&handle_subject("acme"), None)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_cursor.as_deref(), Some("page-2"));
        let RawItem::Microblog(post) = &page.items[0] else {
            panic!("expected a microblog item");
        };
        assert_eq!(post.author.as_deref(), Some("angry_customer"));
        assert_eq!(post.engagement_count, 8);
    }

    #[tokio::test]
    async fn passes_cursor_as_next_token() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/2/tweets/search/recent"))
            .and(query_param("next_token", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [],
                "meta": { "result_count": 0 },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let connector = connector_for(&server).await;
        let page = connector
            .fetch_mentions(&handle_subject("acme"), Some("page-2"))
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }
}
