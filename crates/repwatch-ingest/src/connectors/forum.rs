//! Forum search connector (OAuth password grant, listing-style pagination).

use std::sync::Arc;

use serde::Deserialize;

use repwatch_core::{ForumCredentials, Platform};

use super::query::{build_query_variants, build_subject_terms, mentions_subject};
use super::{Connector, FetchPage, RawItem, SubjectQuery};
use crate::credentials::CredentialManager;
use crate::error::IngestError;
use crate::transport::{check_response, read_json, retry_with_backoff, RetryPolicy};

const DEFAULT_API_BASE: &str = "https://oauth.forum.example.com";
const DEFAULT_TOKEN_URL: &str = "https://www.forum.example.com/api/v1/access_token";
const PAGE_LIMIT: usize = 50;

pub(super) fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

/// Search listing envelope.
#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<ListingChild>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: ForumPost,
}

/// One forum post as returned by the search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ForumPost {
    pub title: Option<String>,
    pub selftext: Option<String>,
    pub permalink: Option<String>,
    pub community: Option<String>,
    pub author: Option<String>,
    pub ups: Option<i64>,
    pub created_utc: Option<f64>,
}

pub struct ForumConnector {
    http: reqwest::Client,
    credentials: Arc<CredentialManager>,
    policy: RetryPolicy,
    api_base: String,
    communities: Vec<String>,
    user_agent: String,
}

impl ForumConnector {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        credentials: Arc<CredentialManager>,
        policy: RetryPolicy,
        creds: &ForumCredentials,
        user_agent: &str,
    ) -> Self {
        Self::with_api_base(http, credentials, policy, creds, user_agent, DEFAULT_API_BASE)
    }

    /// Points the connector at a custom API base (wiremock in tests).
    #[must_use]
    pub fn with_api_base(
        http: reqwest::Client,
        credentials: Arc<CredentialManager>,
        policy: RetryPolicy,
        creds: &ForumCredentials,
        user_agent: &str,
        api_base: &str,
    ) -> Self {
        let communities = creds
            .communities
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        Self {
            http,
            credentials,
            policy,
            api_base: api_base.trim_end_matches('/').to_string(),
            communities,
            user_agent: user_agent.to_string(),
        }
    }

    fn search_endpoint(&self) -> String {
        if self.communities.is_empty() {
            format!("{}/search", self.api_base)
        } else {
            format!("{}/r/{}/search", self.api_base, self.communities.join("+"))
        }
    }

    async fn search_page(
        &self,
        token: &str,
        query: &str,
        cursor: Option<&str>,
    ) -> Result<Listing, IngestError> {
        let mut params: Vec<(&str, String)> = vec![
            ("q", query.to_string()),
            (
                "restrict_sr",
                if self.communities.is_empty() {
                    "false"
                } else {
                    "true"
                }
                .to_string(),
            ),
            ("sort", "new".to_string()),
            ("limit", PAGE_LIMIT.to_string()),
            ("type", "link".to_string()),
        ];
        if let Some(after) = cursor {
            params.push(("after", after.to_string()));
        }

        let endpoint = self.search_endpoint();
        let response = retry_with_backoff(&self.policy, true, || {
            let req = self
                .http
                .get(&endpoint)
                .bearer_auth(token)
                .header(reqwest::header::USER_AGENT, &self.user_agent)
                .query(&params);
            async move {
                let resp = req.send().await?;
                check_response(Platform::Forum, "forum search", resp)
            }
        })
        .await?;

        read_json("forum search listing", response).await
    }
}

#[async_trait::async_trait]
impl Connector for ForumConnector {
    fn platform(&self) -> Platform {
        Platform::Forum
    }

    /// Searches the configured communities with the subject's query-variant
    /// strategy list, returning the first variant that produces relevant
    /// results. Pages resume against the first variant only, since the
    /// cursor is variant-specific.
    async fn fetch_mentions(
        &self,
        subject: &SubjectQuery,
        cursor: Option<&str>,
    ) -> Result<FetchPage, IngestError> {
        let terms = build_subject_terms(&subject.value);
        let variants = if cursor.is_some() {
            build_query_variants(&subject.value)
                .into_iter()
                .take(1)
                .collect()
        } else {
            build_query_variants(&subject.value)
        };

        for (i, variant) in variants.iter().enumerate() {
            let listing = self
                .credentials
                .with_auth_retry(Platform::Forum, |token| {
                    let variant = variant.clone();
                    async move { self.search_page(&token, &variant, cursor).await }
                })
                .await?;

            let next_cursor = listing.data.after.clone();
            let items: Vec<RawItem> = listing
                .data
                .children
                .into_iter()
                .map(|child| child.data)
                .filter(|post| {
                    let haystack = format!(
                        "{} {}",
                        post.title.as_deref().unwrap_or_default(),
                        post.selftext.as_deref().unwrap_or_default()
                    );
                    mentions_subject(&haystack, &terms)
                })
                .map(RawItem::Forum)
                .collect();

            if !items.is_empty() {
                tracing::debug!(
                    subject = %subject.value,
                    variant_index = i,
                    count = items.len(),
                    "forum search matched"
                );
                return Ok(FetchPage { items, next_cursor });
            }
        }

        Ok(FetchPage::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::PasswordGrant;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn no_backoff() -> RetryPolicy {
        RetryPolicy {
            max_retries: 0,
            backoff_base_ms: 0,
            retry_non_idempotent: false,
        }
    }

    fn forum_creds(communities: &str) -> ForumCredentials {
        ForumCredentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
            username: "bot".into(),
            password: "pw".into(),
            communities: communities.into(),
        }
    }

    async fn connector_for(server: &MockServer, communities: &str) -> ForumConnector {
        let mut manager = CredentialManager::new(reqwest::Client::new(), no_backoff());
        manager.register(Arc::new(PasswordGrant {
            platform: Platform::Forum,
            token_url: format!("{}/api/v1/access_token", server.uri()),
            client_id: "id".into(),
            client_secret: "secret".into(),
            username: "bot".into(),
            password: "pw".into(),
            user_agent: "repwatch-test".into(),
        }));
        ForumConnector::with_api_base(
            reqwest::Client::new(),
            Arc::new(manager),
            no_backoff(),
            &forum_creds(communities),
            "repwatch-test",
            &server.uri(),
        )
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok",
                "expires_in": 3600,
            })))
            .mount(server)
            .await;
    }

    fn listing_with(posts: serde_json::Value, after: Option<&str>) -> serde_json::Value {
        serde_json::json!({ "data": { "children": posts, "after": after } })
    }

    fn subject(value: &str) -> SubjectQuery {
        SubjectQuery {
            value: value.to_string(),
            subject_type: repwatch_core::SubjectType::Keyword,
            is_competitor: false,
        }
    }

    #[tokio::test]
    async fn restricts_search_to_configured_communities() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/r/coffee+espresso/search"))
            .and(query_param("restrict_sr", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing_with(
                serde_json::json!([{ "data": {
                    "title": "Blue Bottle opened downtown",
                    "selftext": "",
                    "permalink": "/r/coffee/comments/abc/post",
                    "community": "coffee",
                    "author": "someone",
                    "ups": 12,
                    "created_utc": 1700000000.0,
                }}]),
                None,
            )))
            .mount(&server)
            .await;

        let connector = connector_for(&server, "coffee,espresso").await;
        let page = connector
            .fetch_mentions(&subject("blue bottle"), None)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn falls_through_variants_until_results() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        // Quoted variant: empty listing.
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "\"blue-bottle\""))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(listing_with(serde_json::json!([]), None)),
            )
            .mount(&server)
            .await;
        // Bare variant: empty listing.
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "blue-bottle"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(listing_with(serde_json::json!([]), None)),
            )
            .mount(&server)
            .await;
        // De-hyphenated variant: one post.
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "blue bottle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing_with(
                serde_json::json!([{ "data": {
                    "title": "blue bottle latte",
                    "selftext": "so good",
                    "permalink": "/r/coffee/comments/xyz/post",
                    "community": "coffee",
                    "author": "fan",
                    "ups": 3,
                    "created_utc": 1700000100.0,
                }}]),
                Some("t3_next"),
            )))
            .mount(&server)
            .await;

        let connector = connector_for(&server, "").await;
        let page = connector
            .fetch_mentions(&subject("blue-bottle"), None)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1, "third variant should have matched");
        assert_eq!(page.next_cursor.as_deref(), Some("t3_next"));
    }

    #[tokio::test]
    async fn irrelevant_posts_are_filtered_out() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing_with(
                serde_json::json!([{ "data": {
                    "title": "my uncle's iced tea recipe",
                    "selftext": "",
                    "permalink": "/r/tea/comments/zzz/post",
                    "community": "tea",
                    "author": "a",
                    "ups": 1,
                    "created_utc": 1700000000.0,
                }}]),
                None,
            )))
            .mount(&server)
            .await;

        let connector = connector_for(&server, "").await;
        let page = connector
            .fetch_mentions(&subject("uncle arnies"), None)
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn rate_limit_surfaces_with_retry_after() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "120"))
            .mount(&server)
            .await;

        let connector = connector_for(&server, "").await;
        let result = connector.fetch_mentions(&subject("acme"), None).await;
        assert!(matches!(
            result,
            Err(IngestError::RateLimited {
                platform: Platform::Forum,
                retry_after_secs: 120,
            })
        ));
    }
}
