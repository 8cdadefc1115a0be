//! Place-review connector (API-key auth, no pagination; the provider
//! returns a bounded review set per place).

use serde::Deserialize;

use repwatch_core::Platform;

use super::{Connector, FetchPage, RawItem, SubjectQuery};
use crate::error::IngestError;
use crate::transport::{check_response, read_json, retry_with_backoff, RetryPolicy};

const DEFAULT_API_BASE: &str = "https://places.example.com";

#[derive(Debug, Deserialize)]
struct PlaceDetailsResponse {
    status: String,
    #[serde(default)]
    result: Option<PlaceDetailsResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceDetailsResult {
    #[serde(default)]
    reviews: Vec<RawReview>,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    author_name: Option<String>,
    rating: Option<i32>,
    text: Option<String>,
    time: Option<i64>,
}

/// One review of the subject place.
#[derive(Debug, Clone)]
pub struct PlaceReview {
    pub place_id: String,
    pub author_name: Option<String>,
    pub rating: Option<i32>,
    pub text: Option<String>,
    pub time: Option<i64>,
}

pub struct PlaceReviewConnector {
    http: reqwest::Client,
    policy: RetryPolicy,
    api_key: String,
    api_base: String,
}

impl PlaceReviewConnector {
    #[must_use]
    pub fn new(http: reqwest::Client, policy: RetryPolicy, api_key: String) -> Self {
        Self::with_api_base(http, policy, api_key, DEFAULT_API_BASE)
    }

    /// Points the connector at a custom API base (wiremock in tests).
    #[must_use]
    pub fn with_api_base(
        http: reqwest::Client,
        policy: RetryPolicy,
        api_key: String,
        api_base: &str,
    ) -> Self {
        Self {
            http,
            policy,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Connector for PlaceReviewConnector {
    fn platform(&self) -> Platform {
        Platform::PlaceReview
    }

    /// The subject value is the provider's place id.
    async fn fetch_mentions(
        &self,
        subject: &SubjectQuery,
        _cursor: Option<&str>,
    ) -> Result<FetchPage, IngestError> {
        let endpoint = format!("{}/api/place/details/json", self.api_base);
        let params: Vec<(&str, String)> = vec![
            ("place_id", subject.value.clone()),
            ("fields", "reviews".to_string()),
            ("key", self.api_key.clone()),
        ];

        let response = retry_with_backoff(&self.policy, true, || {
            let req = self.http.get(&endpoint).query(&params);
            async move {
                let resp = req.send().await?;
                check_response(Platform::PlaceReview, "place details", resp)
            }
        })
        .await?;

        let details: PlaceDetailsResponse = read_json("place details body", response).await?;

        // The provider signals errors in-band with HTTP 200.
        match details.status.as_str() {
            "OK" | "ZERO_RESULTS" => {}
            "OVER_QUERY_LIMIT" => {
                return Err(IngestError::RateLimited {
                    platform: Platform::PlaceReview,
                    retry_after_secs: 60,
                });
            }
            other => {
                return Err(IngestError::Api {
                    platform: Platform::PlaceReview,
                    message: details
                        .error_message
                        .unwrap_or_else(|| other.to_string()),
                });
            }
        }

        let items = details
            .result
            .map(|r| r.reviews)
            .unwrap_or_default()
            .into_iter()
            .map(|review| {
                RawItem::PlaceReview(PlaceReview {
                    place_id: subject.value.clone(),
                    author_name: review.author_name,
                    rating: review.rating,
                    text: review.text,
                    time: review.time,
                })
            })
            .collect();

        Ok(FetchPage {
            items,
            next_cursor: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn no_backoff() -> RetryPolicy {
        RetryPolicy {
            max_retries: 0,
            backoff_base_ms: 0,
            retry_non_idempotent: false,
        }
    }

    fn place_subject(place_id: &str) -> SubjectQuery {
        SubjectQuery {
            value: place_id.to_string(),
            subject_type: repwatch_core::SubjectType::Handle,
            is_competitor: false,
        }
    }

    #[tokio::test]
    async fn fetches_reviews_with_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/place/details/json"))
            .and(query_param("place_id", "place-1"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "result": { "reviews": [{
                    "author_name": "Pat",
                    "rating": 1,
                    "text": "terrible service, never again",
                    "time": 1700000000,
                }]},
            })))
            .mount(&server)
            .await;

        let connector = PlaceReviewConnector::with_api_base(
            reqwest::Client::new(),
            no_backoff(),
            "test-key".into(),
            &server.uri(),
        );
        let page = connector
            .fetch_mentions(&place_subject("place-1"), None)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn over_query_limit_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/place/details/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OVER_QUERY_LIMIT",
            })))
            .mount(&server)
            .await;

        let connector = PlaceReviewConnector::with_api_base(
            reqwest::Client::new(),
            no_backoff(),
            "test-key".into(),
            &server.uri(),
        );
        let result = connector.fetch_mentions(&place_subject("place-1"), None).await;
        assert!(matches!(
            result,
            Err(IngestError::RateLimited {
                platform: Platform::PlaceReview,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn provider_error_status_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/place/details/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "REQUEST_DENIED",
                "error_message": "The provided API key is invalid.",
            })))
            .mount(&server)
            .await;

        let connector = PlaceReviewConnector::with_api_base(
            reqwest::Client::new(),
            no_backoff(),
            "bad-key".into(),
            &server.uri(),
        );
        let result = connector.fetch_mentions(&place_subject("place-1"), None).await;
        assert!(
            matches!(result, Err(IngestError::Api { ref message, .. }) if message.contains("invalid"))
        );
    }

    #[tokio::test]
    async fn zero_results_is_an_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/place/details/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ZERO_RESULTS",
            })))
            .mount(&server)
            .await;

        let connector = PlaceReviewConnector::with_api_base(
            reqwest::Client::new(),
            no_backoff(),
            "test-key".into(),
            &server.uri(),
        );
        let page = connector
            .fetch_mentions(&place_subject("place-1"), None)
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }
}
