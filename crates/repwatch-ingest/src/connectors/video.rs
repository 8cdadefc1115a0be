//! Video comment-listing connector (refresh-token grant).
//!
//! A subject on this platform is a channel id: the connector lists the
//! channel's recent videos, then the comment threads of each. The cursor is
//! the video-search page token; comment threads are fetched to the
//! provider's page limit per video.

use std::sync::Arc;

use serde::Deserialize;

use repwatch_core::Platform;

use super::{Connector, FetchPage, RawItem, SubjectQuery};
use crate::credentials::CredentialManager;
use crate::error::IngestError;
use crate::transport::{check_response, read_json, retry_with_backoff, RetryPolicy};

const DEFAULT_API_BASE: &str = "https://api.video.example.com";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.video.example.com/token";
const VIDEO_PAGE_SIZE: usize = 10;
const COMMENTS_PER_VIDEO: usize = 50;

pub(super) fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

#[derive(Debug, Deserialize)]
struct VideoSearchResponse {
    #[serde(default)]
    items: Vec<VideoSearchItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoSearchItem {
    id: VideoId,
}

#[derive(Debug, Deserialize)]
struct VideoId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentThreadsResponse {
    #[serde(default)]
    items: Vec<CommentThread>,
}

#[derive(Debug, Deserialize)]
struct CommentThread {
    id: String,
    snippet: ThreadSnippet,
}

#[derive(Debug, Deserialize)]
struct ThreadSnippet {
    #[serde(rename = "topLevelComment")]
    top_level_comment: TopLevelComment,
}

#[derive(Debug, Deserialize)]
struct TopLevelComment {
    snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
struct CommentSnippet {
    #[serde(rename = "textDisplay")]
    text_display: Option<String>,
    #[serde(rename = "authorDisplayName")]
    author_display_name: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(rename = "likeCount", default)]
    like_count: i64,
}

/// One top-level comment on one of the subject channel's videos.
#[derive(Debug, Clone)]
pub struct VideoComment {
    pub comment_id: String,
    pub video_id: String,
    pub text: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<String>,
    pub like_count: i64,
}

pub struct VideoConnector {
    http: reqwest::Client,
    credentials: Arc<CredentialManager>,
    policy: RetryPolicy,
    api_base: String,
}

impl VideoConnector {
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

    async fn list_videos(
        &self,
        token: &str,
        channel_id: &str,
        cursor: Option<&str>,
    ) -> Result<VideoSearchResponse, IngestError> {
        let mut params: Vec<(&str, String)> = vec![
            ("part", "snippet".to_string()),
            ("channelId", channel_id.to_string()),
            ("maxResults", VIDEO_PAGE_SIZE.to_string()),
            ("order", "date".to_string()),
            ("type", "video".to_string()),
        ];
        if let Some(page_token) = cursor {
            params.push(("pageToken", page_token.to_string()));
        }

        let endpoint = format!("{}/v3/search", self.api_base);
        let response = retry_with_backoff(&self.policy, true, || {
            let req = self
                .http
                .get(&endpoint)
                .bearer_auth(token)
                .query(&params);
            async move {
                let resp = req.send().await?;
                check_response(Platform::Video, "video search", resp)
            }
        })
        .await?;
        read_json("video search body", response).await
    }

    async fn list_comment_threads(
        &self,
        token: &str,
        video_id: &str,
    ) -> Result<CommentThreadsResponse, IngestError> {
        let params: Vec<(&str, String)> = vec![
            ("part", "snippet".to_string()),
            ("videoId", video_id.to_string()),
            ("maxResults", COMMENTS_PER_VIDEO.to_string()),
        ];

        let endpoint = format!("{}/v3/commentThreads", self.api_base);
        let response = retry_with_backoff(&self.policy, true, || {
            let req = self
                .http
                .get(&endpoint)
                .bearer_auth(token)
                .query(&params);
            async move {
                let resp = req.send().await?;
                check_response(Platform::Video, "video comment threads", resp)
            }
        })
        .await?;
        read_json("video comment threads body", response).await
    }
}

#[async_trait::async_trait]
impl Connector for VideoConnector {
    fn platform(&self) -> Platform {
        Platform::Video
    }

    async fn fetch_mentions(
        &self,
        subject: &SubjectQuery,
        cursor: Option<&str>,
    ) -> Result<FetchPage, IngestError> {
        let channel_id = subject.value.clone();

        let search = self
            .credentials
            .with_auth_retry(Platform::Video, |token| {
                let channel_id = channel_id.clone();
                async move { self.list_videos(&token, &channel_id, cursor).await }
            })
            .await?;

        let video_ids: Vec<String> = search
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect();

        let mut items = Vec::new();
        for video_id in &video_ids {
            let threads = self
                .credentials
                .with_auth_retry(Platform::Video, |token| {
                    let video_id = video_id.clone();
                    async move { self.list_comment_threads(&token, &video_id).await }
                })
                .await?;

            for thread in threads.items {
                let snippet = thread.snippet.top_level_comment.snippet;
                items.push(RawItem::Video(VideoComment {
                    comment_id: thread.id,
                    video_id: video_id.clone(),
                    text: snippet.text_display,
                    author: snippet.author_display_name,
                    published_at: snippet.published_at,
                    like_count: snippet.like_count,
                }));
            }
        }

        tracing::debug!(
            channel = %subject.value,
            videos = video_ids.len(),
            comments = items.len(),
            "collected video comments"
        );

        Ok(FetchPage {
            items,
            next_cursor: search.next_page_token,
        })
    }
}
