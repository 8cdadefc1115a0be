//! Chat webhook channel: one JSON `{"text": ...}` POST per alert.

use async_trait::async_trait;
use serde_json::json;

use crate::{render_plain, AlertChannel, ChannelError, CrisisAlert};

pub struct WebhookChannel {
    http: reqwest::Client,
}

impl WebhookChannel {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, alert: &CrisisAlert, recipient: &str) -> Result<(), ChannelError> {
        let payload = json!({ "text": render_plain(alert) });
        let response = self.http.post(recipient).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use repwatch_core::Severity;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert() -> CrisisAlert {
        CrisisAlert {
            subject: "acme".to_string(),
            platform: "microblog".to_string(),
            severity: Severity::Critical,
            crisis_score: 0.9,
            text: "acme is a scam".to_string(),
            external_ref: "999".to_string(),
            author: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn posts_plain_text_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_string_contains("Crisis Alert"))
            .and(body_string_contains("acme"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let channel = WebhookChannel::new(reqwest::Client::new());
        channel
            .send(&alert(), &format!("{}/hook", server.uri()))
            .await
            .expect("delivery should succeed");
    }

    #[tokio::test]
    async fn non_success_status_is_a_channel_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let channel = WebhookChannel::new(reqwest::Client::new());
        let result = channel
            .send(&alert(), &format!("{}/hook", server.uri()))
            .await;
        assert!(matches!(result, Err(ChannelError::Status(500))));
    }
}
