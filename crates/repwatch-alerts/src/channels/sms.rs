//! SMS channel: form POST to a Twilio-style messaging gateway.

use async_trait::async_trait;

use repwatch_core::SmsSettings;

use crate::{render_plain, AlertChannel, ChannelError, CrisisAlert};

pub struct SmsChannel {
    http: reqwest::Client,
    gateway_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl SmsChannel {
    #[must_use]
    pub fn new(http: reqwest::Client, settings: &SmsSettings) -> Self {
        Self {
            http,
            gateway_url: settings.gateway_url.clone(),
            account_sid: settings.account_sid.clone(),
            auth_token: settings.auth_token.clone(),
            from_number: settings.from_number.clone(),
        }
    }
}

#[async_trait]
impl AlertChannel for SmsChannel {
    fn name(&self) -> &'static str {
        "sms"
    }

    async fn send(&self, alert: &CrisisAlert, recipient: &str) -> Result<(), ChannelError> {
        let response = self
            .http
            .post(&self.gateway_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", recipient),
                ("From", self.from_number.as_str()),
                ("Body", &render_plain(alert)),
            ])
            .send()
            .await?;

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

    fn settings(uri: &str) -> SmsSettings {
        SmsSettings {
            gateway_url: format!("{uri}/messages"),
            account_sid: "sid".to_string(),
            auth_token: "token".to_string(),
            from_number: "+15550000000".to_string(),
        }
    }

    fn alert() -> CrisisAlert {
        CrisisAlert {
            subject: "acme".to_string(),
            platform: "place_review".to_string(),
            severity: Severity::High,
            crisis_score: 0.75,
            text: "worst service ever".to_string(),
            external_ref: "place-1:Pat:1700000000".to_string(),
            author: Some("Pat".to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn posts_destination_and_message_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(body_string_contains("To=%2B15551234567"))
            .and(body_string_contains("From=%2B15550000000"))
            .and(body_string_contains("Crisis+Alert"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let channel = SmsChannel::new(reqwest::Client::new(), &settings(&server.uri()));
        channel
            .send(&alert(), "+15551234567")
            .await
            .expect("delivery should succeed");
    }

    #[tokio::test]
    async fn gateway_rejection_is_a_channel_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let channel = SmsChannel::new(reqwest::Client::new(), &settings(&server.uri()));
        let result = channel.send(&alert(), "+15551234567").await;
        assert!(matches!(result, Err(ChannelError::Status(400))));
    }
}
