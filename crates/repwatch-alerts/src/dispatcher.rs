//! Fire-and-continue dispatch across a user's enabled channels.

use repwatch_core::AppConfig;

use crate::channels::{EmailChannel, SmsChannel, WebhookChannel};
use crate::{
    AlertChannel, ChannelError, ChannelOutcome, ChannelPreferences, CrisisAlert, DispatchReport,
};

pub struct Dispatcher {
    email: Option<EmailChannel>,
    webhook: WebhookChannel,
    sms: Option<SmsChannel>,
}

impl Dispatcher {
    /// Builds the channel set from process-level transport settings. The
    /// webhook channel needs none; email and SMS are available only when
    /// their transports are configured.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] if a configured transport cannot be built.
    pub fn from_config(config: &AppConfig, http: reqwest::Client) -> Result<Self, ChannelError> {
        let email = config
            .email
            .as_ref()
            .map(EmailChannel::new)
            .transpose()?;
        let sms = config
            .sms
            .as_ref()
            .map(|settings| SmsChannel::new(http.clone(), settings));
        Ok(Self {
            email,
            webhook: WebhookChannel::new(http),
            sms,
        })
    }

    #[must_use]
    pub fn with_channels(
        email: Option<EmailChannel>,
        webhook: WebhookChannel,
        sms: Option<SmsChannel>,
    ) -> Self {
        Self { email, webhook, sms }
    }

    /// Attempts every enabled channel independently and reports each
    /// outcome. Never errors as a whole: once this returns, all enabled
    /// channels have been attempted and the caller may mark the mention
    /// alerted regardless of per-channel failures.
    pub async fn dispatch(
        &self,
        alert: &CrisisAlert,
        prefs: &ChannelPreferences,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        if prefs.email_enabled {
            let outcome = match (&self.email, prefs.email.as_deref()) {
                (Some(channel), Some(recipient)) => {
                    Self::attempt(channel, alert, recipient).await
                }
                (None, _) => {
                    Self::misconfigured("email", "SMTP transport not configured")
                }
                (_, None) => Self::misconfigured("email", "no email address on file"),
            };
            report.outcomes.push(outcome);
        }

        if prefs.webhook_enabled {
            let outcome = match prefs.webhook_url.as_deref() {
                Some(url) => Self::attempt(&self.webhook, alert, url).await,
                None => Self::misconfigured("webhook", "no webhook URL on file"),
            };
            report.outcomes.push(outcome);
        }

        if prefs.sms_enabled {
            let outcome = match (&self.sms, prefs.sms_to.as_deref()) {
                (Some(channel), Some(recipient)) => {
                    Self::attempt(channel, alert, recipient).await
                }
                (None, _) => Self::misconfigured("sms", "SMS gateway not configured"),
                (_, None) => Self::misconfigured("sms", "no SMS destination on file"),
            };
            report.outcomes.push(outcome);
        }

        report
    }

    async fn attempt(
        channel: &dyn AlertChannel,
        alert: &CrisisAlert,
        recipient: &str,
    ) -> ChannelOutcome {
        match channel.send(alert, recipient).await {
            Ok(()) => {
                tracing::info!(
                    channel = channel.name(),
                    subject = %alert.subject,
                    "alert delivered"
                );
                ChannelOutcome {
                    channel: channel.name(),
                    delivered: true,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(
                    channel = channel.name(),
                    subject = %alert.subject,
                    error = %e,
                    "alert delivery failed"
                );
                ChannelOutcome {
                    channel: channel.name(),
                    delivered: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn misconfigured(channel: &'static str, reason: &str) -> ChannelOutcome {
        tracing::warn!(channel, reason, "alert channel enabled but unusable");
        ChannelOutcome {
            channel,
            delivered: false,
            error: Some(ChannelError::Config(reason.to_string()).to_string()),
        }
    }
}
