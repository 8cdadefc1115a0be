//! Crisis alert delivery over pluggable channels.
//!
//! Each enabled channel is attempted independently; a failure on one never
//! blocks the others, and the aggregate [`DispatchReport`] records every
//! per-channel outcome. Delivery is fire-and-forget from the pipeline's
//! perspective: no channel-specific receipts are awaited, and failures are
//! logged and counted, not retried within the cycle.

pub mod channels;
mod dispatcher;
mod error;

pub use dispatcher::Dispatcher;
pub use error::ChannelError;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use repwatch_core::Severity;

/// The alert payload rendered into every channel.
#[derive(Debug, Clone)]
pub struct CrisisAlert {
    pub subject: String,
    pub platform: String,
    pub severity: Severity,
    pub crisis_score: f64,
    pub text: String,
    pub external_ref: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-user channel preferences, as read from storage.
#[derive(Debug, Clone, Default)]
pub struct ChannelPreferences {
    pub email: Option<String>,
    pub email_enabled: bool,
    pub webhook_url: Option<String>,
    pub webhook_enabled: bool,
    pub sms_to: Option<String>,
    pub sms_enabled: bool,
}

/// One alert delivery mechanism (email, chat webhook, SMS).
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Delivers the alert to one recipient (address, webhook URL, or
    /// phone number depending on the channel).
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when delivery fails; the dispatcher logs
    /// and records it without blocking sibling channels.
    async fn send(&self, alert: &CrisisAlert, recipient: &str) -> Result<(), ChannelError>;
}

/// Outcome of one channel attempt.
#[derive(Debug, Clone)]
pub struct ChannelOutcome {
    pub channel: &'static str,
    pub delivered: bool,
    pub error: Option<String>,
}

/// Aggregate result of dispatching one alert across all enabled channels.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchReport {
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.delivered).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.delivered).count()
    }

    #[must_use]
    pub fn any_delivered(&self) -> bool {
        self.outcomes.iter().any(|o| o.delivered)
    }
}

/// Plain-text rendering shared by the webhook and SMS channels.
#[must_use]
pub fn render_plain(alert: &CrisisAlert) -> String {
    format!(
        "Crisis Alert [{severity}]\nSubject: {subject}\nPlatform: {platform}\nScore: {score:.2}\nLink: {link}\nContent: {text}",
        severity = alert.severity,
        subject = alert.subject,
        platform = alert.platform,
        score = alert.crisis_score,
        link = alert.external_ref,
        text = alert.text,
    )
}
