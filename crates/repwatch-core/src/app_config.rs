use std::net::SocketAddr;

use crate::types::Platform;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// OAuth credentials for the forum platform (password grant, script-app style).
#[derive(Clone)]
pub struct ForumCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    /// Comma-joined sub-communities the search is restricted to.
    pub communities: String,
}

/// OAuth credentials for the microblog platform (client-credentials grant).
#[derive(Clone)]
pub struct MicroblogCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// OAuth credentials for the video platform (refresh-token grant).
#[derive(Clone)]
pub struct VideoCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Static API key for the place-review platform.
#[derive(Clone)]
pub struct PlaceReviewCredentials {
    pub api_key: String,
}

/// Process-level SMTP transport settings for the email alert channel.
#[derive(Clone)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: String,
}

/// Process-level gateway settings for the SMS alert channel.
#[derive(Clone)]
pub struct SmsSettings {
    pub gateway_url: String,
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,

    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,

    /// Platforms the orchestrator polls. Credentials for every listed
    /// platform are validated at startup; a missing variable is fatal.
    pub platforms: Vec<Platform>,

    pub crisis_threshold: f64,
    pub poll_batch_size: usize,
    pub poll_inter_batch_delay_ms: u64,
    pub poll_cycle_budget_secs: u64,
    pub poll_alert_limit: i64,
    pub poll_max_concurrent_subjects: usize,

    pub fetch_timeout_secs: u64,
    pub fetch_max_retries: u32,
    pub fetch_backoff_base_ms: u64,
    pub fetch_user_agent: String,

    pub forum: Option<ForumCredentials>,
    pub microblog: Option<MicroblogCredentials>,
    pub video: Option<VideoCredentials>,
    pub place_review: Option<PlaceReviewCredentials>,

    pub classifier_url: Option<String>,
    pub classifier_timeout_secs: u64,

    pub email: Option<EmailSettings>,
    pub sms: Option<SmsSettings>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("platforms", &self.platforms)
            .field("crisis_threshold", &self.crisis_threshold)
            .field("poll_batch_size", &self.poll_batch_size)
            .field("poll_inter_batch_delay_ms", &self.poll_inter_batch_delay_ms)
            .field("poll_cycle_budget_secs", &self.poll_cycle_budget_secs)
            .field("poll_alert_limit", &self.poll_alert_limit)
            .field(
                "poll_max_concurrent_subjects",
                &self.poll_max_concurrent_subjects,
            )
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("fetch_max_retries", &self.fetch_max_retries)
            .field("fetch_backoff_base_ms", &self.fetch_backoff_base_ms)
            .field("fetch_user_agent", &self.fetch_user_agent)
            .field("forum", &self.forum.as_ref().map(|_| "[configured]"))
            .field(
                "microblog",
                &self.microblog.as_ref().map(|_| "[configured]"),
            )
            .field("video", &self.video.as_ref().map(|_| "[configured]"))
            .field(
                "place_review",
                &self.place_review.as_ref().map(|_| "[configured]"),
            )
            .field("classifier_url", &self.classifier_url)
            .field("classifier_timeout_secs", &self.classifier_timeout_secs)
            .field("email", &self.email.as_ref().map(|_| "[configured]"))
            .field("sms", &self.sms.as_ref().map(|_| "[configured]"))
            .finish()
    }
}
