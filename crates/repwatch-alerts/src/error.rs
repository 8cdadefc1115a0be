use thiserror::Error;

/// Per-channel delivery failure. Logged and counted by the dispatcher,
/// never fatal to an alert pass.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel misconfigured: {0}")]
    Config(String),

    #[error("invalid address '{0}'")]
    Address(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("delivery endpoint returned status {0}")]
    Status(u16),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("message build error: {0}")]
    Message(#[from] lettre::error::Error),
}
