//! SMTP email channel.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use repwatch_core::EmailSettings;

use crate::{AlertChannel, ChannelError, CrisisAlert};

pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl EmailChannel {
    /// Builds the channel from process-level SMTP settings.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Smtp`] if the relay transport cannot be
    /// constructed.
    pub fn new(settings: &EmailSettings) -> Result<Self, ChannelError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)?
            .port(settings.smtp_port);

        if let (Some(user), Some(pass)) = (&settings.smtp_username, &settings.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: settings.from_address.clone(),
        })
    }

    fn html_body(alert: &CrisisAlert) -> String {
        let author_line = alert
            .author
            .as_deref()
            .map(|a| format!("<p><strong>Author:</strong> {a}</p>"))
            .unwrap_or_default();
        format!(
            "<h2>Crisis Alert</h2>\
             <p><strong>Subject:</strong> {subject}</p>\
             <p><strong>Platform:</strong> {platform}</p>\
             <p><strong>Severity:</strong> {severity} ({score:.2})</p>\
             {author_line}\
             <p><strong>Link:</strong> <a href=\"{link}\">View Post</a></p>\
             <p><strong>Content:</strong> {text}</p>",
            subject = alert.subject,
            platform = alert.platform,
            severity = alert.severity,
            score = alert.crisis_score,
            link = alert.external_ref,
            text = alert.text,
        )
    }
}

#[async_trait]
impl AlertChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, alert: &CrisisAlert, recipient: &str) -> Result<(), ChannelError> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|_| ChannelError::Address(self.from.clone()))?,
            )
            .to(recipient
                .parse()
                .map_err(|_| ChannelError::Address(recipient.to_string()))?)
            .subject(format!("Crisis Alert: {}", alert.subject))
            .header(ContentType::TEXT_HTML)
            .body(Self::html_body(alert))?;

        self.transport.send(message).await?;
        Ok(())
    }
}
