//! SMTP delivery via lettre.

use async_trait::async_trait;
use lettre::message::{Mailbox, Message, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{info, warn};

use super::MailSender;
use crate::accounts::AccountError;
use crate::settings::SmtpSettings;

/// SMTP sender; with no host configured it only logs.
#[derive(Clone)]
pub struct SmtpMailSender {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl SmtpMailSender {
    pub fn new(settings: &SmtpSettings) -> Result<Self, AccountError> {
        let from = settings
            .from
            .parse::<Mailbox>()
            .map_err(|e| AccountError::Internal(format!("invalid sender address: {e}")))?;

        let transport = if settings.host.trim().is_empty() {
            warn!("SMTP host not configured; mails will only be logged");
            None
        } else {
            let builder = if settings.use_starttls {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            }
            .map_err(|e| AccountError::Internal(format!("SMTP transport: {e}")))?
            .port(settings.port);

            let builder = match (&settings.username, &settings.password) {
                (Some(username), Some(password)) => {
                    builder.credentials(Credentials::new(username.clone(), password.clone()))
                }
                _ => builder,
            };
            Some(builder.build())
        };

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn send_mail(&self, to: &str, subject: &str, body: &str) -> Result<(), AccountError> {
        let Some(transport) = &self.transport else {
            info!(subject, recipient = to, "log-only mail mode; skipping send");
            return Ok(());
        };

        let to = to
            .parse::<Mailbox>()
            .map_err(|_| AccountError::EmailInvalid(to.to_string()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AccountError::MailError(format!("build message: {e}")))?;

        transport
            .send(message)
            .await
            .map_err(|e| AccountError::MailError(e.to_string()))?;
        info!(subject, "mail sent");
        Ok(())
    }
}
