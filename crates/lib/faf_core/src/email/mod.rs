//! Email gateway: address validation and lifecycle mails.
//!
//! [`EmailService`] owns the address policy and mail content; delivery goes
//! through a [`MailSender`] (SMTP in production, see [`smtp`]).

pub mod smtp;

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::accounts::AccountError;
use crate::settings::{MailSettings, render_template};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is a valid regex")
});

/// Delivers a rendered plain-text mail.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send_mail(&self, to: &str, subject: &str, body: &str) -> Result<(), AccountError>;
}

/// Validates addresses and sends activation and password-reset mails.
#[derive(Clone)]
pub struct EmailService {
    sender: Arc<dyn MailSender>,
    settings: MailSettings,
}

impl EmailService {
    pub fn new(sender: Arc<dyn MailSender>, settings: MailSettings) -> Self {
        Self { sender, settings }
    }

    /// Reject syntactically invalid addresses and blacklisted domains.
    pub fn validate_address(&self, email: &str) -> Result<(), AccountError> {
        if !EMAIL_PATTERN.is_match(email) {
            return Err(AccountError::EmailInvalid(email.to_string()));
        }
        let domain = email
            .rsplit_once('@')
            .map(|(_, domain)| domain.to_ascii_lowercase())
            .unwrap_or_default();
        if self
            .settings
            .blacklisted_domains
            .iter()
            .any(|blocked| blocked.eq_ignore_ascii_case(&domain))
        {
            return Err(AccountError::EmailBlacklisted(email.to_string()));
        }
        Ok(())
    }

    pub async fn send_activation_mail(
        &self,
        username: &str,
        email: &str,
        activation_url: &str,
    ) -> Result<(), AccountError> {
        debug!(username, "sending activation mail");
        let body = render_template(
            &self.settings.activation_body,
            &[("username", username), ("url", activation_url)],
        );
        self.sender
            .send_mail(email, &self.settings.activation_subject, &body)
            .await
    }

    pub async fn send_password_reset_mail(
        &self,
        username: &str,
        email: &str,
        reset_url: &str,
    ) -> Result<(), AccountError> {
        debug!(username, "sending password reset mail");
        let body = render_template(
            &self.settings.password_reset_body,
            &[("username", username), ("url", reset_url)],
        );
        self.sender
            .send_mail(email, &self.settings.password_reset_subject, &body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(String, String, String)>>);

    #[async_trait]
    impl MailSender for Outbox {
        async fn send_mail(
            &self,
            to: &str,
            subject: &str,
            body: &str,
        ) -> Result<(), AccountError> {
            self.0
                .lock()
                .unwrap()
                .push((to.into(), subject.into(), body.into()));
            Ok(())
        }
    }

    fn service(blacklist: &[&str]) -> (EmailService, Arc<Outbox>) {
        let outbox = Arc::new(Outbox::default());
        let settings = MailSettings {
            blacklisted_domains: blacklist.iter().map(|d| d.to_string()).collect(),
            ..MailSettings::default()
        };
        (EmailService::new(outbox.clone(), settings), outbox)
    }

    #[test]
    fn accepts_plain_addresses() {
        let (svc, _) = service(&[]);
        assert!(svc.validate_address("p1@example.com").is_ok());
        assert!(svc.validate_address("first.last+tag@mail.example.org").is_ok());
    }

    #[test]
    fn rejects_malformed_addresses() {
        let (svc, _) = service(&[]);
        for email in ["", "p1", "p1@", "@example.com", "p1@example", "p 1@example.com"] {
            assert!(
                matches!(svc.validate_address(email), Err(AccountError::EmailInvalid(_))),
                "{email:?} should be invalid"
            );
        }
    }

    #[test]
    fn rejects_blacklisted_domains_case_insensitively() {
        let (svc, _) = service(&["trashmail.com"]);
        assert!(matches!(
            svc.validate_address("p1@TrashMail.com"),
            Err(AccountError::EmailBlacklisted(_))
        ));
        assert!(svc.validate_address("p1@example.com").is_ok());
    }

    #[tokio::test]
    async fn activation_mail_embeds_url() {
        let (svc, outbox) = service(&[]);
        svc.send_activation_mail("Player1", "p1@example.com", "https://x/activate?token=t")
            .await
            .unwrap();
        let sent = outbox.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (to, subject, body) = &sent[0];
        assert_eq!(to, "p1@example.com");
        assert_eq!(subject, "FAF user registration");
        assert!(body.contains("Dear Player1"));
        assert!(body.contains("https://x/activate?token=t"));
    }
}
