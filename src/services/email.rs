/// Outbound email: a bounded in-process queue in front of an async SMTP
/// transport.
///
/// Business flows only ever enqueue; a detached dispatcher task performs the
/// actual sends, so the response path never waits on SMTP and a dispatch
/// failure is logged rather than surfaced to the caller. Tests hold the
/// receiving end of the queue to assert that a send was scheduled.
use crate::config::EmailConfig;
use crate::error::{AppError, Result};
use lettre::message::{header, Mailbox, Message, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Queue depth before enqueues start being dropped with a warning.
const OUTBOX_CAPACITY: usize = 256;

/// One email waiting for dispatch.
#[derive(Debug)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

impl OutboundEmail {
    pub fn verification_link(to: &str, link: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Verify your account".to_string(),
            html_body: format!(
                r#"<h1>Verify your account</h1><p><a href="{}">Click here to verify your account</a></p>"#,
                link
            ),
            text_body: format!("Verify your account: {}", link),
        }
    }

    pub fn activation_success(to: &str, generated_password: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Account verified".to_string(),
            html_body: format!(
                "<h1>Account verified</h1><p>Your account is now active. Your new password: <b>{}</b></p>",
                generated_password
            ),
            text_body: format!(
                "Your account is now active. Your new password: {}",
                generated_password
            ),
        }
    }

    pub fn password_reset_link(to: &str, link: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Reset your password".to_string(),
            html_body: format!(
                r#"<h1>Reset your password</h1><p><a href="{}">Click here to reset your password</a></p>"#,
                link
            ),
            text_body: format!("Reset your password: {}", link),
        }
    }

    pub fn otp_code(to: &str, code: &str, expires_in_minutes: i64) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your one-time code".to_string(),
            html_body: format!(
                "<h1>Your one-time code</h1><p style=\"font-size: 28px; letter-spacing: 6px;\"><b>{}</b></p><p>This code expires in {} minutes.</p>",
                code, expires_in_minutes
            ),
            text_body: format!(
                "Your one-time code is {}. It expires in {} minutes.",
                code, expires_in_minutes
            ),
        }
    }
}

/// Cloneable handle that schedules sends.
#[derive(Clone)]
pub struct Mailer {
    tx: mpsc::Sender<OutboundEmail>,
}

impl Mailer {
    /// Build a mailer together with the receiving end of its queue.
    pub fn channel() -> (Self, mpsc::Receiver<OutboundEmail>) {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        (Self { tx }, rx)
    }

    /// Schedule a send. Never blocks; a full or closed queue drops the mail
    /// with a warning, since delivery is best-effort by contract.
    pub fn enqueue(&self, mail: OutboundEmail) {
        let recipient = mail.to.clone();
        if let Err(err) = self.tx.try_send(mail) {
            warn!(recipient = %recipient, error = %err, "dropping outbound email, queue unavailable");
        }
    }
}

/// Drain the outbox in a detached task.
pub fn spawn_dispatcher(
    mut rx: mpsc::Receiver<OutboundEmail>,
    transport: EmailTransport,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(mail) = rx.recv().await {
            if let Err(err) = transport
                .send_html_email(&mail.to, &mail.subject, &mail.html_body, &mail.text_body)
                .await
            {
                error!(recipient = %mail.to, error = %err, "email dispatch failed");
            }
        }
    })
}

/// Async SMTP transport wrapper (or no-op when unconfigured).
#[derive(Clone)]
pub struct EmailTransport {
    transport: Option<Arc<AsyncSmtpTransport<Tokio1Executor>>>,
    from: Mailbox,
}

impl EmailTransport {
    /// Build the transport from configuration.
    ///
    /// With an empty SMTP host the transport operates in no-op mode and only
    /// logs, which keeps development and tests free of email infrastructure.
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let from = config
            .smtp_from
            .parse::<Mailbox>()
            .map_err(|e| AppError::Email(format!("invalid SMTP_FROM address: {}", e)))?;

        let transport = if config.smtp_host.trim().is_empty() {
            warn!("SMTP host not configured; email transport will operate in no-op mode");
            None
        } else {
            let builder = if config.use_starttls {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            }
            .map_err(|e| AppError::Email(format!("failed to configure SMTP transport: {}", e)))?
            .port(config.smtp_port);

            let builder = if let (Some(username), Some(password)) =
                (&config.smtp_username, &config.smtp_password)
            {
                builder.credentials(Credentials::new(username.to_string(), password.to_string()))
            } else {
                builder
            };

            Some(Arc::new(builder.build()))
        };

        Ok(Self { transport, from })
    }

    /// Send an HTML email with a plain-text fallback.
    pub async fn send_html_email(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        let Some(transport) = &self.transport else {
            info!(subject, recipient, "email transport in no-op mode; skipping send");
            return Ok(());
        };

        let to = recipient
            .parse::<Mailbox>()
            .map_err(|e| AppError::Email(format!("invalid recipient address: {}", e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| AppError::Email(format!("failed to build email message: {}", e)))?;

        transport
            .send(email)
            .await
            .map_err(|e| AppError::Email(format!("failed to send email: {}", e)))?;

        info!(subject, "email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_schedules_a_send() {
        let (mailer, mut rx) = Mailer::channel();

        mailer.enqueue(OutboundEmail::otp_code("user@example.com", "123456", 5));

        let mail = rx.recv().await.expect("one email scheduled");
        assert_eq!(mail.to, "user@example.com");
        assert!(mail.text_body.contains("123456"));
    }

    #[tokio::test]
    async fn enqueue_after_receiver_dropped_does_not_panic() {
        let (mailer, rx) = Mailer::channel();
        drop(rx);

        mailer.enqueue(OutboundEmail::verification_link(
            "user@example.com",
            "http://localhost/verify",
        ));
    }

    #[test]
    fn verification_email_carries_link() {
        let mail =
            OutboundEmail::verification_link("a@x.com", "http://localhost:3000/create/account/x");
        assert!(mail.html_body.contains("http://localhost:3000/create/account/x"));
        assert!(mail.text_body.contains("http://localhost:3000/create/account/x"));
    }
}
