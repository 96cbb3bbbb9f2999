//! SMTP delivery through lettre.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;

use crate::config::SmtpConfig;
use crate::error::NotificationError;
use crate::ports::{MailSender, OutboundEmail};

#[derive(Clone)]
pub struct SmtpMailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailSender {
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &SmtpConfig) -> Result<Self, NotificationError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| NotificationError::Mail(e.to_string()))?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }

        Ok(Self {
            mailer: builder.build(),
            from_address: config.from_address.clone(),
        })
    }

    fn build_message(&self, email: &OutboundEmail) -> Result<Message, NotificationError> {
        let content_type = if email.is_html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };

        let builder = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| NotificationError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(email
                .to
                .parse()
                .map_err(|_| NotificationError::InvalidAddress(email.to.clone()))?)
            .subject(email.subject.clone());

        let message = if email.is_multipart {
            builder.multipart(
                MultiPart::mixed().singlepart(
                    SinglePart::builder()
                        .header(content_type)
                        .body(email.body.clone()),
                ),
            )
        } else {
            builder.header(content_type).body(email.body.clone())
        };

        message.map_err(|e| NotificationError::Mail(e.to_string()))
    }
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn send_email(&self, email: &OutboundEmail) -> Result<(), NotificationError> {
        let message = self.build_message(email)?;
        self.mailer
            .send(message)
            .await
            .map_err(|e| NotificationError::Mail(e.to_string()))?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> SmtpMailSender {
        SmtpMailSender::new(&SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            username: None,
            password: None,
            from_address: "connector@example.com".to_string(),
        })
        .unwrap()
    }

    fn email(to: &str) -> OutboundEmail {
        OutboundEmail {
            to: to.to_string(),
            subject: "Account holder créé".to_string(),
            body: "<p>Bonjour</p>".to_string(),
            is_multipart: false,
            is_html: true,
        }
    }

    #[tokio::test]
    async fn test_html_message_headers() {
        let message = sender().build_message(&email("shop@example.com")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Content-Type: text/html; charset=utf-8"));
        assert!(raw.contains("To: shop@example.com"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_rejected() {
        let err = sender().build_message(&email("not an address")).unwrap_err();
        assert!(matches!(err, NotificationError::InvalidAddress(_)));
    }
}
