//! SMTP delivery through lettre.

use crate::error::{MailError, Result};
use async_trait::async_trait;
use leadforge_db::smtp_credentials::{SmtpCredential, SmtpCredentialInput, SmtpEncryption};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use sha2::{Digest, Sha256};
use std::time::Duration;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection details for one SMTP account.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub encryption: SmtpEncryption,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("encryption", &self.encryption)
            .finish()
    }
}

impl From<&SmtpCredential> for SmtpSettings {
    fn from(c: &SmtpCredential) -> Self {
        Self {
            host: c.host.clone(),
            port: c.port,
            username: c.username.clone(),
            password: c.password.clone(),
            encryption: c.encryption,
        }
    }
}

impl From<&SmtpCredentialInput> for SmtpSettings {
    fn from(c: &SmtpCredentialInput) -> Self {
        Self {
            host: c.host.clone(),
            port: c.port,
            username: c.username.clone(),
            password: c.password.clone(),
            encryption: c.encryption,
        }
    }
}

/// A rendered HTML email ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub from_name: Option<String>,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

impl OutgoingEmail {
    fn mailbox(field: &'static str, address: &str, name: Option<&str>) -> Result<Mailbox> {
        let parsed: Address = address.parse().map_err(|e| MailError::InvalidAddress {
            field,
            address: address.to_string(),
            reason: format!("{e}"),
        })?;
        Ok(Mailbox::new(
            name.filter(|n| !n.is_empty()).map(ToString::to_string),
            parsed,
        ))
    }

    /// Build the MIME message.
    pub fn to_message(&self) -> Result<Message> {
        Message::builder()
            .from(Self::mailbox("from", &self.from, self.from_name.as_deref())?)
            .to(Self::mailbox("to", &self.to, None)?)
            .subject(&self.subject)
            .header(ContentType::TEXT_HTML)
            .body(self.html_body.clone())
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

/// Delivers mail over an SMTP account.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Connect and authenticate without sending anything.
    async fn verify(&self, settings: &SmtpSettings) -> Result<()>;

    /// Send one email.
    async fn send(&self, settings: &SmtpSettings, email: &OutgoingEmail) -> Result<()>;
}

/// [`Mailer`] backed by lettre's tokio SMTP transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct LettreMailer;

impl LettreMailer {
    /// `ssl` uses implicit TLS, `tls` upgrades with STARTTLS and `none`
    /// stays in plain text. Port and credentials apply in every case.
    pub fn transport(settings: &SmtpSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = match settings.encryption {
            SmtpEncryption::Ssl => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| MailError::Connection(e.to_string()))?,
            SmtpEncryption::Tls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                    .map_err(|e| MailError::Connection(e.to_string()))?
            }
            SmtpEncryption::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
            }
        };

        Ok(builder
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build())
    }
}

#[async_trait]
impl Mailer for LettreMailer {
    async fn verify(&self, settings: &SmtpSettings) -> Result<()> {
        let transport = Self::transport(settings)?;
        match transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(MailError::Connection(format!(
                "{}:{} did not accept the connection",
                settings.host, settings.port
            ))),
            Err(e) => Err(MailError::Connection(e.to_string())),
        }
    }

    async fn send(&self, settings: &SmtpSettings, email: &OutgoingEmail) -> Result<()> {
        let message = email.to_message()?;
        let transport = Self::transport(settings)?;
        transport
            .send(message)
            .await
            .map_err(|e| MailError::Send(e.to_string()))?;
        tracing::debug!(
            to = %email.to,
            body_sha256 = %body_hash(&email.html_body),
            "Email sent"
        );
        Ok(())
    }
}

/// Returns SHA-256 hex of an email body, so logs never carry the body itself.
#[must_use]
pub fn body_hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            from: "sales@leadforge.io".to_string(),
            from_name: Some("LeadForge".to_string()),
            to: "owner@sunrisecafe.com".to_string(),
            subject: "Hello Sunrise Cafe".to_string(),
            html_body: "<p>Hi there</p>".to_string(),
        }
    }

    #[test]
    fn test_message_is_html() {
        let formatted = String::from_utf8(email().to_message().unwrap().formatted()).unwrap();
        assert!(formatted.contains("Content-Type: text/html"));
        assert!(formatted.contains("To: owner@sunrisecafe.com"));
        assert!(formatted.contains("Subject: Hello Sunrise Cafe"));
    }

    #[test]
    fn test_bad_recipient_is_rejected() {
        let mut e = email();
        e.to = "not an address".to_string();
        let err = e.to_message().unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress { field: "to", .. }));
    }

    #[test]
    fn test_plain_transport_and_redacted_debug() {
        let settings = SmtpSettings {
            host: "localhost".to_string(),
            port: 2525,
            username: "user".to_string(),
            password: "secret".to_string(),
            encryption: SmtpEncryption::None,
        };
        assert!(LettreMailer::transport(&settings).is_ok());
        assert!(!format!("{settings:?}").contains("secret"));
    }

    #[test]
    fn test_body_hash_is_deterministic() {
        let h1 = body_hash("hello");
        let h2 = body_hash("hello");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, body_hash("world"));
    }
}
