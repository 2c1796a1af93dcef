//! Outgoing mail.
//!
//! [`Mailer`] composes a plain-text message and hands it to a
//! [`MailTransport`]. Sending is fire-and-forget: the outcome is written to
//! the log and never returned to the caller.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MailError;
use crate::logging::{inform, RunMode};

/// SMTP authentication scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// `AUTH PLAIN`
    Plain,
    /// `AUTH LOGIN`
    #[default]
    Login,
    /// `AUTH CRAM-MD5`
    CramMd5,
}

/// Mail settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailOptions {
    /// SMTP server host.
    pub host: Option<String>,
    /// SMTP server port.
    pub port: u16,
    /// Domain announced in HELO and used in generated message ids.
    pub helo_domain: Option<String>,
    /// SMTP login name.
    pub username: Option<String>,
    /// SMTP password.
    pub password: Option<String>,
    /// Envelope sender address.
    pub sender: Option<String>,
    /// `From` header value, e.g. `Jane <jane@example.com>`.
    pub sender_full: Option<String>,
    /// SMTP authentication scheme.
    pub auth_type: AuthType,
    /// Addresses that receive a blind copy of every message.
    pub bcc: Vec<String>,
    /// Prepended to every subject.
    pub subject_prefix: Option<String>,
    /// Line separator of the composed message.
    pub newline: String,
}

impl Default for MailOptions {
    fn default() -> Self {
        Self {
            host: None,
            port: 25,
            helo_domain: None,
            username: None,
            password: None,
            sender: None,
            sender_full: None,
            auth_type: AuthType::default(),
            bcc: Vec::new(),
            subject_prefix: None,
            newline: "\r\n".to_string(),
        }
    }
}

/// A composed message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    /// Envelope sender.
    pub sender: String,
    /// Envelope recipients: the addressee first, then any bcc addresses.
    pub recipients: Vec<String>,
    /// Final subject line, prefix included.
    pub subject: String,
    /// Headers and body joined by the configured newline.
    pub message: String,
}

/// Delivers composed mail, typically over SMTP.
pub trait MailTransport: Send + Sync {
    /// Delivers `mail` using the connection settings in `options`.
    ///
    /// # Errors
    /// `Transport` if the message could not be delivered.
    fn deliver(&self, options: &MailOptions, mail: &OutgoingMail) -> Result<(), MailError>;
}

type MessageIdFn = dyn Fn(&MailOptions, DateTime<Utc>) -> Result<String, MailError> + Send + Sync;

/// `<unix-seconds@helo_domain>`
fn default_message_id(options: &MailOptions, now: DateTime<Utc>) -> Result<String, MailError> {
    let domain = options
        .helo_domain
        .as_deref()
        .ok_or(MailError::MissingOption { option: "helo_domain" })?;
    Ok(format!("<{}@{domain}>", now.timestamp()))
}

/// Composes and sends mail through a transport.
pub struct Mailer<T> {
    options: MailOptions,
    transport: T,
    run_mode: RunMode,
    message_id: Box<MessageIdFn>,
}

impl<T: MailTransport> Mailer<T> {
    /// Creates a mailer.
    #[must_use]
    pub fn new(options: MailOptions, transport: T, run_mode: RunMode) -> Self {
        Self {
            options,
            transport,
            run_mode,
            message_id: Box::new(default_message_id),
        }
    }

    /// Replaces the message id generator.
    #[must_use]
    pub fn with_message_id<F>(mut self, generator: F) -> Self
    where
        F: Fn(&MailOptions, DateTime<Utc>) -> Result<String, MailError> + Send + Sync + 'static,
    {
        self.message_id = Box::new(generator);
        self
    }

    /// Settings in use.
    #[must_use]
    pub const fn options(&self) -> &MailOptions {
        &self.options
    }

    /// The transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Builds the message for `recipient` as of `now`.
    ///
    /// # Errors
    /// `MissingOption` if `sender` (or `helo_domain`, for the default
    /// message id) is not configured.
    pub fn compose(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<OutgoingMail, MailError> {
        let sender = self
            .options
            .sender
            .clone()
            .ok_or(MailError::MissingOption { option: "sender" })?;
        let from = self
            .options
            .sender_full
            .clone()
            .unwrap_or_else(|| format!("{sender} <{sender}>"));
        let subject = format!(
            "{} {subject}",
            self.options.subject_prefix.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string();
        let id = (self.message_id)(&self.options, now)?;

        let message = [
            format!("From: {from}"),
            format!("To: <{recipient}>"),
            format!("Date: {}", now.to_rfc2822()),
            format!("Subject: {subject}"),
            format!("Message-Id: {id}"),
            String::new(),
            body.to_string(),
        ]
        .join(&self.options.newline);

        let mut recipients = Vec::with_capacity(1 + self.options.bcc.len());
        recipients.push(recipient.to_string());
        recipients.extend(self.options.bcc.iter().cloned());

        Ok(OutgoingMail {
            sender,
            recipients,
            subject,
            message,
        })
    }

    /// Composes and delivers a message now. Failures are logged, not returned.
    pub fn send(&self, recipient: &str, subject: &str, body: &str) {
        let outcome = self
            .compose(recipient, subject, body, Utc::now())
            .and_then(|mail| {
                self.transport.deliver(&self.options, &mail)?;
                Ok(mail)
            });

        match outcome {
            Ok(mail) => {
                inform!(self.run_mode, INFO, recipient = %recipient, subject = %mail.subject, "mail sent");
            }
            Err(e) => {
                inform!(self.run_mode, ERROR, recipient = %recipient, error = %e, "failed to send mail");
            }
        }
    }
}

impl<T> fmt::Debug for Mailer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailer")
            .field("host", &self.options.host)
            .field("port", &self.options.port)
            .field("run_mode", &self.run_mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::capture::capture;
    use chrono::TimeZone;
    use std::sync::Mutex;
    use tracing::Level;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<OutgoingMail>>,
    }

    impl MailTransport for Recording {
        fn deliver(&self, _options: &MailOptions, mail: &OutgoingMail) -> Result<(), MailError> {
            self.sent.lock().unwrap().push(mail.clone());
            Ok(())
        }
    }

    struct Refusing;

    impl MailTransport for Refusing {
        fn deliver(&self, _options: &MailOptions, _mail: &OutgoingMail) -> Result<(), MailError> {
            Err(MailError::Transport {
                message: "connection refused".to_string(),
            })
        }
    }

    fn options() -> MailOptions {
        MailOptions {
            host: Some("localhost".to_string()),
            helo_domain: Some("example.com".to_string()),
            sender: Some("noreply@example.com".to_string()),
            ..MailOptions::default()
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2011, 6, 16, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_compose_layout() {
        let mailer = Mailer::new(options(), Recording::default(), RunMode::Silent);
        let mail = mailer
            .compose("info@example.org", "Hello, world!", "Hello, this is an Email", fixed_now())
            .unwrap();

        let expected = [
            "From: noreply@example.com <noreply@example.com>",
            "To: <info@example.org>",
            "Date: Thu, 16 Jun 2011 12:00:00 +0000",
            "Subject: Hello, world!",
            "Message-Id: <1308225600@example.com>",
            "",
            "Hello, this is an Email",
        ]
        .join("\r\n");
        assert_eq!(mail.message, expected);
        assert_eq!(mail.sender, "noreply@example.com");
        assert_eq!(mail.recipients, ["info@example.org"]);
    }

    #[test]
    fn test_compose_prefix_bcc_and_sender_full() {
        let options = MailOptions {
            subject_prefix: Some("[site]".to_string()),
            sender_full: Some("Site <noreply@example.com>".to_string()),
            bcc: vec!["audit@example.com".to_string()],
            newline: "\n".to_string(),
            ..options()
        };
        let mailer = Mailer::new(options, Recording::default(), RunMode::Silent);
        let mail = mailer.compose("a@example.org", "Hi", "body", fixed_now()).unwrap();

        assert_eq!(mail.subject, "[site] Hi");
        assert_eq!(mail.recipients, ["a@example.org", "audit@example.com"]);
        assert!(mail.message.starts_with("From: Site <noreply@example.com>\nTo: <a@example.org>\n"));
        assert!(mail.message.ends_with("\n\nbody"));
    }

    #[test]
    fn test_compose_requires_sender() {
        let options = MailOptions {
            sender: None,
            ..options()
        };
        let mailer = Mailer::new(options, Recording::default(), RunMode::Silent);
        let err = mailer.compose("a@example.org", "Hi", "body", fixed_now()).unwrap_err();
        assert!(matches!(err, MailError::MissingOption { option: "sender" }));
    }

    #[test]
    fn test_default_message_id_needs_helo_domain() {
        let options = MailOptions {
            helo_domain: None,
            ..options()
        };
        let mailer = Mailer::new(options, Recording::default(), RunMode::Silent);
        let err = mailer.compose("a@example.org", "Hi", "body", fixed_now()).unwrap_err();
        assert!(matches!(err, MailError::MissingOption { option: "helo_domain" }));
    }

    #[test]
    fn test_custom_message_id() {
        let mailer = Mailer::new(options(), Recording::default(), RunMode::Silent)
            .with_message_id(|_, _| Ok("<fixed@test>".to_string()));
        let mail = mailer.compose("a@example.org", "Hi", "body", fixed_now()).unwrap();
        assert!(mail.message.contains("Message-Id: <fixed@test>\r\n"));
    }

    #[test]
    fn test_send_delivers_through_transport() {
        let mailer = Mailer::new(options(), Recording::default(), RunMode::Silent);
        mailer.send("a@example.org", "Hi", "body");

        let sent = mailer.transport().sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipients, ["a@example.org"]);
        assert!(sent[0].message.ends_with("\r\n\r\nbody"));
    }

    #[test]
    fn test_send_swallows_transport_failure() {
        let mailer = Mailer::new(options(), Refusing, RunMode::Live);
        let events = capture(|| mailer.send("a@example.org", "Hi", "body"));
        assert_eq!(events, [(Level::ERROR, "failed to send mail".to_string())]);
    }

    #[test]
    fn test_send_logs_delivery_in_stage_mode() {
        let mailer = Mailer::new(options(), Recording::default(), RunMode::Stage);
        let events = capture(|| mailer.send("a@example.org", "Hi", "body"));
        assert_eq!(events, [(Level::INFO, "mail sent".to_string())]);

        let mailer = Mailer::new(options(), Recording::default(), RunMode::Live);
        let events = capture(|| mailer.send("a@example.org", "Hi", "body"));
        assert!(events.is_empty());
    }

    #[test]
    fn test_silent_mailer_logs_nothing() {
        let mailer = Mailer::new(options(), Refusing, RunMode::Silent);
        assert!(capture(|| mailer.send("a@example.org", "Hi", "body")).is_empty());
    }

    #[test]
    fn test_options_from_toml() {
        let options: MailOptions = toml::from_str(
            r#"
            host = "smtp.example.com"
            port = 587
            auth_type = "plain"
            bcc = ["x@example.com"]
            "#,
        )
        .unwrap();
        assert_eq!(options.port, 587);
        assert_eq!(options.auth_type, AuthType::Plain);
        assert_eq!(options.newline, "\r\n");
        assert_eq!(options.bcc, ["x@example.com"]);
    }
}
