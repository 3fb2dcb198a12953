//! Outbound delivery — hands the assembled report to SMTP.
//!
//! One send per run. A transport failure surfaces to the operator and the
//! run ends with the checkpoint intact, so the next run can retry delivery
//! without re-spending inference.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};

use crate::config::DigestConfig;
use crate::error::DispatchError;
use crate::pipeline::report::Report;

/// SMTP dispatcher for the finished report.
pub struct Dispatcher {
    smtp_host: String,
    smtp_port: u16,
    username: String,
    password: SecretString,
    from_address: String,
    to_address: String,
}

impl Dispatcher {
    pub fn new(config: &DigestConfig) -> Self {
        Self {
            smtp_host: config.smtp_host.clone(),
            smtp_port: config.smtp_port,
            username: config.username.clone(),
            password: config.password.clone(),
            from_address: config.username.clone(),
            to_address: config.recipient.clone(),
        }
    }

    /// Send the report as an HTML email.
    pub fn send(&self, report: &Report) -> Result<(), DispatchError> {
        let email = self.build_message(report)?;

        let creds = Credentials::new(
            self.username.clone(),
            self.password.expose_secret().to_string(),
        );
        let transport = SmtpTransport::relay(&self.smtp_host)
            .map_err(|e| DispatchError::Send(format!("SMTP relay error: {e}")))?
            .port(self.smtp_port)
            .credentials(creds)
            .build();

        transport
            .send(&email)
            .map_err(|e| DispatchError::Send(e.to_string()))?;

        tracing::info!(to = %self.to_address, subject = %report.subject, "Report sent");
        Ok(())
    }

    fn build_message(&self, report: &Report) -> Result<Message, DispatchError> {
        Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| DispatchError::InvalidAddress {
                        address: self.from_address.clone(),
                        reason: format!("{e}"),
                    })?,
            )
            .to(self
                .to_address
                .parse()
                .map_err(|e| DispatchError::InvalidAddress {
                    address: self.to_address.clone(),
                    reason: format!("{e}"),
                })?)
            .subject(&report.subject)
            .header(ContentType::TEXT_HTML)
            .body(report.body.clone())
            .map_err(|e| DispatchError::Build(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(username: &str, recipient: &str) -> DigestConfig {
        DigestConfig {
            imap_host: "imap.example.com".into(),
            imap_port: 993,
            smtp_host: "smtp.example.com".into(),
            smtp_port: 465,
            username: username.into(),
            password: SecretString::from("secret"),
            recipient: recipient.into(),
            lookback_hours: 24,
            ignore_senders: vec![],
            categorise_model: "m".into(),
            summarise_model: "m".into(),
            categorise_ctx: 8000,
            summarise_ctx: 130_000,
            ollama_url: "http://localhost:11434".into(),
            individual_summaries: false,
            headline: true,
            concluding: true,
            convert_html: false,
            checkpoint_path: PathBuf::from("digest_state.json"),
            keep_checkpoint: false,
        }
    }

    fn report() -> Report {
        Report {
            subject: "Summary of messages from A to B".into(),
            body: "<p>Hello</p>".into(),
        }
    }

    #[test]
    fn builds_html_message_with_subject() {
        let dispatcher = Dispatcher::new(&config("me@example.com", "me@example.com"));
        let message = dispatcher.build_message(&report()).unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains("Subject: Summary of messages from A to B"));
        assert!(formatted.contains("text/html"));
        assert!(formatted.contains("<p>Hello</p>"));
    }

    #[test]
    fn invalid_recipient_is_reported() {
        let dispatcher = Dispatcher::new(&config("me@example.com", "not an address"));
        let err = dispatcher.build_message(&report()).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidAddress { .. }));
    }
}
