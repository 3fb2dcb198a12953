//! Mailbox collaborator — lists and fetches raw messages over IMAP.
//!
//! The pipeline only needs two operations, both of which may fail
//! per-call: listing message ids since a date, and fetching one raw
//! RFC822 message. A failure on one id never aborts the rest.

pub mod normalize;

use std::io::Write as IoWrite;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::config::DigestConfig;
use crate::error::MailboxError;

/// Inbound mail transport seam.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Sequence numbers (as opaque ids) of messages received since `since`.
    async fn list_message_ids(&self, since: DateTime<Utc>) -> Result<Vec<String>, MailboxError>;

    /// One raw RFC822 message.
    async fn fetch(&self, id: &str) -> Result<Vec<u8>, MailboxError>;
}

// ── IMAP implementation ─────────────────────────────────────────────

/// IMAP-over-TLS mailbox. Blocking I/O, run under `spawn_blocking`;
/// each call opens, uses and logs out of its own session.
pub struct ImapMailbox {
    host: String,
    port: u16,
    username: String,
    password: SecretString,
}

impl ImapMailbox {
    pub fn new(config: &DigestConfig) -> Self {
        Self {
            host: config.imap_host.clone(),
            port: config.imap_port,
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }

    fn open_session(&self) -> Result<ImapSession, MailboxError> {
        let mut session = ImapSession::connect(&self.host, self.port)?;
        session.login(&self.username, self.password.expose_secret())?;
        session.select_inbox()?;
        Ok(session)
    }

    fn clone_for_task(&self) -> Self {
        Self {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

#[async_trait]
impl Mailbox for ImapMailbox {
    async fn list_message_ids(&self, since: DateTime<Utc>) -> Result<Vec<String>, MailboxError> {
        let mailbox = self.clone_for_task();
        tokio::task::spawn_blocking(move || {
            let mut session = mailbox.open_session()?;
            let ids = session.search_since(since)?;
            session.logout();
            Ok(ids)
        })
        .await
        .map_err(|e| MailboxError::Command {
            command: "SEARCH".to_string(),
            reason: format!("task join error: {e}"),
        })?
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, MailboxError> {
        let mailbox = self.clone_for_task();
        let task_id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let mut session = mailbox.open_session()?;
            let raw = session.fetch_rfc822(&task_id)?;
            session.logout();
            Ok(raw)
        })
        .await
        .map_err(|e| MailboxError::Fetch {
            id: id.to_string(),
            reason: format!("task join error: {e}"),
        })?
    }
}

// ── Raw IMAP session ────────────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// A logged-in IMAP session with INBOX selected.
struct ImapSession {
    tls: TlsStream,
    tag_counter: u32,
}

impl ImapSession {
    fn connect(host: &str, port: u16) -> Result<Self, MailboxError> {
        let tcp = TcpStream::connect((host, port)).map_err(|e| MailboxError::Connect {
            host: host.to_string(),
            port,
            reason: e.to_string(),
        })?;
        tcp.set_read_timeout(Some(Duration::from_secs(30)))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name: rustls::pki_types::ServerName<'_> =
            rustls::pki_types::ServerName::try_from(host.to_string())
                .map_err(|e| MailboxError::Tls(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| MailboxError::Tls(e.to_string()))?;
        let mut tls = rustls::StreamOwned::new(conn, tcp);

        // Server greeting arrives before any command.
        read_line(&mut tls)?;

        Ok(Self {
            tls,
            tag_counter: 1,
        })
    }

    fn login(&mut self, username: &str, password: &str) -> Result<(), MailboxError> {
        let response = self.send_command(&format!("LOGIN \"{username}\" \"{password}\""))?;
        if !last_line_ok(&response) {
            return Err(MailboxError::LoginFailed {
                username: username.to_string(),
            });
        }
        Ok(())
    }

    fn select_inbox(&mut self) -> Result<(), MailboxError> {
        let response = self.send_command("SELECT \"INBOX\"")?;
        if !last_line_ok(&response) {
            return Err(MailboxError::Command {
                command: "SELECT".to_string(),
                reason: "server refused INBOX".to_string(),
            });
        }
        Ok(())
    }

    /// `SEARCH SINCE dd-Mon-yyyy`. IMAP date granularity is a day, so
    /// the recency filter downstream re-checks the exact window.
    fn search_since(&mut self, since: DateTime<Utc>) -> Result<Vec<String>, MailboxError> {
        let response = self.send_command(&format!("SEARCH SINCE {}", imap_date(since)))?;
        if !last_line_ok(&response) {
            return Err(MailboxError::Command {
                command: "SEARCH".to_string(),
                reason: "server rejected the search".to_string(),
            });
        }
        Ok(parse_search_response(&response))
    }

    fn fetch_rfc822(&mut self, id: &str) -> Result<Vec<u8>, MailboxError> {
        let response = self.send_command(&format!("FETCH {id} RFC822"))?;
        if !last_line_ok(&response) {
            return Err(MailboxError::Fetch {
                id: id.to_string(),
                reason: "server rejected the fetch".to_string(),
            });
        }

        // Message lines sit between the untagged FETCH line and the
        // closing paren + tagged OK.
        let raw: String = response
            .iter()
            .skip(1)
            .take(response.len().saturating_sub(3))
            .cloned()
            .collect();
        Ok(raw.into_bytes())
    }

    fn logout(&mut self) {
        let _ = self.send_command("LOGOUT");
    }

    fn send_command(&mut self, command: &str) -> Result<Vec<String>, MailboxError> {
        let tag = format!("A{}", self.tag_counter);
        self.tag_counter += 1;

        let full = format!("{tag} {command}\r\n");
        IoWrite::write_all(&mut self.tls, full.as_bytes())?;
        IoWrite::flush(&mut self.tls)?;

        let mut lines = Vec::new();
        loop {
            let line = read_line(&mut self.tls)?;
            let done = line.starts_with(&tag);
            lines.push(line);
            if done {
                break;
            }
        }
        Ok(lines)
    }
}

fn read_line(tls: &mut TlsStream) -> Result<String, MailboxError> {
    let mut buf = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        match std::io::Read::read(tls, &mut byte) {
            Ok(0) => {
                return Err(MailboxError::Command {
                    command: "(read)".to_string(),
                    reason: "connection closed".to_string(),
                });
            }
            Ok(_) => {
                buf.push(byte[0]);
                if buf.ends_with(b"\r\n") {
                    return Ok(String::from_utf8_lossy(&buf).to_string());
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Format a UTC instant as an IMAP search date (`02-Jul-2025`).
fn imap_date(when: DateTime<Utc>) -> String {
    when.format("%d-%b-%Y").to_string()
}

/// Pull sequence numbers out of `* SEARCH n n n` response lines.
fn parse_search_response(lines: &[String]) -> Vec<String> {
    let mut ids = Vec::new();
    for line in lines {
        if let Some(rest) = line.trim_end().strip_prefix("* SEARCH") {
            ids.extend(rest.split_whitespace().map(String::from));
        }
    }
    ids
}

fn last_line_ok(lines: &[String]) -> bool {
    lines.last().is_some_and(|l| l.contains("OK"))
}
