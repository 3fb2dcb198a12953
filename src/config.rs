//! Configuration — built from environment variables.
//!
//! Every knob has a documented default; invalid numeric values fall back
//! to the default rather than aborting the run. Only the IMAP host and the
//! account credentials are required.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Digest run configuration.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    /// Where the assembled report is sent. Defaults to the account owner.
    pub recipient: String,
    /// Recency window in hours.
    pub lookback_hours: u64,
    /// Exact-match sender ignore list.
    pub ignore_senders: Vec<String>,
    pub categorise_model: String,
    pub summarise_model: String,
    pub categorise_ctx: u32,
    pub summarise_ctx: u32,
    pub ollama_url: String,
    /// Append a per-message listing (and summarize each record individually).
    pub individual_summaries: bool,
    /// Author a headline paragraph over all batch summaries.
    pub headline: bool,
    /// Author a concluding paragraph over the assembled body.
    pub concluding: bool,
    /// Convert HTML-only records to plain text via the model before categorizing.
    pub convert_html: bool,
    pub checkpoint_path: PathBuf,
    /// Leave the checkpoint file in place after a successful run.
    pub keep_checkpoint: bool,
}

impl DigestConfig {
    /// Build config from environment variables.
    ///
    /// Errors only on missing host/credentials; everything else defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let imap_host = require("DIGEST_IMAP_HOST")?;
        let username = require("DIGEST_USERNAME")?;
        let password = SecretString::from(require("DIGEST_PASSWORD")?);

        let smtp_host =
            std::env::var("DIGEST_SMTP_HOST").unwrap_or_else(|_| imap_host.replace("imap", "smtp"));
        let recipient = std::env::var("DIGEST_RECIPIENT").unwrap_or_else(|_| username.clone());

        let ignore_senders: Vec<String> = std::env::var("DIGEST_IGNORE_SENDERS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            imap_host,
            imap_port: env_or("DIGEST_IMAP_PORT", 993),
            smtp_host,
            smtp_port: env_or("DIGEST_SMTP_PORT", 465),
            username,
            password,
            recipient,
            lookback_hours: env_or("DIGEST_LOOKBACK_HOURS", 24),
            ignore_senders,
            categorise_model: std::env::var("DIGEST_CATEGORISE_MODEL")
                .unwrap_or_else(|_| "llama3.1:latest".to_string()),
            summarise_model: std::env::var("DIGEST_SUMMARISE_MODEL")
                .unwrap_or_else(|_| "llama3.1:latest".to_string()),
            categorise_ctx: env_or("DIGEST_CATEGORISE_CTX", 8_000),
            summarise_ctx: env_or("DIGEST_SUMMARISE_CTX", 130_000),
            ollama_url: std::env::var("DIGEST_OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            individual_summaries: env_flag("DIGEST_INDIVIDUAL_SUMMARIES", false),
            headline: env_flag("DIGEST_HEADLINE", true),
            concluding: env_flag("DIGEST_CONCLUDING", true),
            convert_html: env_flag("DIGEST_CONVERT_HTML", false),
            checkpoint_path: std::env::var("DIGEST_CHECKPOINT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("digest_state.json")),
            keep_checkpoint: env_flag("DIGEST_KEEP_CHECKPOINT", false),
        })
    }
}

fn require(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse an env var, falling back to the default on absence or garbage.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Boolean flags accept true/false, yes/no, 1/0 (case-insensitive).
fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => parse_flag(&v).unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parsing_accepts_common_spellings() {
        assert_eq!(parse_flag("YES"), Some(true));
        assert_eq!(parse_flag("no"), Some(false));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" true "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
    }

    #[test]
    fn flag_parsing_rejects_garbage() {
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(parse_flag(""), None);
    }

    #[test]
    fn missing_required_var_is_an_error() {
        // SAFETY: no other thread reads this variable concurrently in tests.
        unsafe { std::env::remove_var("DIGEST_IMAP_HOST") };
        let err = require("DIGEST_IMAP_HOST").unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }
}
