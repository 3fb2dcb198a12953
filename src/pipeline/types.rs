//! Shared types for the digest pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Sentinels ───────────────────────────────────────────────────────

/// Category value of a record no stage has classified yet.
pub const UNPROCESSED: &str = "UNPROCESSED";

/// Fallback category when the classifier never produces a usable label.
pub const OTHER: &str = "OTHER";

/// Message-ID fallback. Sentinel ids are NOT unique: two records carrying
/// this value are still distinct messages and must never dedupe against
/// each other.
pub const UNKNOWN_MESSAGE_ID: &str = "(unknown message id)";

/// Sender fallback when the From header cannot be decoded.
pub const UNKNOWN_SENDER: &str = "(unknown sender)";

/// Subject fallback when decoding fails.
pub const NO_SUBJECT: &str = "(no subject)";

/// Date fallback when the header is absent.
pub const UNKNOWN_DATE: &str = "(unknown date)";

// ── Email record ────────────────────────────────────────────────────

/// One distinct mailbox message, normalized.
///
/// A record is *done* once `category` moves off [`UNPROCESSED`]; done
/// records are never re-submitted to the categorizer on resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Unique key, or [`UNKNOWN_MESSAGE_ID`] when the header is missing.
    pub message_id: String,
    /// Raw Date header string; parsed on demand.
    pub date_sent: String,
    /// Decoded From header.
    pub sender: String,
    /// Decoded Subject header.
    pub subject: String,
    /// Cleaned plain-text body (all text/plain parts, post `format_body`).
    pub plain_text: String,
    /// Concatenated text/html parts, untouched by cleanup.
    pub html: String,
    /// Closed-vocabulary label, [`OTHER`], or [`UNPROCESSED`].
    pub category: String,
    /// Per-message summary; empty until (and unless) one is produced.
    pub summary: String,
}

impl EmailRecord {
    /// A fresh record awaiting categorization.
    pub fn new(
        message_id: impl Into<String>,
        date_sent: impl Into<String>,
        sender: impl Into<String>,
        subject: impl Into<String>,
        plain_text: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            date_sent: date_sent.into(),
            sender: sender.into(),
            subject: subject.into(),
            plain_text: plain_text.into(),
            html: html.into(),
            category: UNPROCESSED.to_string(),
            summary: String::new(),
        }
    }

    /// Has this record been categorized?
    pub fn is_done(&self) -> bool {
        self.category != UNPROCESSED
    }

    /// Parse `date_sent`, RFC 2822 first (the mail wire format), then
    /// RFC 3339 as a fallback for checkpoints written by hand.
    pub fn parsed_date(&self) -> Option<DateTime<Utc>> {
        parse_mail_date(&self.date_sent)
    }

    /// Empty plain text but a non-empty HTML body: a candidate for
    /// model-assisted HTML-to-text conversion.
    pub fn is_html_only(&self) -> bool {
        self.plain_text.trim().is_empty() && !self.html.trim().is_empty()
    }
}

/// Parse a Date header value into UTC.
pub fn parse_mail_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .or_else(|_| DateTime::parse_from_rfc3339(raw.trim()))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ── Batch keys ──────────────────────────────────────────────────────

/// Cache key for one summarized chunk: `"{category}#{index}"`.
pub fn batch_key(category: &str, index: usize) -> String {
    format!("{category}#{index}")
}

// ── Pipeline state ──────────────────────────────────────────────────

/// The whole pipeline's progress, serialized verbatim into the checkpoint.
///
/// Owned exclusively by the running pipeline and passed by reference
/// through each stage; there is no ambient state anywhere else.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineState {
    /// Fetch order, re-sorted oldest-first before summarization.
    pub records: Vec<EmailRecord>,
    /// Batch key → summary text.
    pub batch_summaries: std::collections::BTreeMap<String, String>,
    /// Computed at most once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline_summary: Option<String>,
    /// Computed at most once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concluding_paragraph: Option<String>,
}

impl PipelineState {
    /// Count of records still awaiting categorization.
    pub fn pending(&self) -> usize {
        self.records.iter().filter(|r| !r.is_done()).count()
    }

    /// Sort records oldest-first by parsed date; unparsable dates keep
    /// their relative position at the end.
    pub fn sort_oldest_first(&mut self) {
        self.records.sort_by_key(|r| {
            r.parsed_date()
                .map(|d| d.timestamp())
                .unwrap_or(i64::MAX)
        });
    }

    /// Earliest and latest `date_sent` strings, by record order.
    ///
    /// Callers sort before summarization, so first/last is the window.
    pub fn date_window(&self) -> Option<(&str, &str)> {
        let first = self.records.first()?;
        let last = self.records.last()?;
        Some((first.date_sent.as_str(), last.date_sent.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, date: &str) -> EmailRecord {
        EmailRecord::new(id, date, "a@example.com", "Subject", "body", "")
    }

    #[test]
    fn fresh_record_is_unprocessed() {
        let r = record("<1@x>", "Tue, 1 Jul 2025 10:00:00 +0000");
        assert!(!r.is_done());
        assert_eq!(r.category, UNPROCESSED);
        assert_eq!(r.summary, "");
    }

    #[test]
    fn categorized_record_is_done() {
        let mut r = record("<1@x>", "Tue, 1 Jul 2025 10:00:00 +0000");
        r.category = "NEWS".to_string();
        assert!(r.is_done());
    }

    #[test]
    fn rfc2822_dates_parse() {
        let r = record("<1@x>", "Tue, 1 Jul 2025 10:00:00 +0100");
        let parsed = r.parsed_date().unwrap();
        assert_eq!(parsed.timestamp(), 1751360400);
    }

    #[test]
    fn garbage_dates_do_not_parse() {
        assert!(record("<1@x>", "(unknown date)").parsed_date().is_none());
        assert!(record("<1@x>", "").parsed_date().is_none());
    }

    #[test]
    fn html_only_detection() {
        let r = EmailRecord::new("<1@x>", "d", "s", "subj", "  ", "<p>hi</p>");
        assert!(r.is_html_only());
        let r = EmailRecord::new("<1@x>", "d", "s", "subj", "text", "<p>hi</p>");
        assert!(!r.is_html_only());
    }

    #[test]
    fn batch_keys_are_category_scoped() {
        assert_eq!(batch_key("NEWS", 0), "NEWS#0");
        assert_eq!(batch_key("PERSONAL", 3), "PERSONAL#3");
    }

    #[test]
    fn sort_puts_unparsable_dates_last() {
        let mut state = PipelineState::default();
        state.records = vec![
            record("<2@x>", "Wed, 2 Jul 2025 10:00:00 +0000"),
            record("<u@x>", "(unknown date)"),
            record("<1@x>", "Tue, 1 Jul 2025 10:00:00 +0000"),
        ];
        state.sort_oldest_first();
        assert_eq!(state.records[0].message_id, "<1@x>");
        assert_eq!(state.records[1].message_id, "<2@x>");
        assert_eq!(state.records[2].message_id, "<u@x>");
    }

    #[test]
    fn date_window_is_first_and_last() {
        let mut state = PipelineState::default();
        assert!(state.date_window().is_none());
        state.records = vec![
            record("<1@x>", "Tue, 1 Jul 2025 10:00:00 +0000"),
            record("<2@x>", "Wed, 2 Jul 2025 10:00:00 +0000"),
        ];
        let (earliest, latest) = state.date_window().unwrap();
        assert_eq!(earliest, "Tue, 1 Jul 2025 10:00:00 +0000");
        assert_eq!(latest, "Wed, 2 Jul 2025 10:00:00 +0000");
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = PipelineState::default();
        state.records.push(record("<1@x>", "Tue, 1 Jul 2025 10:00:00 +0000"));
        state
            .batch_summaries
            .insert(batch_key("NEWS", 0), "A summary.".to_string());
        state.headline_summary = Some("Headline.".to_string());
        let json = serde_json::to_string_pretty(&state).unwrap();
        let back: PipelineState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.records.len(), 1);
        assert_eq!(back.batch_summaries["NEWS#0"], "A summary.");
        assert_eq!(back.headline_summary.as_deref(), Some("Headline."));
        assert!(back.concluding_paragraph.is_none());
    }
}
