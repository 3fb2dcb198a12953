//! Message normalization — raw RFC822 bytes into a clean [`EmailRecord`].
//!
//! Every header decodes independently; a failure yields that field's
//! sentinel and the record carries on. Body extraction walks all MIME
//! parts, keeping plain text and HTML in separate accumulators.

use std::sync::LazyLock;

use mail_parser::MessageParser;
use regex::Regex;

use crate::pipeline::types::{
    EmailRecord, NO_SUBJECT, UNKNOWN_DATE, UNKNOWN_MESSAGE_ID, UNKNOWN_SENDER,
};

/// Mislabeled-part guard: a "plain text" payload that still opens an HTML
/// document does not belong in the plain-text accumulator.
static HTML_ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<\s*html\b").unwrap());

/// HTML entity tokens surviving in decoded text (`&nbsp;`, `&#8217;` …).
static ENTITY_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^&\S*;$").unwrap());

/// Tokens longer than this are unlikely to be real words, usually
/// tracking URLs or base64 debris that survived decoding.
const MAX_WORD_LEN: usize = 15;

/// Parse one raw message into a record with `category = UNPROCESSED`.
///
/// Unparsable input still yields a record (all sentinels, empty bodies);
/// the empty-body filter downstream discards it.
pub fn normalize(raw: &[u8]) -> EmailRecord {
    let Some(parsed) = MessageParser::default().parse(raw) else {
        return EmailRecord::new(
            UNKNOWN_MESSAGE_ID,
            UNKNOWN_DATE,
            UNKNOWN_SENDER,
            NO_SUBJECT,
            "",
            "",
        );
    };

    let message_id = parsed
        .message_id()
        .map(|s| format!("<{s}>"))
        .unwrap_or_else(|| UNKNOWN_MESSAGE_ID.to_string());

    let sender = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

    let subject = parsed
        .subject()
        .map(|s| s.replace('\n', ""))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| NO_SUBJECT.to_string());

    let date_sent = parsed
        .date()
        .and_then(|d| {
            // mail-parser exposes broken-down fields; rebuild through chrono
            // so downstream parsing has one canonical shape.
            let date = chrono::NaiveDate::from_ymd_opt(
                d.year as i32,
                u32::from(d.month),
                u32::from(d.day),
            )?;
            let time = date.and_hms_opt(
                u32::from(d.hour),
                u32::from(d.minute),
                u32::from(d.second),
            )?;
            let offset_secs = i32::from(d.tz_hour) * 3600 + i32::from(d.tz_minute) * 60;
            let offset_secs = if d.tz_before_gmt {
                -offset_secs
            } else {
                offset_secs
            };
            let offset = chrono::FixedOffset::east_opt(offset_secs)?;
            Some(time.and_local_timezone(offset).single()?.to_rfc2822())
        })
        .unwrap_or_else(|| UNKNOWN_DATE.to_string());

    let (plain_text, html) = extract_bodies(&parsed);

    EmailRecord::new(
        message_id,
        date_sent,
        sender,
        subject,
        format_body(&plain_text),
        html,
    )
}

/// Concatenate every text/plain part and every text/html part separately.
fn extract_bodies(parsed: &mail_parser::Message) -> (String, String) {
    let mut plain = String::new();
    let mut html = String::new();

    for index in 0..parsed.text_body_count() {
        if let Some(text) = parsed.body_text(index) {
            if HTML_ROOT.is_match(&text) {
                continue;
            }
            plain.push_str(&text);
            plain.push('\n');
        }
    }

    for index in 0..parsed.html_body_count() {
        if let Some(part) = parsed.body_html(index) {
            html.push_str(&part);
            html.push('\n');
        }
    }

    (plain, html)
}

/// Code points that routinely corrupt model input; each becomes the
/// replacement shown (empty string = removed).
const CHAR_REPLACEMENTS: &[(char, &str)] = &[
    ('\u{200c}', " "), // zero-width non-joiner
    ('\u{2019}', " "), // right single quote
    ('\u{2018}', " "), // left single quote
    ('\u{201c}', " "), // left double quote
    ('\u{201d}', ""),  // right double quote
    ('\u{00a9}', " "), // copyright sign
    ('\u{2014}', " "), // em dash
    ('\u{2013}', ""),  // en dash
    ('\u{2012}', ""),  // figure dash
    ('\u{1f49a}', " "),
];

/// Clean up decoded plain text for model consumption.
///
/// Newlines, tabs, control characters and the table above collapse to
/// spaces; whitespace runs collapse; entity tokens and over-long tokens
/// are dropped. Runs only on plain text, never on HTML.
pub fn format_body(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_control() {
            cleaned.push(' ');
            continue;
        }
        match CHAR_REPLACEMENTS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => cleaned.push_str(to),
            None => cleaned.push(c),
        }
    }

    cleaned
        .split_whitespace()
        .filter(|word| !ENTITY_TOKEN.is_match(word))
        .filter(|word| word.chars().count() <= MAX_WORD_LEN)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::UNPROCESSED;

    const PLAIN_MESSAGE: &[u8] = b"Message-ID: <100@example>\r\n\
Date: Tue, 1 Jul 2025 10:00:00 +0000\r\n\
From: Alice Example <alice@example.com>\r\n\
Subject: Launch update\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
The launch went well.\r\n";

    #[test]
    fn plain_message_normalizes_fully() {
        let record = normalize(PLAIN_MESSAGE);
        assert_eq!(record.message_id, "<100@example>");
        assert_eq!(record.sender, "alice@example.com");
        assert_eq!(record.subject, "Launch update");
        assert_eq!(record.plain_text, "The launch went well.");
        assert_eq!(record.category, UNPROCESSED);
        assert!(record.parsed_date().is_some());
    }

    #[test]
    fn missing_headers_fall_back_to_sentinels() {
        let raw = b"Content-Type: text/plain\r\n\r\nJust a body.\r\n";
        let record = normalize(raw);
        assert_eq!(record.message_id, UNKNOWN_MESSAGE_ID);
        assert_eq!(record.sender, UNKNOWN_SENDER);
        assert_eq!(record.subject, NO_SUBJECT);
        assert_eq!(record.date_sent, UNKNOWN_DATE);
        assert_eq!(record.plain_text, "Just a body.");
    }

    #[test]
    fn multipart_splits_plain_and_html() {
        let raw = b"Message-ID: <2@example>\r\n\
From: bob@example.com\r\n\
Subject: Mixed\r\n\
Content-Type: multipart/alternative; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain\r\n\
\r\n\
Plain words here.\r\n\
--XYZ\r\n\
Content-Type: text/html\r\n\
\r\n\
<html><body><p>Rich words here.</p></body></html>\r\n\
--XYZ--\r\n";
        let record = normalize(raw);
        assert!(record.plain_text.contains("Plain words here."));
        assert!(!record.plain_text.contains("Rich words"));
        assert!(record.html.contains("<p>Rich words here.</p>"));
    }

    #[test]
    fn mislabeled_html_part_is_kept_out_of_plain_text() {
        assert!(HTML_ROOT.is_match("<html><body>x</body></html>"));
        assert!(HTML_ROOT.is_match("prefix < HTML lang=\"en\">"));
        assert!(!HTML_ROOT.is_match("the <htmlish> tag"));
    }

    #[test]
    fn unparsable_input_yields_sentinel_record() {
        let record = normalize(&[]);
        assert_eq!(record.message_id, UNKNOWN_MESSAGE_ID);
        assert!(record.plain_text.is_empty());
        assert!(record.html.is_empty());
    }

    // ── format_body ─────────────────────────────────────────────────

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(format_body("a\n\nb\t\tc   d"), "a b c d");
    }

    #[test]
    fn entity_tokens_are_dropped() {
        assert_eq!(format_body("hello &nbsp; world &#8217;"), "hello world");
    }

    #[test]
    fn entity_characters_inside_words_survive() {
        assert_eq!(format_body("AT&T;  works"), "AT&T; works");
    }

    #[test]
    fn overlong_tokens_are_dropped() {
        assert_eq!(
            format_body("short https://example.com/a-very-long-tracking-url end"),
            "short end"
        );
    }

    #[test]
    fn fifteen_char_tokens_survive() {
        let word = "a".repeat(15);
        assert_eq!(format_body(&word), word);
        let too_long = "a".repeat(16);
        assert_eq!(format_body(&too_long), "");
    }

    #[test]
    fn problematic_code_points_become_spaces_or_vanish() {
        assert_eq!(format_body("it\u{2019}s fine"), "it s fine");
        assert_eq!(format_body("range 1\u{2013}2"), "range 12");
        assert_eq!(format_body("\u{201c}quoted\u{201d}"), "quoted");
    }
}
