//! List transforms over normalized records.
//!
//! Three independent pure functions, composed by the pipeline in a fixed
//! order: recency → sender exclusion → dedup.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::pipeline::types::EmailRecord;

/// Keep records whose `date_sent` parses and falls within the lookback
/// window ending at `now`. Unparsable dates are dropped, not kept, not
/// errors.
pub fn recency_filter(
    records: Vec<EmailRecord>,
    lookback: Duration,
    now: DateTime<Utc>,
) -> Vec<EmailRecord> {
    let cutoff = now - lookback;
    let before = records.len();
    let kept: Vec<EmailRecord> = records
        .into_iter()
        .filter(|r| match r.parsed_date() {
            Some(date) => date >= cutoff && date <= now,
            None => false,
        })
        .collect();
    debug!(
        kept = kept.len(),
        dropped = before - kept.len(),
        "Recency filter applied"
    );
    kept
}

/// Drop records whose sender exactly matches an ignore-list entry.
pub fn sender_filter(records: Vec<EmailRecord>, ignore: &[String]) -> Vec<EmailRecord> {
    if ignore.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|r| !ignore.iter().any(|entry| entry == &r.sender))
        .collect()
}

/// Keep the newest record for each distinct `(sender, subject)` pair.
///
/// Mailing-list and retried deliveries commonly repeat sender+subject;
/// sorting descending by date first means the survivor is the newest
/// copy. Returns the survivors plus the number of duplicates removed.
pub fn deduplicate(mut records: Vec<EmailRecord>) -> (Vec<EmailRecord>, usize) {
    records.sort_by_key(|r| {
        std::cmp::Reverse(r.parsed_date().map(|d| d.timestamp()).unwrap_or(i64::MIN))
    });

    let before = records.len();
    let mut seen = std::collections::HashSet::new();
    let kept: Vec<EmailRecord> = records
        .into_iter()
        .filter(|r| seen.insert((r.sender.clone(), r.subject.clone())))
        .collect();

    let removed = before - kept.len();
    if removed > 0 {
        debug!(removed, "Duplicate sender/subject pairs removed");
    }
    (kept, removed)
}
