//! Report assembly — pure. No inference calls happen here.

use crate::pipeline::summarize::order_categories;
use crate::pipeline::types::{PipelineState, batch_key};

/// The assembled outbound document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub subject: String,
    /// HTML body.
    pub body: String,
}

/// Deterministic subject line for the outbound mail.
pub fn report_subject(earliest: &str, latest: &str) -> String {
    format!("Summary of messages from {earliest} to {latest}")
}

/// Render the per-category sections: label, message count, and that
/// category's batch summaries in chunk order.
///
/// Exposed separately because the concluding pass reads exactly this text.
pub fn assemble_sections(state: &PipelineState) -> String {
    let mut sections = String::new();
    for category in order_categories(&state.records) {
        let count = state
            .records
            .iter()
            .filter(|r| r.category == category)
            .count();
        let noun = if count == 1 { "message" } else { "messages" };
        sections.push_str(&format!("<hr><h2>{category} ({count} {noun})</h2>\n"));

        for batch_index in 0.. {
            match state.batch_summaries.get(&batch_key(&category, batch_index)) {
                Some(summary) => sections.push_str(&format!("<p>{summary}</p>\n")),
                None => break,
            }
        }
    }
    sections
}

/// Assemble the full report document.
///
/// Headline and concluding blocks appear iff present in state; the
/// per-message listing is appended when `include_details` is set.
pub fn assemble(state: &PipelineState, include_details: bool) -> Report {
    let (earliest, latest) = match state.date_window() {
        Some(window) => window,
        None => ("(none)", "(none)"),
    };
    let subject = report_subject(earliest, latest);

    let mut body = format!(
        "<p>Here are the AI-powered summaries of the emails from {earliest} to {latest}:</p>\n"
    );

    if let Some(ref headline) = state.headline_summary {
        body.push_str("<hr><h2>Main Report</h2>\n");
        body.push_str(&format!("<p>{headline}</p>\n"));
    }

    body.push_str(&assemble_sections(state));

    if let Some(ref concluding) = state.concluding_paragraph {
        body.push_str("<hr><h2>Concluding Paragraph</h2>\n");
        body.push_str(&format!("<p>{concluding}</p>\n"));
    }

    if include_details {
        body.push_str("<hr><h2>All Messages</h2>\n");
        for record in &state.records {
            body.push_str(&format!(
                "<p>From: {}<br>Date: {}<br>Subject: {}<br>Category: {}<br>Summary: {}</p>\n",
                record.sender, record.date_sent, record.subject, record.category, record.summary
            ));
        }
    }

    Report { subject, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::EmailRecord;

    fn record(category: &str, n: usize) -> EmailRecord {
        let mut r = EmailRecord::new(
            format!("<{n}@example>"),
            format!("Tue, 1 Jul 2025 {:02}:00:00 +0000", n % 24),
            format!("sender{n}@example.com"),
            format!("Subject {n}"),
            "body",
            "",
        );
        r.category = category.to_string();
        r
    }

    fn news_state() -> PipelineState {
        let mut state = PipelineState::default();
        state.records = (0..12).map(|n| record("NEWS", n)).collect();
        state
            .batch_summaries
            .insert(batch_key("NEWS", 0), "First ten stories.".to_string());
        state
            .batch_summaries
            .insert(batch_key("NEWS", 1), "Last two stories.".to_string());
        state
    }

    #[test]
    fn subject_names_the_window() {
        assert_eq!(
            report_subject("Mon 1", "Tue 2"),
            "Summary of messages from Mon 1 to Tue 2"
        );
    }

    #[test]
    fn one_section_per_category_with_count() {
        let report = assemble(&news_state(), false);
        assert!(report.body.contains("<h2>NEWS (12 messages)</h2>"));
        assert_eq!(report.body.matches("<h2>NEWS").count(), 1);
    }

    #[test]
    fn batch_summaries_appear_in_chunk_order() {
        let report = assemble(&news_state(), false);
        let first = report.body.find("First ten stories.").unwrap();
        let second = report.body.find("Last two stories.").unwrap();
        assert!(first < second);
    }

    #[test]
    fn headline_precedes_sections_concluding_follows() {
        let mut state = news_state();
        state.headline_summary = Some("The big picture.".to_string());
        state.concluding_paragraph = Some("In conclusion, done.".to_string());

        let report = assemble(&state, false);
        let headline = report.body.find("The big picture.").unwrap();
        let section = report.body.find("First ten stories.").unwrap();
        let concluding = report.body.find("In conclusion, done.").unwrap();
        assert!(headline < section);
        assert!(section < concluding);
    }

    #[test]
    fn optional_blocks_absent_when_unset() {
        let report = assemble(&news_state(), false);
        assert!(!report.body.contains("Main Report"));
        assert!(!report.body.contains("Concluding Paragraph"));
        assert!(!report.body.contains("All Messages"));
    }

    #[test]
    fn detail_listing_includes_every_record() {
        let mut state = news_state();
        for r in &mut state.records {
            r.summary = "Summarized.".to_string();
        }
        let report = assemble(&state, true);
        assert!(report.body.contains("All Messages"));
        for n in 0..12 {
            assert!(report.body.contains(&format!("sender{n}@example.com")));
        }
        assert!(report.body.contains("Category: NEWS"));
    }

    #[test]
    fn intro_line_names_earliest_and_latest() {
        let report = assemble(&news_state(), false);
        assert!(report.subject.contains("Tue, 1 Jul 2025 00:00:00 +0000"));
        assert!(report.subject.contains("Tue, 1 Jul 2025 11:00:00 +0000"));
        assert!(
            report
                .body
                .contains("from Tue, 1 Jul 2025 00:00:00 +0000 to Tue, 1 Jul 2025 11:00:00 +0000")
        );
    }

    #[test]
    fn assembly_is_deterministic() {
        let mut state = news_state();
        state.headline_summary = Some("H.".to_string());
        let a = assemble(&state, true);
        let b = assemble(&state, true);
        assert_eq!(a, b);
    }

    #[test]
    fn sections_follow_category_presentation_order() {
        let mut state = PipelineState::default();
        state.records = vec![record("WORK", 0), record("PERSONAL", 1), record("NEWS", 2)];
        state.batch_summaries.insert(batch_key("WORK", 0), "w".into());
        state
            .batch_summaries
            .insert(batch_key("PERSONAL", 0), "p".into());
        state.batch_summaries.insert(batch_key("NEWS", 0), "n".into());

        let body = assemble_sections(&state);
        let personal = body.find("PERSONAL").unwrap();
        let news = body.find("NEWS").unwrap();
        let work = body.find("WORK").unwrap();
        assert!(personal < news);
        assert!(news < work);
    }
}
