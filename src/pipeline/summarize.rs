//! Batch summarization — one prose paragraph per chunk of ≤10
//! same-category records, cached by batch key and checkpointed per chunk.
//!
//! Also owns the optional headline and concluding passes and the
//! per-record individual summaries behind the detail flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use crate::checkpoint::CheckpointStore;
use crate::error::PipelineError;
use crate::llm::{LlmClient, prompts};
use crate::pipeline::types::{EmailRecord, PipelineState, batch_key};

/// Maximum records per summarization chunk; keeps one call comfortably
/// inside the summarizer model's context window.
pub const MAX_BATCH_RECORDS: usize = 10;

/// Bodies at or under this length get the fixed fallback instead of an
/// inference call.
const MIN_BODY_CHARS: usize = 20;

/// Fallback text for bodies too short to be worth a call.
const SHORT_BODY_FALLBACK: &str = "The email content was too short to summarise";

/// Summarizer over the inference seam.
pub struct BatchSummarizer {
    llm: Arc<dyn LlmClient>,
    model: String,
    context_size: u32,
    cancel: Option<Arc<AtomicBool>>,
}

impl BatchSummarizer {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>, context_size: u32) -> Self {
        Self {
            llm,
            model: model.into(),
            context_size,
            cancel: None,
        }
    }

    /// Cooperative cancellation: the flag is checked before each inference
    /// call, and a set flag flushes the checkpoint and stops the run.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn interrupted(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn bail_if_interrupted(
        &self,
        state: &PipelineState,
        checkpoint: &CheckpointStore,
    ) -> Result<(), PipelineError> {
        if self.interrupted() {
            checkpoint.save(state)?;
            return Err(PipelineError::Interrupted);
        }
        Ok(())
    }

    /// Summarize every uncached chunk, saving the checkpoint after each.
    ///
    /// Resumability unit = one chunk: a restart re-enters here and skips
    /// straight past everything already in `batch_summaries`.
    pub async fn summarize_batches(
        &self,
        state: &mut PipelineState,
        checkpoint: &CheckpointStore,
    ) -> Result<(), PipelineError> {
        for category in order_categories(&state.records) {
            let indices: Vec<usize> = state
                .records
                .iter()
                .enumerate()
                .filter(|(_, r)| r.category == category)
                .map(|(i, _)| i)
                .collect();

            let chunk_count = indices.len().div_ceil(MAX_BATCH_RECORDS);
            info!(
                category = %category,
                records = indices.len(),
                chunks = chunk_count,
                "Summarizing category"
            );

            for (batch_index, chunk) in indices.chunks(MAX_BATCH_RECORDS).enumerate() {
                let key = batch_key(&category, batch_index);
                if state.batch_summaries.contains_key(&key) {
                    debug!(key = %key, "Chunk already summarized, skipping");
                    continue;
                }
                self.bail_if_interrupted(state, checkpoint)?;

                let content: String = chunk
                    .iter()
                    .map(|&i| record_block(&state.records[i]))
                    .collect();

                let response = self
                    .llm
                    .chat(&self.model, prompts::BATCH_SUMMARY, &content, self.context_size)
                    .await
                    .map_err(|e| PipelineError::Summarize {
                        batch_key: key.clone(),
                        reason: e.to_string(),
                    })?;

                state.batch_summaries.insert(key, clean_response(&response));
                checkpoint.save(state)?;
            }
        }
        Ok(())
    }

    /// Author the introductory paragraph over all batch summaries.
    /// Computed at most once; cached in state and checkpointed.
    pub async fn headline(
        &self,
        state: &mut PipelineState,
        checkpoint: &CheckpointStore,
    ) -> Result<(), PipelineError> {
        if state.headline_summary.is_some() {
            return Ok(());
        }
        self.bail_if_interrupted(state, checkpoint)?;

        let combined = ordered_batch_summaries(state).join("\n\n");
        let response = self
            .llm
            .chat(&self.model, prompts::HEADLINE, &combined, self.context_size)
            .await?;
        state.headline_summary = Some(clean_response(&response));
        checkpoint.save(state)?;
        Ok(())
    }

    /// Author the closing paragraph over the assembled report body.
    /// Computed at most once; cached in state and checkpointed.
    pub async fn concluding(
        &self,
        state: &mut PipelineState,
        assembled_body: &str,
        checkpoint: &CheckpointStore,
    ) -> Result<(), PipelineError> {
        if state.concluding_paragraph.is_some() {
            return Ok(());
        }
        self.bail_if_interrupted(state, checkpoint)?;

        let response = self
            .llm
            .chat(
                &self.model,
                prompts::CONCLUDING,
                assembled_body,
                self.context_size,
            )
            .await?;
        state.concluding_paragraph = Some(clean_response(&response));
        checkpoint.save(state)?;
        Ok(())
    }

    /// Fill `summary` on each record that still lacks one (detail flag).
    /// Checkpointed per record; bodies ≤20 chars get the fixed fallback.
    pub async fn summarize_individual(
        &self,
        state: &mut PipelineState,
        checkpoint: &CheckpointStore,
    ) -> Result<(), PipelineError> {
        let total = state.records.len();
        for index in 0..total {
            if !state.records[index].summary.is_empty() {
                continue;
            }
            self.bail_if_interrupted(state, checkpoint)?;

            debug!(n = index + 1, total, "Summarizing individual message");
            let summary = if state.records[index].plain_text.len() > MIN_BODY_CHARS {
                let response = self
                    .llm
                    .chat(
                        &self.model,
                        prompts::INDIVIDUAL_SUMMARY,
                        &state.records[index].plain_text,
                        self.context_size,
                    )
                    .await?;
                response.trim().replace('\n', ".")
            } else {
                SHORT_BODY_FALLBACK.to_string()
            };

            state.records[index].summary = summary;
            checkpoint.save(state)?;
        }
        Ok(())
    }
}

// ── Ordering ────────────────────────────────────────────────────────

/// Distinct categories for presentation: PERSONAL first if present, NEWS
/// second if present, remainder alphabetical.
pub fn order_categories(records: &[EmailRecord]) -> Vec<String> {
    let distinct: std::collections::BTreeSet<&str> =
        records.iter().map(|r| r.category.as_str()).collect();
    let mut categories: Vec<String> = distinct.into_iter().map(String::from).collect();

    if let Some(pos) = categories.iter().position(|c| c == "PERSONAL") {
        let personal = categories.remove(pos);
        categories.insert(0, personal);
    }
    if let Some(pos) = categories.iter().position(|c| c == "NEWS") {
        let news = categories.remove(pos);
        categories.insert(1.min(categories.len()), news);
    }
    categories
}

/// Every cached batch summary in presentation order: category order, then
/// chunk order within each category.
pub fn ordered_batch_summaries(state: &PipelineState) -> Vec<String> {
    let mut summaries = Vec::new();
    for category in order_categories(&state.records) {
        for batch_index in 0.. {
            match state.batch_summaries.get(&batch_key(&category, batch_index)) {
                Some(summary) => summaries.push(summary.clone()),
                None => break,
            }
        }
    }
    summaries
}

/// The `From:/Subject:/Body:` block for one record.
fn record_block(record: &EmailRecord) -> String {
    format!(
        "From: {}\nSubject: {}\nBody: {}\n\n",
        record.sender, record.subject, record.plain_text
    )
}

// ── Response cleanup ────────────────────────────────────────────────

/// Post-process one free-text summary.
///
/// Sentence boundaries are detected by splitting on `". "`, a known
/// fragility of free-text post-processing. It lives in this one function
/// so the heuristic can be swapped without touching callers.
pub fn clean_response(response: &str) -> String {
    let text = strip_enclosing_quotes(response.trim());
    let flattened = text.replace('\n', " ");

    let mut sentences: Vec<&str> = flattened.split(". ").collect();
    if let Some(first) = sentences.first() {
        let lower = first.to_lowercase();
        // The model sometimes narrates its own task despite instructions.
        if sentences.len() > 1 && (lower.contains("summary") || lower.contains("paragraph")) {
            sentences.remove(0);
        }
    }
    let joined = sentences.join(". ");

    match joined.find("In my opinion") {
        Some(pos) => {
            let (head, opinion) = joined.split_at(pos);
            format!("{head}<em>{opinion}</em>")
        }
        None => joined,
    }
}

/// Remove one pair of enclosing quote characters, if present.
fn strip_enclosing_quotes(text: &str) -> &str {
    for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}'), ('\'', '\'')] {
        if text.len() >= 2 && text.starts_with(open) && text.ends_with(close) {
            return &text[open.len_utf8()..text.len() - close.len_utf8()];
        }
    }
    text
}
