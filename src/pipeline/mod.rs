//! The digest pipeline.
//!
//! Fetch → normalize → filter → dedupe → categorize → summarize →
//! assemble, fully sequential, with the checkpoint rewritten after every
//! unit of work. Delivery is the caller's job; [`DigestPipeline::run`]
//! ends at the assembled [`Report`].

pub mod categorize;
pub mod filters;
pub mod report;
pub mod summarize;
pub mod types;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::checkpoint::CheckpointStore;
use crate::config::DigestConfig;
use crate::error::{Error, PipelineError};
use crate::llm::{LlmClient, prompts};
use crate::mailbox::{Mailbox, normalize};
use crate::pipeline::categorize::Categorizer;
use crate::pipeline::report::Report;
use crate::pipeline::summarize::BatchSummarizer;
use crate::pipeline::types::PipelineState;

/// The whole run, owning the single [`PipelineState`] instance.
pub struct DigestPipeline {
    config: DigestConfig,
    mailbox: Arc<dyn Mailbox>,
    llm: Arc<dyn LlmClient>,
    checkpoint: CheckpointStore,
    cancel: Arc<AtomicBool>,
}

impl DigestPipeline {
    pub fn new(config: DigestConfig, mailbox: Arc<dyn Mailbox>, llm: Arc<dyn LlmClient>) -> Self {
        let checkpoint = CheckpointStore::new(config.checkpoint_path.clone());
        Self {
            config,
            mailbox,
            llm,
            checkpoint,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that requests cooperative cancellation. Setting it makes the
    /// pipeline flush the checkpoint and stop before its next unit of work.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    /// Run the pipeline to an assembled report.
    ///
    /// The checkpoint is consulted before any inference happens; records
    /// and batches already done in a previous run are never re-submitted.
    pub async fn run(&self) -> Result<Report, Error> {
        let mut state = match self.checkpoint.load()? {
            Some(state) => state,
            None => self.ingest().await?,
        };

        // An empty window leaves no checkpoint behind: the next run should
        // ingest afresh rather than resume an empty state.
        if state.records.is_empty() {
            return Err(PipelineError::EmptyMailbox.into());
        }
        self.checkpoint.save(&state)?;

        if self.config.convert_html {
            self.convert_html_only(&mut state).await?;
        }
        self.categorize_all(&mut state).await?;

        let summarizer = BatchSummarizer::new(
            Arc::clone(&self.llm),
            &self.config.summarise_model,
            self.config.summarise_ctx,
        )
        .with_cancel_flag(Arc::clone(&self.cancel));

        summarizer
            .summarize_batches(&mut state, &self.checkpoint)
            .await?;
        if self.config.individual_summaries {
            summarizer
                .summarize_individual(&mut state, &self.checkpoint)
                .await?;
        }
        if self.config.headline {
            summarizer.headline(&mut state, &self.checkpoint).await?;
        }
        if self.config.concluding {
            let sections = report::assemble_sections(&state);
            summarizer
                .concluding(&mut state, &sections, &self.checkpoint)
                .await?;
        }

        Ok(report::assemble(&state, self.config.individual_summaries))
    }

    /// Fetch and normalize everything in the lookback window, then apply
    /// recency → sender → dedup and sort oldest-first.
    async fn ingest(&self) -> Result<PipelineState, Error> {
        let now = Utc::now();
        let lookback = Duration::hours(self.config.lookback_hours as i64);

        let ids = self.mailbox.list_message_ids(now - lookback).await?;
        info!(total = ids.len(), "Messages found in mailbox");

        let mut records = Vec::new();
        for id in &ids {
            match self.mailbox.fetch(id).await {
                Ok(raw) => records.push(normalize::normalize(&raw)),
                Err(e) => warn!(id = %id, error = %e, "Skipping message that failed to fetch"),
            }
        }

        // Records with no readable body have nothing to classify. HTML-only
        // records stay when the conversion pass will give them text.
        let readable = records
            .into_iter()
            .filter(|r| {
                !r.plain_text.trim().is_empty() || (self.config.convert_html && r.is_html_only())
            })
            .collect::<Vec<_>>();
        info!(readable = readable.len(), "Messages with readable bodies");

        let recent = filters::recency_filter(readable, lookback, now);
        let unignored = filters::sender_filter(recent, &self.config.ignore_senders);
        let (kept, removed) = filters::deduplicate(unignored);
        info!(
            kept = kept.len(),
            duplicates_removed = removed,
            "Filters applied"
        );

        let mut state = PipelineState {
            records: kept,
            ..PipelineState::default()
        };
        state.sort_oldest_first();
        Ok(state)
    }

    /// Model-assisted HTML→text for records with no plain body.
    /// One call and one checkpoint save per converted record.
    async fn convert_html_only(&self, state: &mut PipelineState) -> Result<(), Error> {
        for index in 0..state.records.len() {
            if !state.records[index].is_html_only() {
                continue;
            }
            self.bail_if_interrupted(state)?;

            let converted = self
                .llm
                .chat(
                    &self.config.summarise_model,
                    prompts::HTML_TO_TEXT,
                    &state.records[index].html,
                    self.config.summarise_ctx,
                )
                .await
                .map_err(PipelineError::from)?;

            state.records[index].plain_text = normalize::format_body(&converted);
            self.checkpoint.save(state)?;
        }
        Ok(())
    }

    /// Categorize every record not already done, checkpointing each one.
    async fn categorize_all(&self, state: &mut PipelineState) -> Result<(), Error> {
        let categorizer = Categorizer::new(
            Arc::clone(&self.llm),
            &self.config.categorise_model,
            self.config.categorise_ctx,
        );

        let total = state.records.len();
        for index in 0..total {
            if state.records[index].is_done() {
                continue;
            }
            self.bail_if_interrupted(state)?;

            info!(n = index + 1, total, "Categorizing message");
            let category = categorizer
                .categorize(&state.records[index].plain_text)
                .await?;
            state.records[index].category = category;
            self.checkpoint.save(state)?;
        }
        Ok(())
    }

    fn bail_if_interrupted(&self, state: &PipelineState) -> Result<(), Error> {
        if self.cancel.load(Ordering::Relaxed) {
            self.checkpoint.save(state)?;
            return Err(PipelineError::Interrupted.into());
        }
        Ok(())
    }
}
