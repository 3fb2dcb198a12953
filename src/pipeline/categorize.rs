//! Categorizer — coerces a single-word category out of an unreliable
//! classifier.
//!
//! The model is instructed to answer with one word from a closed
//! vocabulary. When it rambles anyway the call is retried up to
//! [`MAX_ATTEMPTS`] times, after which the record falls back to [`OTHER`].
//! Compliant answers then pass through an ordered synonym remap table and
//! the CRIME disambiguation step.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::llm::{LlmClient, prompts};
use crate::pipeline::types::OTHER;

/// Closed vocabulary offered to the classifier.
pub const VOCABULARY: &[&str] = &[
    "BUSINESS",
    "CHARITY",
    "EDUCATION",
    "ENTERTAINMENT",
    "ENVIRONMENT",
    "FINANCE",
    "FOOD",
    "GOVERNMENT",
    "HEALTH",
    "LGBTQ+",
    "LEGAL",
    "NEWS",
    "PERSONAL",
    "PROMOTIONAL",
    "RELIGION",
    "SCIENCE",
    "SHOPPING",
    "SOCIAL",
    "SPORT",
    "TECHNOLOGY",
    "TRAVEL",
    "WORK",
];

/// Synonym collapse rules, evaluated first-match-wins on the uppercased
/// label. Models drift between near-identical labels run to run; this
/// table keeps the report sections stable.
const REMAP_RULES: &[(&str, &str)] = &[
    ("LGBT", "LGBTQ+"),
    ("MARKETING", "PROMOTIONAL"),
    ("EVENT", "PROMOTIONAL"),
    ("GOVERNMENT", "POLITICS"),
    ("REALESTATE", "PROPERTY"),
    ("CALENDAR", "PERSONAL"),
];

/// Keywords that push a CRIME label toward ENTERTAINMENT rather than NEWS.
const ENTERTAINMENT_KEYWORDS: &[&str] = &["documentary", "film", "movie", "tv", "series", "shows"];

/// Total attempts before the [`OTHER`] fallback.
pub const MAX_ATTEMPTS: usize = 5;

/// Single-word classifier over the inference seam.
///
/// Pure with respect to pipeline state: the only side effect is the
/// inference call itself.
pub struct Categorizer {
    llm: Arc<dyn LlmClient>,
    model: String,
    context_size: u32,
    system_prompt: String,
}

impl Categorizer {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>, context_size: u32) -> Self {
        Self {
            llm,
            model: model.into(),
            context_size,
            system_prompt: prompts::category_system_prompt(VOCABULARY),
        }
    }

    /// Classify one message body into a canonical category.
    ///
    /// Transport failures propagate; non-compliance never does.
    pub async fn categorize(&self, text: &str) -> Result<String, PipelineError> {
        let mut label = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let response = self
                .llm
                .chat(&self.model, &self.system_prompt, text, self.context_size)
                .await
                .map_err(|e| PipelineError::Categorize(e.to_string()))?;
            let candidate = response.trim().to_uppercase();

            if is_single_word(&candidate) {
                debug!(attempt, label = %candidate, "Classifier complied");
                label = Some(candidate);
                break;
            }
            warn!(attempt, response = %candidate, "Classifier returned a multi-word label");
        }

        let Some(label) = label else {
            warn!("Classifier never complied after {MAX_ATTEMPTS} attempts, using {OTHER}");
            return Ok(OTHER.to_string());
        };

        let label = label.replace('.', "");
        let label = remap_label(&label);
        Ok(resolve_crime(label, text))
    }
}

/// A compliant classifier answer contains no whitespace.
fn is_single_word(label: &str) -> bool {
    !label.is_empty() && !label.contains(char::is_whitespace)
}

/// Collapse model synonyms into canonical categories, first match wins.
pub fn remap_label(label: &str) -> String {
    for (pattern, canonical) in REMAP_RULES {
        if label.to_uppercase().contains(pattern) {
            return (*canonical).to_string();
        }
    }
    label.to_string()
}

/// CRIME is ambiguous between reporting and drama: entertainment keywords
/// in the source text decide which.
fn resolve_crime(label: String, source_text: &str) -> String {
    if label != "CRIME" {
        return label;
    }
    let lower = source_text.to_lowercase();
    if ENTERTAINMENT_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        "ENTERTAINMENT".to_string()
    } else {
        "NEWS".to_string()
    }
}

/// Is this label one the pipeline can legitimately end a run with?
pub fn is_canonical(label: &str) -> bool {
    label == OTHER
        || VOCABULARY.contains(&label)
        || REMAP_RULES.iter().any(|(_, canonical)| *canonical == label)
}
