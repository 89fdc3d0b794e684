//! Detail-request detection delegated to the generative backend.
//!
//! The lexical classifier runs first (fast path). The backend is only asked a
//! closed yes/no question when the lexical answer is "new classification", the
//! sender has something to expand, and the message is short enough to plausibly
//! be a follow-up rather than an ingredient list.

use crate::actors::messages::{GenerationInput, GenerationRequest};
use crate::actors::traits::Generator;
use crate::analysis::prompts;
use crate::brain::intent::{Intent, IntentPolicy, LexicalIntentClassifier};
use crate::models::Session;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Messages longer than this are treated as ingredient lists without asking.
const MAX_FOLLOW_UP_CHARS: usize = 120;

/// Enough tokens for "yes" / "no".
const ANSWER_MAX_TOKENS: u32 = 3;

pub struct DelegatedIntentClassifier {
    lexical: LexicalIntentClassifier,
    backend: Arc<dyn Generator>,
}

impl DelegatedIntentClassifier {
    pub fn new(lexical: LexicalIntentClassifier, backend: Arc<dyn Generator>) -> Self {
        Self { lexical, backend }
    }

    async fn ask_backend(&self, text: &str) -> Intent {
        let request = GenerationRequest::new(
            GenerationInput::Text {
                prompt: prompts::detail_intent_prompt(text),
            },
            ANSWER_MAX_TOKENS,
        );
        match self.backend.generate(request).await {
            Ok(answer) if is_affirmative(&answer) => Intent::DetailRequest,
            Ok(answer) => {
                debug!(answer = %answer.trim(), "Backend judged message a new classification");
                Intent::NewClassification
            }
            Err(e) => {
                warn!(error = %e, "Delegated intent check failed; treating as new classification");
                Intent::NewClassification
            }
        }
    }
}

fn is_affirmative(answer: &str) -> bool {
    answer
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_ascii_lowercase()
        .starts_with("yes")
}

#[async_trait]
impl IntentPolicy for DelegatedIntentClassifier {
    async fn classify(&self, session: Option<&Session>, text: &str) -> Intent {
        let fast = self.lexical.detect_in(session, text);
        if fast != Intent::NewClassification {
            return fast;
        }

        let text = text.trim();
        let has_prior = session.is_some_and(|s| s.last_detailed_analysis.is_some() || s.pending);
        if !has_prior || text.is_empty() || text.chars().count() > MAX_FOLLOW_UP_CHARS {
            return Intent::NewClassification;
        }

        self.ask_backend(text).await
    }
}
