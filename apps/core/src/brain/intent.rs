//! Intent Classification using regex patterns.
//!
//! Fast pattern-based detection of follow-up "tell me more" requests.
//! No model call required - pure Rust regex matching.

use crate::error::AppError;
use crate::models::Session;
use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Phrases that ask for the detailed analysis when no custom list is configured.
pub const DEFAULT_DETAIL_TRIGGERS: &[&str] = &[
    "details",
    "detail",
    "more",
    "more info",
    "explain",
    "tell me more",
    "full info",
    "why",
];

/// What the sender wants from this message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Expand the previous classification.
    DetailRequest,
    /// Classify the ingredients (or label photo) in this message.
    NewClassification,
    /// A bare greeting from a sender who has not been welcomed yet.
    Greeting,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Intent {
    /// Returns a human-readable label for the intent
    pub fn label(&self) -> &'static str {
        match self {
            Intent::DetailRequest => "detail_request",
            Intent::NewClassification => "new_classification",
            Intent::Greeting => "greeting",
        }
    }
}

/// Which intent policy the orchestrator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentPolicyKind {
    Lexical,
    Delegated,
}

impl FromStr for IntentPolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lexical" => Ok(IntentPolicyKind::Lexical),
            "delegated" => Ok(IntentPolicyKind::Delegated),
            other => Err(format!("unknown intent policy '{}'", other)),
        }
    }
}

/// Decides what an inbound text message asks for.
///
/// Media-bearing messages never reach a policy: they are always classifications.
#[async_trait]
pub trait IntentPolicy: Send + Sync + 'static {
    async fn classify(&self, session: Option<&Session>, text: &str) -> Intent;
}

// NOTE: expect() is acceptable here: the patterns are constants.
static GREETING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[\s\p{P}]*(hi|hii+|hello|hey|hola|namaste|start|good (morning|afternoon|evening))[\s\p{P}]*$",
    )
    .expect("Invalid regex: greeting pattern")
});

/// Intent classifier matching the whole message against a fixed phrase list.
pub struct LexicalIntentClassifier {
    detail_pattern: Regex,
}

impl LexicalIntentClassifier {
    /// Builds a classifier from trigger phrases. Matching is case-insensitive, and
    /// whitespace inside a phrase matches any run of whitespace.
    pub fn new<S: AsRef<str>>(triggers: &[S]) -> Result<Self, AppError> {
        let alternatives: Vec<String> = triggers
            .iter()
            .map(|t| t.as_ref().split_whitespace().map(regex::escape).collect::<Vec<_>>().join(r"\s+"))
            .filter(|t| !t.is_empty())
            .collect();
        if alternatives.is_empty() {
            return Err(AppError::Config("at least one detail trigger phrase is required".to_string()));
        }

        let pattern = format!(
            r"(?i)^[\s\p{{P}}]*(?:please\s+)?(?:{})(?:\s+please)?[\s\p{{P}}]*$",
            alternatives.join("|")
        );
        let detail_pattern =
            Regex::new(&pattern).map_err(|e| AppError::Config(format!("invalid detail trigger: {}", e)))?;
        Ok(Self { detail_pattern })
    }

    /// Classifies `text` on its own, with no conversation state.
    pub fn detect(&self, text: &str) -> Intent {
        let text = text.trim();
        if text.is_empty() {
            return Intent::NewClassification;
        }
        if self.detail_pattern.is_match(text) {
            Intent::DetailRequest
        } else if GREETING_PATTERN.is_match(text) {
            Intent::Greeting
        } else {
            Intent::NewClassification
        }
    }
}

impl LexicalIntentClassifier {
    /// Classifies `text` for a sender with the given session.
    ///
    /// Once a sender has been welcomed a bare greeting is no longer special and goes
    /// to classification like any other text.
    pub fn detect_in(&self, session: Option<&Session>, text: &str) -> Intent {
        match self.detect(text) {
            Intent::Greeting if session.is_some_and(|s| s.welcomed) => Intent::NewClassification,
            intent => intent,
        }
    }
}

impl Default for LexicalIntentClassifier {
    fn default() -> Self {
        // The default phrases are plain words, so building from them cannot fail.
        Self::new(DEFAULT_DETAIL_TRIGGERS).expect("default detail triggers are valid")
    }
}

#[async_trait]
impl IntentPolicy for LexicalIntentClassifier {
    async fn classify(&self, session: Option<&Session>, text: &str) -> Intent {
        self.detect_in(session, text)
    }
}
