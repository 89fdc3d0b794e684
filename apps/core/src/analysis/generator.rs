use crate::actors::messages::{AppError, GenerationInput, GenerationRequest};
use crate::actors::traits::Generator;
use crate::analysis::prompts;
use crate::models::{AnalysisInput, AnalysisResult};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

/// How the short and detailed halves are obtained from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStrategy {
    /// Two independent calls, one per half.
    Separate,
    /// One call whose answer is split into both halves.
    Combined,
}

impl FromStr for GenerationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "separate" => Ok(GenerationStrategy::Separate),
            "combined" => Ok(GenerationStrategy::Combined),
            other => Err(format!("unknown generation strategy '{}'", other)),
        }
    }
}

impl fmt::Display for GenerationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationStrategy::Separate => write!(f, "separate"),
            GenerationStrategy::Combined => write!(f, "combined"),
        }
    }
}

/// Turns ingredient text or a label photo into short and detailed classifications.
pub struct AnalysisGenerator {
    backend: Arc<dyn Generator>,
    strategy: GenerationStrategy,
    short_max_tokens: u32,
    detailed_max_tokens: u32,
}

impl AnalysisGenerator {
    pub fn new(
        backend: Arc<dyn Generator>,
        strategy: GenerationStrategy,
        short_max_tokens: u32,
        detailed_max_tokens: u32,
    ) -> Self {
        Self {
            backend,
            strategy,
            short_max_tokens,
            detailed_max_tokens,
        }
    }

    pub fn strategy(&self) -> GenerationStrategy {
        self.strategy
    }

    fn request(&self, input: &AnalysisInput, prompt: String, max_tokens: u32) -> GenerationRequest {
        let input = match input {
            AnalysisInput::Text(_) => GenerationInput::Text { prompt },
            AnalysisInput::Image { image, .. } => GenerationInput::Image {
                prompt,
                image: image.clone(),
            },
        };
        GenerationRequest::new(input, max_tokens).with_system_prompt(prompts::SYSTEM_PROMPT)
    }

    async fn call(&self, request: GenerationRequest) -> Result<String, AppError> {
        let text = self.backend.generate(request).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::EmptyResponse);
        }
        Ok(text.to_string())
    }

    /// Compact tagged list, one line per ingredient.
    #[instrument(skip_all, fields(input = input.kind()))]
    pub async fn classify_short(&self, input: &AnalysisInput) -> Result<String, AppError> {
        let (text, caption) = prompt_parts(input);
        let prompt = prompts::short_prompt(text, caption);
        self.call(self.request(input, prompt, self.short_max_tokens)).await
    }

    /// Full explanation of every ingredient.
    #[instrument(skip_all, fields(input = input.kind()))]
    pub async fn classify_detailed(&self, input: &AnalysisInput) -> Result<String, AppError> {
        let (text, caption) = prompt_parts(input);
        let prompt = prompts::detailed_prompt(text, caption);
        self.call(self.request(input, prompt, self.detailed_max_tokens)).await
    }

    /// Produces both halves according to the configured strategy.
    #[instrument(skip_all, fields(input = input.kind(), strategy = %self.strategy))]
    pub async fn analyze(&self, input: &AnalysisInput) -> Result<AnalysisResult, AppError> {
        match self.strategy {
            GenerationStrategy::Separate => {
                let (short_summary, detailed_explanation) =
                    tokio::try_join!(self.classify_short(input), self.classify_detailed(input))?;
                Ok(AnalysisResult {
                    short_summary,
                    detailed_explanation,
                })
            }
            GenerationStrategy::Combined => {
                let (text, caption) = prompt_parts(input);
                let prompt = prompts::combined_prompt(text, caption);
                let max_tokens = self.short_max_tokens + self.detailed_max_tokens;
                let blob = self.call(self.request(input, prompt, max_tokens)).await?;
                split_combined(&blob).ok_or(AppError::EmptyResponse)
            }
        }
    }
}

fn prompt_parts(input: &AnalysisInput) -> (Option<&str>, Option<&str>) {
    match input {
        AnalysisInput::Text(text) => (Some(text.as_str()), None),
        AnalysisInput::Image { caption, .. } => (None, caption.as_deref()),
    }
}

/// Splits a single-call answer into its short and detailed halves.
///
/// The explicit marker line wins; otherwise the first blank line is the boundary;
/// with neither, the whole answer serves as both halves. Returns `None` only for
/// a blank answer.
pub fn split_combined(blob: &str) -> Option<AnalysisResult> {
    let blob = blob.trim();
    if blob.is_empty() {
        return None;
    }

    let normalized = blob.replace("\r\n", "\n");
    let marker_split = normalized.lines().position(|line| line.trim() == prompts::DETAILS_MARKER).map(|idx| {
        let lines: Vec<&str> = normalized.lines().collect();
        (lines[..idx].join("\n"), lines[idx + 1..].join("\n"))
    });

    let (short, detailed) = match marker_split {
        Some(parts) => parts,
        None => match normalized.split_once("\n\n") {
            Some((short, detailed)) => (short.to_string(), detailed.to_string()),
            None => (normalized.clone(), normalized.clone()),
        },
    };

    let short = short.trim();
    let detailed = detailed.trim();
    debug!(short_len = short.len(), detailed_len = detailed.len(), "Split combined answer");
    match (short.is_empty(), detailed.is_empty()) {
        (false, false) => Some(AnalysisResult {
            short_summary: short.to_string(),
            detailed_explanation: detailed.to_string(),
        }),
        (true, false) => Some(AnalysisResult {
            short_summary: detailed.to_string(),
            detailed_explanation: detailed.to_string(),
        }),
        (false, true) => Some(AnalysisResult {
            short_summary: short.to_string(),
            detailed_explanation: short.to_string(),
        }),
        (true, true) => None,
    }
}
