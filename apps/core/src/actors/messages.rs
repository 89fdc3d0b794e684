use crate::models::ImagePayload;
use serde::Serialize;
use tokio::sync::oneshot;

/// Defines errors that can occur within the actor system.
#[derive(Debug, thiserror::Error, Serialize, Clone)]
pub enum ActorError {
    /// The actor's mailbox is closed; the runner has stopped.
    #[error("Actor mailbox closed: {0}")]
    Closed(String),
    /// The runner dropped the responder without answering.
    #[error("Actor did not respond: {0}")]
    NoResponse(String),
    /// A generic internal error within an actor.
    #[error("Internal system error: {0}")]
    Internal(String),
}

// Re-export AppError for convenience
pub use crate::error::AppError;

/// What a single backend call is asked to look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationInput {
    /// A plain text prompt.
    Text { prompt: String },
    /// A text instruction accompanied by one image.
    Image { prompt: String, image: ImagePayload },
}

impl GenerationInput {
    pub fn prompt(&self) -> &str {
        match self {
            GenerationInput::Text { prompt } | GenerationInput::Image { prompt, .. } => prompt,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, GenerationInput::Image { .. })
    }
}

/// A single request to the generative backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub input: GenerationInput,
    /// Optional system-level instructions.
    pub system_prompt: Option<String>,
    /// Upper bound on the completion length.
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(input: GenerationInput, max_tokens: u32) -> Self {
        Self {
            input,
            system_prompt: None,
            max_tokens,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

/// Messages that can be sent to the `BackendActor`.
#[derive(Debug)]
pub enum BackendMessage {
    /// A request to generate a complete text response.
    Generate {
        request: GenerationRequest,
        /// A channel to send the final `String` result back.
        responder: oneshot::Sender<Result<String, AppError>>,
    },
}
