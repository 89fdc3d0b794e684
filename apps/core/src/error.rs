use thiserror::Error;

/// Application-wide error type, consolidating all possible errors into a single enum.
///
/// None of these variants ever reach the messaging gateway verbatim: the
/// orchestrator maps each one to a fixed user-facing reply.
#[derive(Debug, Error)]
pub enum AppError {
    /// The generative backend call failed (transport error, non-2xx status, bad payload).
    #[error("Backend error: {0}")]
    Backend(String),

    /// The generative backend answered, but with nothing usable.
    #[error("Backend returned an empty response")]
    EmptyResponse,

    /// Downloading an inbound attachment failed (network, auth, size cap).
    #[error("Media fetch error: {0}")]
    MediaFetch(String),

    /// The attachment is not an image we can hand to the vision backend.
    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    /// Represents errors specific to the actor system, such as communication failures.
    #[error("Actor error: {0}")]
    Actor(#[from] crate::actors::messages::ActorError),

    /// Represents data validation errors (e.g., invalid input format).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Represents configuration-related errors (e.g., missing environment variables).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Represents errors from operations that did not complete in time.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The sender has used up their message allowance for the current window.
    #[error("Rate limit exceeded")]
    RateLimited,
}

impl AppError {
    /// True for failures caused by the inbound attachment rather than the backend.
    pub fn is_media_failure(&self) -> bool {
        matches!(self, AppError::MediaFetch(_) | AppError::UnsupportedMedia(_))
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        match self {
            AppError::Backend(s) => AppError::Backend(s.clone()),
            AppError::EmptyResponse => AppError::EmptyResponse,
            AppError::MediaFetch(s) => AppError::MediaFetch(s.clone()),
            AppError::UnsupportedMedia(s) => AppError::UnsupportedMedia(s.clone()),
            AppError::Actor(e) => AppError::Actor(e.clone()),
            AppError::Validation(s) => AppError::Validation(s.clone()),
            AppError::Config(s) => AppError::Config(s.clone()),
            AppError::Timeout(s) => AppError::Timeout(s.clone()),
            AppError::RateLimited => AppError::RateLimited,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Config(format!("Validation errors: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(format!("HTTP timeout: {}", err))
        } else {
            AppError::Backend(format!("HTTP error: {}", err))
        }
    }
}
