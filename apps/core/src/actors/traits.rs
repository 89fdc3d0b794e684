use crate::actors::messages::{AppError, GenerationRequest};
use crate::models::ImagePayload;
use async_trait::async_trait;

/// Defines the public interface for a generative-language backend.
///
/// This trait abstracts the specific implementation of the model, allowing a
/// text-only model, a vision model, or a test double to be used interchangeably.
/// Implementations must fail with an error (never an empty `Ok`) when the backend
/// produced nothing usable.
#[async_trait]
pub trait Generator: Send + Sync + 'static {
    /// Generates a complete text response for the request.
    async fn generate(&self, request: GenerationRequest) -> Result<String, AppError>;
}

/// Downloads media referenced by inbound messages.
#[async_trait]
pub trait MediaFetcher: Send + Sync + 'static {
    /// Fetches the attachment at `url`, returning its bytes and content type.
    async fn fetch(&self, url: &str, declared_type: Option<&str>) -> Result<ImagePayload, AppError>;
}
