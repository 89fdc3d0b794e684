use crate::actors::messages::{AppError, GenerationRequest};
use crate::actors::traits::Generator;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Routes each request to the text or the vision backend by the shape of its input.
#[derive(Clone)]
pub struct BackendRouter {
    text: Arc<dyn Generator>,
    vision: Arc<dyn Generator>,
}

impl BackendRouter {
    pub fn new(text: Arc<dyn Generator>, vision: Arc<dyn Generator>) -> Self {
        Self { text, vision }
    }
}

#[async_trait]
impl Generator for BackendRouter {
    async fn generate(&self, request: GenerationRequest) -> Result<String, AppError> {
        if request.input.is_image() {
            debug!("Routing request to vision backend");
            self.vision.generate(request).await
        } else {
            debug!("Routing request to text backend");
            self.text.generate(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::messages::GenerationInput;
    use crate::models::ImagePayload;

    struct Named(&'static str);

    #[async_trait]
    impl Generator for Named {
        async fn generate(&self, _request: GenerationRequest) -> Result<String, AppError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_router_selects_backend_by_input_shape() {
        let router = BackendRouter::new(Arc::new(Named("text")), Arc::new(Named("vision")));

        let text = GenerationRequest::new(GenerationInput::Text { prompt: "salt".into() }, 10);
        assert_eq!(router.generate(text).await.unwrap(), "text");

        let image = GenerationRequest::new(
            GenerationInput::Image {
                prompt: "label".into(),
                image: ImagePayload {
                    bytes: vec![0xFF, 0xD8],
                    content_type: "image/jpeg".into(),
                },
            },
            10,
        );
        assert_eq!(router.generate(image).await.unwrap(), "vision");
    }
}
