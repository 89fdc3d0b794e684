use crate::actors::messages::{ActorError, AppError, BackendMessage, GenerationInput, GenerationRequest};
use crate::actors::traits::Generator;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Connection settings for one OpenAI-compatible chat model.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL up to and including the API version, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    /// Bound on a single completion, request and body read included.
    pub timeout: Duration,
    /// Maximum number of completions in flight at once.
    pub max_concurrent: usize,
}

/// A handle to the `LlmActor`.
///
/// This struct provides a public, cloneable interface for sending messages to the
/// running LLM actor. It abstracts away the `mpsc::Sender`.
#[derive(Clone)]
pub struct LlmActorHandle {
    sender: mpsc::Sender<BackendMessage>,
    model: String,
    reply_timeout: Duration,
}

impl LlmActorHandle {
    /// Creates a new `LlmActor` and returns a handle to it.
    ///
    /// This will spawn the `LlmActorRunner` in a new Tokio task, so it must be
    /// called from within a runtime.
    pub fn new(settings: LlmSettings) -> Self {
        let (sender, receiver) = mpsc::channel(64);
        let model = settings.model.clone();
        // The runner enforces `settings.timeout`; the extra second only covers queueing.
        let reply_timeout = settings.timeout + Duration::from_secs(1);
        let actor = LlmActorRunner::new(receiver, settings);
        tokio::spawn(async move { actor.run().await });
        Self {
            sender,
            model,
            reply_timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Generator for LlmActorHandle {
    async fn generate(&self, request: GenerationRequest) -> Result<String, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = BackendMessage::Generate {
            request,
            responder: send,
        };

        self.sender
            .send(msg)
            .await
            .map_err(|_| AppError::Actor(ActorError::Closed(self.model.clone())))?;
        timeout(self.reply_timeout, recv)
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "no reply from {} within {:?}",
                    self.model, self.reply_timeout
                ))
            })?
            .map_err(|_| AppError::Actor(ActorError::NoResponse(self.model.clone())))?
    }
}

// --- Wire types ---
#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

// --- Actor Runner (Internal Logic) ---
struct LlmActorRunner {
    receiver: mpsc::Receiver<BackendMessage>,
    client: Client,
    settings: Arc<LlmSettings>,
    permits: Arc<Semaphore>,
}

impl LlmActorRunner {
    fn new(receiver: mpsc::Receiver<BackendMessage>, settings: LlmSettings) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
        Self {
            receiver,
            client: Client::new(),
            settings: Arc::new(settings),
            permits,
        }
    }

    async fn run(mut self) {
        info!(model = %self.settings.model, "LlmActor started");
        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg).await;
        }
        info!(model = %self.settings.model, "LlmActor stopped");
    }

    async fn handle_message(&mut self, msg: BackendMessage) {
        match msg {
            BackendMessage::Generate { request, responder } => {
                // Waiting here applies backpressure once every permit is taken.
                let permit = match self.permits.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        let _ = responder.send(Err(AppError::Actor(ActorError::Internal(e.to_string()))));
                        return;
                    }
                };
                let client = self.client.clone();
                let settings = Arc::clone(&self.settings);
                tokio::spawn(async move {
                    let result = generate_completion(&client, &settings, request).await;
                    drop(permit);
                    let _ = responder.send(result);
                });
            }
        }
    }
}

fn build_payload(settings: &LlmSettings, request: &GenerationRequest) -> Value {
    let user_content = match &request.input {
        GenerationInput::Text { prompt } => Value::String(prompt.clone()),
        GenerationInput::Image { prompt, image } => {
            let data_url = format!(
                "data:{};base64,{}",
                image.content_type,
                BASE64.encode(&image.bytes)
            );
            json!([
                { "type": "text", "text": prompt },
                { "type": "image_url", "image_url": { "url": data_url } }
            ])
        }
    };

    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system_prompt {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": user_content }));

    json!({
        "model": settings.model,
        "messages": messages,
        "temperature": settings.temperature,
        "max_tokens": request.max_tokens,
    })
}

#[instrument(skip_all, fields(model = %settings.model, image = request.input.is_image(), max_tokens = request.max_tokens))]
async fn generate_completion(
    client: &Client,
    settings: &LlmSettings,
    request: GenerationRequest,
) -> Result<String, AppError> {
    let payload = build_payload(settings, &request);
    let endpoint = format!("{}/chat/completions", settings.base_url.trim_end_matches('/'));
    debug!(prompt_len = request.input.prompt().len(), "Sending completion request");

    let call = async {
        let res = client
            .post(&endpoint)
            .bearer_auth(&settings.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Backend(format!(
                "Completion request failed with status {}: {}",
                status, body
            )));
        }

        let completion: ChatCompletion = res
            .json()
            .await
            .map_err(|e| AppError::Backend(format!("Malformed completion body: {}", e)))?;
        Ok::<ChatCompletion, AppError>(completion)
    };

    let completion = match timeout(settings.timeout, call).await {
        Ok(result) => result?,
        Err(_) => {
            error!(timeout_secs = settings.timeout.as_secs(), "Completion timed out");
            return Err(AppError::Timeout(format!(
                "completion from {} exceeded {:?}",
                settings.model, settings.timeout
            )));
        }
    };

    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .unwrap_or_default();

    if content.is_empty() {
        warn!("Backend returned an empty completion");
        return Err(AppError::EmptyResponse);
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImagePayload;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings_for(server_url: String) -> LlmSettings {
        LlmSettings {
            base_url: server_url,
            api_key: "test-key".to_string(),
            model: "gpt-test".to_string(),
            temperature: 0.3,
            timeout: Duration::from_secs(2),
            max_concurrent: 2,
        }
    }

    fn completion_body(content: &str) -> Value {
        json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        })
    }

    #[tokio::test]
    async fn test_llm_generate_completion_success() {
        // 1. Arrange
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({ "model": "gpt-test", "max_tokens": 50 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("  Sugar – ✅ Safe  ")))
            .mount(&mock_server)
            .await;
        let handle = LlmActorHandle::new(settings_for(mock_server.uri()));

        // 2. Act
        let request = GenerationRequest::new(
            GenerationInput::Text { prompt: "sugar".to_string() },
            50,
        );
        let result = handle.generate(request).await;

        // 3. Assert
        assert_eq!(result.unwrap(), "Sugar – ✅ Safe");
    }

    #[tokio::test]
    async fn test_llm_generate_completion_server_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&mock_server)
            .await;
        let handle = LlmActorHandle::new(settings_for(mock_server.uri()));

        let request = GenerationRequest::new(GenerationInput::Text { prompt: "salt".into() }, 50);
        let result = handle.generate(request).await;

        match result {
            Err(AppError::Backend(msg)) => {
                assert!(msg.contains("status 500"));
                assert!(msg.contains("Internal Server Error"));
            }
            other => panic!("Expected AppError::Backend, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_llm_empty_content_is_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("   ")))
            .mount(&mock_server)
            .await;
        let handle = LlmActorHandle::new(settings_for(mock_server.uri()));

        let request = GenerationRequest::new(GenerationInput::Text { prompt: "salt".into() }, 50);
        assert!(matches!(handle.generate(request).await, Err(AppError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_llm_missing_choices_is_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&mock_server)
            .await;
        let handle = LlmActorHandle::new(settings_for(mock_server.uri()));

        let request = GenerationRequest::new(GenerationInput::Text { prompt: "salt".into() }, 50);
        assert!(matches!(handle.generate(request).await, Err(AppError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_llm_slow_backend_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_body("late"))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&mock_server)
            .await;
        let mut settings = settings_for(mock_server.uri());
        settings.timeout = Duration::from_millis(200);
        let handle = LlmActorHandle::new(settings);

        let request = GenerationRequest::new(GenerationInput::Text { prompt: "salt".into() }, 50);
        assert!(matches!(handle.generate(request).await, Err(AppError::Timeout(_))));
    }

    #[test]
    fn test_image_payload_uses_data_url_content_parts() {
        let settings = settings_for("http://localhost".to_string());
        let request = GenerationRequest::new(
            GenerationInput::Image {
                prompt: "read the label".to_string(),
                image: ImagePayload {
                    bytes: vec![1, 2, 3],
                    content_type: "image/png".to_string(),
                },
            },
            100,
        )
        .with_system_prompt("be brief");

        let payload = build_payload(&settings, &request);
        let messages = payload["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        let parts = messages[1]["content"].as_array().unwrap();
        assert_eq!(parts[0]["text"], "read the label");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AQID");
    }
}
