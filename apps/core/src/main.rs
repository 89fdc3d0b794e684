// LabelCheck service entry point
// Webhook in, TwiML out; classification runs on the backend actors.

mod actors;
mod analysis;
mod brain;
mod chunker;
mod config;
mod error;
mod models;
mod orchestrator;
mod rate_limiter;
mod replies;
mod session_store;
mod telemetry;
mod webhook;

#[cfg(test)]
mod tests;

use actors::llm::{LlmActorHandle, LlmSettings};
use actors::media::{HttpMediaFetcher, MediaCredentials};
use actors::router::BackendRouter;
use actors::traits::{Generator, MediaFetcher};
use analysis::AnalysisGenerator;
use brain::{DelegatedIntentClassifier, IntentPolicy, IntentPolicyKind, LexicalIntentClassifier};
use config::AppConfig;
use error::AppError;
use orchestrator::{ConversationOrchestrator, OrchestratorSettings};
use rate_limiter::RateLimiter;
use session_store::SessionStore;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

/// Wires the backend actors, policies and stores described by `config`.
///
/// Must be called from within a Tokio runtime (the actors spawn on creation).
fn build_orchestrator(config: &AppConfig) -> Result<ConversationOrchestrator, AppError> {
    let llm = |model: &str| LlmSettings {
        base_url: config.openai_base_url.clone(),
        api_key: config.openai_api_key.clone(),
        model: model.to_string(),
        temperature: config.temperature,
        timeout: config.backend_timeout(),
        max_concurrent: config.max_concurrent_backend,
    };
    let text_handle = LlmActorHandle::new(llm(&config.text_model));
    let vision_handle = LlmActorHandle::new(llm(&config.vision_model));
    info!(text_model = text_handle.model(), vision_model = vision_handle.model(), "Backend actors started");
    let text: Arc<dyn Generator> = Arc::new(text_handle);
    let vision: Arc<dyn Generator> = Arc::new(vision_handle);
    let backend: Arc<dyn Generator> = Arc::new(BackendRouter::new(Arc::clone(&text), vision));

    let lexical = LexicalIntentClassifier::new(&config.detail_triggers)?;
    let intent: Arc<dyn IntentPolicy> = match config.intent_policy {
        IntentPolicyKind::Lexical => Arc::new(lexical),
        IntentPolicyKind::Delegated => Arc::new(DelegatedIntentClassifier::new(lexical, text)),
    };

    let generator = Arc::new(AnalysisGenerator::new(
        backend,
        config.generation_strategy,
        config.short_max_tokens,
        config.detailed_max_tokens,
    ));

    let credentials = config
        .media_credentials()
        .map(|(username, password)| MediaCredentials {
            username,
            password,
            hosts: config.media_auth_hosts.clone(),
        });
    let media: Arc<dyn MediaFetcher> = Arc::new(HttpMediaFetcher::new(
        credentials,
        config.media_timeout(),
        config.max_media_bytes,
    ));

    let capacity = NonZeroUsize::new(config.session_capacity)
        .ok_or_else(|| AppError::Config("SESSION_CAPACITY must be positive".to_string()))?;
    let sessions = Arc::new(SessionStore::new(capacity, config.session_ttl()));
    let limiter = Arc::new(RateLimiter::new(config.rate_limit_per_minute, Duration::from_secs(60)));

    let settings = OrchestratorSettings {
        max_chunk_len: config.max_chunk_len,
        detail_mode: config.detail_mode,
        welcome_policy: config.welcome_policy,
        reply_deadline: config.reply_deadline(),
        detail_keyword: config.detail_keyword().to_string(),
    };

    Ok(ConversationOrchestrator::new(sessions, intent, generator, media, limiter, settings))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be populated.
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;
    telemetry::init(env!("CARGO_PKG_NAME"), config.log_format)?;

    let orchestrator = build_orchestrator(&config)?;
    let _housekeeping = orchestrator.spawn_housekeeping(HOUSEKEEPING_INTERVAL);

    let app = webhook::router(webhook::WebhookState {
        orchestrator,
        reply_from: config.reply_from.clone(),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        intent_policy = ?config.intent_policy,
        strategy = %config.generation_strategy,
        detail_mode = ?config.detail_mode,
        "LabelCheck listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
