use crate::actors::traits::MediaFetcher;
use crate::analysis::{AnalysisGenerator, GenerationStrategy};
use crate::brain::{Intent, IntentPolicy};
use crate::chunker::chunk_lines;
use crate::error::AppError;
use crate::models::{AnalysisInput, InboundEvent, OutboundMessage, Session};
use crate::rate_limiter::RateLimiter;
use crate::replies;
use crate::session_store::{AnalysisTicket, SessionStore};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

/// When the detailed half of a classification is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailMode {
    /// Together with the short half, before replying.
    Inline,
    /// In a background task after the short reply has been produced.
    Background,
}

impl FromStr for DetailMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(DetailMode::Inline),
            "background" => Ok(DetailMode::Background),
            other => Err(format!("unknown detail mode '{}'", other)),
        }
    }
}

/// What happens to the payload of a sender's very first message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WelcomePolicy {
    /// Reply with the welcome only.
    WelcomeOnly,
    /// Reply with the welcome, then process the payload as usual.
    Continue,
}

impl FromStr for WelcomePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "welcome_only" | "welcome-only" => Ok(WelcomePolicy::WelcomeOnly),
            "continue" => Ok(WelcomePolicy::Continue),
            other => Err(format!("unknown welcome policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Transport limit for a single outbound message.
    pub max_chunk_len: usize,
    pub detail_mode: DetailMode,
    pub welcome_policy: WelcomePolicy,
    /// Bound on producing a reply for one inbound message.
    pub reply_deadline: Duration,
    /// Phrase advertised in the trailer of every short summary.
    pub detail_keyword: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_chunk_len: 1500,
            detail_mode: DetailMode::Inline,
            welcome_policy: WelcomePolicy::Continue,
            reply_deadline: Duration::from_secs(14),
            detail_keyword: "details".to_string(),
        }
    }
}

/// The top-level conversation handler.
///
/// Cheap to clone; every clone shares the same session store. One call to
/// [`handle_event`](Self::handle_event) handles one inbound message and always
/// produces a reply, apologetic if need be.
#[derive(Clone)]
pub struct ConversationOrchestrator {
    sessions: Arc<SessionStore>,
    intent: Arc<dyn IntentPolicy>,
    generator: Arc<AnalysisGenerator>,
    media: Arc<dyn MediaFetcher>,
    limiter: Arc<RateLimiter>,
    settings: OrchestratorSettings,
}

impl ConversationOrchestrator {
    pub fn new(
        sessions: Arc<SessionStore>,
        intent: Arc<dyn IntentPolicy>,
        generator: Arc<AnalysisGenerator>,
        media: Arc<dyn MediaFetcher>,
        limiter: Arc<RateLimiter>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            sessions,
            intent,
            generator,
            media,
            limiter,
            settings,
        }
    }

    #[cfg(test)]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Processes one inbound message and returns the chunks to send back.
    ///
    /// Errors, panics and deadline overruns are all turned into a fixed apology
    /// here; nothing below this boundary reaches the transport.
    #[instrument(skip(self, event), fields(sender = %event.sender, request_id = %Uuid::new_v4(), media = event.media.len()))]
    pub async fn handle_event(&self, event: InboundEvent) -> OutboundMessage {
        let work = AssertUnwindSafe(self.process(event)).catch_unwind();
        match timeout(self.settings.reply_deadline, work).await {
            Ok(Ok(Ok(reply))) => reply,
            Ok(Ok(Err(AppError::RateLimited))) => {
                warn!("Sender exceeded the rate limit");
                self.render(replies::RATE_LIMITED)
            }
            Ok(Ok(Err(e))) => {
                error!(error = %e, "Unhandled error while processing message");
                self.render(replies::for_error(&e))
            }
            Ok(Err(_)) => {
                error!("Message handling panicked");
                self.render(replies::GENERIC_APOLOGY)
            }
            Err(_) => {
                warn!(deadline_secs = self.settings.reply_deadline.as_secs(), "Reply deadline exceeded");
                self.render(replies::GENERIC_APOLOGY)
            }
        }
    }

    async fn process(&self, event: InboundEvent) -> Result<OutboundMessage, AppError> {
        let sender = event.sender.trim();
        if sender.is_empty() {
            return Err(AppError::Validation("inbound message has no sender".to_string()));
        }
        if !self.limiter.check(sender) {
            return Err(AppError::RateLimited);
        }

        let snapshot = self.sessions.get(sender);
        let intent = if event.has_media() {
            Intent::NewClassification
        } else {
            self.intent.classify(snapshot.as_ref(), event.body()).await
        };
        info!(intent = %intent, text_len = event.body().len(), "Classified message");

        let mut reply = OutboundMessage::default();

        // A first-contact "details" gets exactly the nothing-to-expand reply; the
        // welcome is kept for the sender's next message.
        let first_contact = !snapshot.as_ref().is_some_and(|s| s.welcomed);
        if first_contact && intent != Intent::DetailRequest && self.sessions.claim_welcome(sender) {
            info!("First contact, sending welcome");
            reply.extend(self.render(replies::WELCOME));
            let has_payload = intent == Intent::NewClassification && !event.is_blank();
            if self.settings.welcome_policy == WelcomePolicy::WelcomeOnly || !has_payload {
                return Ok(reply);
            }
        }

        let body = match intent {
            Intent::Greeting => self.render(replies::GREETING_HINT),
            Intent::DetailRequest => self.detail_reply(sender),
            Intent::NewClassification if event.is_blank() => self.render(replies::EMPTY_MESSAGE),
            Intent::NewClassification => self.classify(sender, &event).await,
        };
        reply.extend(body);
        Ok(reply)
    }

    fn detail_reply(&self, sender: &str) -> OutboundMessage {
        match self.sessions.get(sender) {
            Some(session) if session.pending => {
                debug!("Detail requested while a classification is in flight");
                self.render(replies::STILL_PREPARING)
            }
            Some(Session {
                last_detailed_analysis: Some(detail),
                ..
            }) => self.render(&detail),
            _ => self.render(replies::NOTHING_TO_EXPAND),
        }
    }

    async fn classify(&self, sender: &str, event: &InboundEvent) -> OutboundMessage {
        let guard = TicketGuard::begin(Arc::clone(&self.sessions), sender);
        let input = match self.resolve_input(event).await {
            Ok(input) => input,
            Err(e) => {
                warn!(error = %e, "Could not prepare analysis input");
                return self.render(replies::for_error(&e));
            }
        };

        let background = self.settings.detail_mode == DetailMode::Background
            && self.generator.strategy() == GenerationStrategy::Separate;
        if background {
            self.classify_with_background_detail(guard, input).await
        } else {
            self.classify_inline(guard, input).await
        }
    }

    async fn resolve_input(&self, event: &InboundEvent) -> Result<AnalysisInput, AppError> {
        match event.media.first() {
            Some(attachment) => {
                let image = self
                    .media
                    .fetch(&attachment.url, attachment.content_type.as_deref())
                    .await?;
                let caption = Some(event.body().to_string()).filter(|c| !c.is_empty());
                Ok(AnalysisInput::Image { image, caption })
            }
            None => Ok(AnalysisInput::Text(event.body().to_string())),
        }
    }

    async fn classify_inline(&self, guard: TicketGuard, input: AnalysisInput) -> OutboundMessage {
        match self.generator.analyze(&input).await {
            Ok(result) => {
                if !guard.commit(result.detailed_explanation) {
                    info!("A newer classification superseded this one");
                }
                self.render_summary(&result.short_summary)
            }
            Err(e) => {
                warn!(error = %e, "Analysis failed");
                self.render(replies::for_error(&e))
            }
        }
    }

    async fn classify_with_background_detail(
        &self,
        mut guard: TicketGuard,
        input: AnalysisInput,
    ) -> OutboundMessage {
        let short = match self.generator.classify_short(&input).await {
            Ok(short) => short,
            Err(e) => {
                warn!(error = %e, "Short analysis failed");
                return self.render(replies::for_error(&e));
            }
        };

        // The short reply now describes the new ingredients; an older detail no
        // longer matches it if this background run fails.
        guard.discard_previous = true;
        let generator = Arc::clone(&self.generator);
        let span = info_span!("background_detail", ticket = guard.ticket);
        tokio::spawn(
            async move {
                match generator.classify_detailed(&input).await {
                    Ok(detailed) => {
                        if guard.commit(detailed) {
                            info!("Detailed analysis stored");
                        } else {
                            info!("Detailed analysis discarded as stale");
                        }
                    }
                    Err(e) => warn!(error = %e, "Detailed analysis failed"),
                }
            }
            .instrument(span),
        );

        self.render_summary(&short)
    }

    fn render(&self, text: &str) -> OutboundMessage {
        OutboundMessage::new(chunk_lines(text, self.settings.max_chunk_len))
    }

    fn render_summary(&self, short: &str) -> OutboundMessage {
        let trailer = replies::detail_trailer(&self.settings.detail_keyword);
        self.render(&format!("{}\n\n{}", short, trailer))
    }

    /// Periodically drops expired sessions and idle rate-limit windows.
    pub fn spawn_housekeeping(&self, every: Duration) -> JoinHandle<()> {
        let sessions = Arc::clone(&self.sessions);
        let limiter = Arc::clone(&self.limiter);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let expired = sessions.purge_expired();
                let idle = limiter.purge_idle();
                debug!(
                    expired,
                    idle,
                    live = sessions.len(),
                    tracked = limiter.tracked_senders(),
                    "Housekeeping pass"
                );
            }
        })
    }
}

/// Holds a classification ticket; abandons it on drop unless committed.
///
/// Covers every way a classification can end early: an error reply, a panic,
/// the reply deadline dropping the future, or a failed background task.
struct TicketGuard {
    sessions: Arc<SessionStore>,
    sender: String,
    ticket: AnalysisTicket,
    armed: bool,
    discard_previous: bool,
}

impl TicketGuard {
    fn begin(sessions: Arc<SessionStore>, sender: &str) -> Self {
        let ticket = sessions.begin_analysis(sender);
        debug!(ticket, "Classification started");
        Self {
            sessions,
            sender: sender.to_string(),
            ticket,
            armed: true,
            discard_previous: false,
        }
    }

    /// Stores the detailed half. Returns `false` when the ticket went stale.
    fn commit(mut self, detailed: String) -> bool {
        self.armed = false;
        self.sessions.complete_analysis(&self.sender, self.ticket, detailed)
    }
}

impl Drop for TicketGuard {
    fn drop(&mut self) {
        if self.armed {
            self.sessions
                .abandon_analysis(&self.sender, self.ticket, self.discard_previous);
        }
    }
}
