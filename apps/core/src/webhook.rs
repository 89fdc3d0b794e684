//! HTTP surface: the messaging gateway webhook and a health probe.

use crate::models::{InboundEvent, OutboundMessage};
use crate::orchestrator::ConversationOrchestrator;
use crate::replies;
use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Router};
use quick_xml::escape::escape;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// The subset of the gateway's form fields this service reads.
#[derive(Debug, Default, Deserialize)]
pub struct TwilioForm {
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "NumMedia", default)]
    pub num_media: Option<String>,
    #[serde(rename = "MediaUrl0", default)]
    pub media_url0: Option<String>,
    #[serde(rename = "MediaContentType0", default)]
    pub media_content_type0: Option<String>,
}

impl TwilioForm {
    pub fn into_event(self) -> InboundEvent {
        let declared = self
            .num_media
            .as_deref()
            .and_then(|n| n.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let event = InboundEvent::text(self.from, self.body);
        match self.media_url0.filter(|url| declared > 0 && !url.trim().is_empty()) {
            Some(url) => event.with_media(url, self.media_content_type0),
            None => event,
        }
    }
}

#[derive(Clone)]
pub struct WebhookState {
    pub orchestrator: ConversationOrchestrator,
    /// Optional `from` attribute stamped on every outbound message.
    pub reply_from: Option<String>,
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", post(inbound))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Always answers 200 with TwiML; failures surface as apology messages.
async fn inbound(
    State(state): State<WebhookState>,
    form: Result<Form<TwilioForm>, FormRejection>,
) -> impl IntoResponse {
    let reply = match form {
        Ok(Form(form)) => state.orchestrator.handle_event(form.into_event()).await,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected malformed webhook body");
            OutboundMessage::new(vec![replies::GENERIC_APOLOGY.to_string()])
        }
    };
    (
        [(header::CONTENT_TYPE, "application/xml")],
        render_twiml(&reply, state.reply_from.as_deref()),
    )
}

/// Renders one `<Message>` element per chunk.
pub fn render_twiml(reply: &OutboundMessage, from: Option<&str>) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);
    for chunk in &reply.chunks {
        match from {
            Some(from) => {
                xml.push_str(&format!(r#"<Message from="{}">"#, escape(from)));
            }
            None => xml.push_str("<Message>"),
        }
        xml.push_str(&escape(chunk.as_str()));
        xml.push_str("</Message>");
    }
    xml.push_str("</Response>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twiml_escapes_content() {
        let reply = OutboundMessage::new(vec!["Salt & <sugar>".to_string(), "second".to_string()]);
        let xml = render_twiml(&reply, None);
        assert!(xml.contains("<Message>Salt &amp; &lt;sugar&gt;</Message>"));
        assert!(xml.contains("<Message>second</Message>"));
        assert!(xml.ends_with("</Response>"));
    }

    #[test]
    fn test_twiml_from_attribute() {
        let reply = OutboundMessage::new(vec!["hi".to_string()]);
        let xml = render_twiml(&reply, Some("whatsapp:+1\"5"));
        assert!(xml.contains(r#"<Message from="whatsapp:+1&quot;5">hi</Message>"#));
    }

    #[test]
    fn test_empty_reply_is_valid_twiml() {
        let xml = render_twiml(&OutboundMessage::default(), None);
        assert!(xml.ends_with("<Response></Response>"));
    }

    #[test]
    fn test_form_to_event() {
        let form = TwilioForm {
            from: "whatsapp:+15550001111".into(),
            body: "sugar".into(),
            num_media: Some("1".into()),
            media_url0: Some("https://media.example/1".into()),
            media_content_type0: Some("image/jpeg".into()),
        };
        let event = form.into_event();
        assert_eq!(event.sender, "whatsapp:+15550001111");
        assert_eq!(event.media.len(), 1);
        assert_eq!(event.media[0].content_type.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn test_form_without_media_count_ignores_url() {
        let form = TwilioForm {
            from: "u".into(),
            num_media: Some("0".into()),
            media_url0: Some("https://media.example/1".into()),
            ..Default::default()
        };
        assert!(!form.into_event().has_media());
    }
}
