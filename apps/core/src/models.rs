use chrono::{DateTime, Utc};

/// An attachment referenced by an inbound webhook call, before it is downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAttachment {
    /// Location the gateway serves the media from.
    pub url: String,
    /// Content type declared by the gateway, if any.
    pub content_type: Option<String>,
}

/// One inbound message, exactly as the gateway delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Opaque sender address (e.g. `whatsapp:+15550001111`).
    pub sender: String,
    /// Message body, possibly empty.
    pub text: String,
    /// Attachments in gateway order. Only the first one is ever considered.
    pub media: Vec<MediaAttachment>,
}

impl InboundEvent {
    pub fn text(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            media: Vec::new(),
        }
    }

    pub fn with_media(mut self, url: impl Into<String>, content_type: Option<String>) -> Self {
        self.media.push(MediaAttachment {
            url: url.into(),
            content_type,
        });
        self
    }

    pub fn has_media(&self) -> bool {
        !self.media.is_empty()
    }

    /// The body with surrounding whitespace removed.
    pub fn body(&self) -> &str {
        self.text.trim()
    }

    /// True when there is neither text nor an attachment to work with.
    pub fn is_blank(&self) -> bool {
        self.body().is_empty() && !self.has_media()
    }
}

/// A downloaded image ready to be sent to the vision backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// What the analysis generator works from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisInput {
    /// Raw ingredient text typed by the user.
    Text(String),
    /// A photo of an ingredient label, with the message body as an optional caption.
    Image {
        image: ImagePayload,
        caption: Option<String>,
    },
}

impl AnalysisInput {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisInput::Text(_) => "text",
            AnalysisInput::Image { .. } => "image",
        }
    }
}

/// Short and detailed classification of the same ingredient set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub short_summary: String,
    pub detailed_explanation: String,
}

/// Per-sender conversation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Whether the welcome message has been sent to this sender.
    pub welcomed: bool,
    /// Detailed explanation of the most recent successful classification.
    pub last_detailed_analysis: Option<String>,
    /// When this record was last touched.
    pub last_updated: DateTime<Utc>,
    /// Ticket of the most recently started classification.
    pub generation: u64,
    /// A classification for `generation` is still in flight.
    pub pending: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            welcomed: false,
            last_detailed_analysis: None,
            last_updated: Utc::now(),
            generation: 0,
            pending: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered reply chunks addressed back to the sender.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chunks: Vec<String>,
}

impl OutboundMessage {
    pub fn new(chunks: Vec<String>) -> Self {
        Self { chunks }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// All chunks joined with a single space.
    #[cfg(test)]
    pub fn joined(&self) -> String {
        self.chunks.join(" ")
    }

    pub fn extend(&mut self, other: OutboundMessage) {
        self.chunks.extend(other.chunks);
    }
}
