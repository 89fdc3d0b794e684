//! Backend-facing actors and capabilities.
//!
//! - `llm`: OpenAI-compatible chat model run as a tokio actor
//! - `router`: picks the text or vision model by input shape
//! - `media`: authenticated attachment downloads

pub mod llm;
pub mod media;
pub mod messages;
pub mod router;
pub mod traits;
