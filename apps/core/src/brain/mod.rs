//! # Brain Module
//!
//! Decides what an inbound message asks for BEFORE any classification call.
//!
//! ## Components
//! - `intent`: lexical trigger-phrase policy (fast path)
//! - `delegated_intent`: backend yes/no question (fallback)

pub mod delegated_intent;
pub mod intent;

pub use delegated_intent::DelegatedIntentClassifier;
pub use intent::{Intent, IntentPolicy, IntentPolicyKind, LexicalIntentClassifier};
