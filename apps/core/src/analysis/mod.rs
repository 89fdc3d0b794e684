//! # Analysis Module
//!
//! Two-tier ingredient classification on top of the backend capability.
//!
//! ## Components
//! - `prompts`: prompt templates with the Safe / Caution / Avoid taxonomy
//! - `generator`: short, detailed and combined generation strategies

pub mod generator;
pub mod prompts;

pub use generator::{AnalysisGenerator, GenerationStrategy};
