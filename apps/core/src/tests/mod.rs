//! Test Module
//!
//! Conversation-level test suite for the LabelCheck service.
//!
//! ## Test Categories
//! - `mocks`: scripted backend and media fetcher, orchestrator harness
//! - `orchestrator_tests`: welcome, classification, expansion and failure flows
//! - `chaos_tests`: many senders, overlapping requests, flaky backend
//! - `webhook_tests`: form in, TwiML out over a real socket

pub mod chaos_tests;
