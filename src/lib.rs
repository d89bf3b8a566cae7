//! gpt-gateway: HTTP façade over a multi-provider LLM aggregator.
//!
//! Accepts `POST /api/generate` requests, normalizes the prompt, model,
//! provider and mode, and forwards the prompt to the selected provider:
//!   request → validator → dispatcher → JSON body | SSE stream
//!
//! All generation work is delegated to a [`provider::ChatCompletion`]
//! backend; the default one speaks the OpenAI-compatible wire format of
//! the aggregator's HTTP API.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod request;
pub mod server;
