//! HTTP server for the gateway.
//!
//! - [`api`]: Router, shared state and route handlers
//! - [`streaming`]: SSE framing for streaming completions
//! - [`docs`]: Static documentation page served at `/`

pub mod api;
pub mod docs;
pub mod streaming;
