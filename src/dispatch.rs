//! Completion dispatcher: runs a normalized request against its provider.
//!
//! Upstream failures never escape as errors. In normal mode they become an
//! `"Error: {provider} - {message}"` string; in streaming mode they become a
//! single terminal [`StreamEvent::Error`].

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::time::timeout;
use tracing::{error, info};

use crate::error::CompletionError;
use crate::metrics::Metrics;
use crate::provider::{ProviderId, ProviderRegistry};
use crate::request::GenerationRequest;

/// Result of a normal-mode completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Full text produced by the provider.
    Text(String),
    /// Formatted upstream failure.
    Failed(String),
}

impl Completion {
    pub fn is_failed(&self) -> bool {
        matches!(self, Completion::Failed(_))
    }

    pub fn into_text(self) -> String {
        match self {
            Completion::Text(text) | Completion::Failed(text) => text,
        }
    }
}

/// One event of a streaming completion. Serializes to `{"chunk": ...}` or
/// `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamEvent {
    Chunk(String),
    /// Terminal: nothing follows an error.
    Error(String),
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    metrics: Arc<Metrics>,
    timeout: Duration,
}

impl Dispatcher {
    /// `timeout` bounds a whole normal-mode call and the opening of a stream.
    pub fn new(registry: Arc<ProviderRegistry>, metrics: Arc<Metrics>, timeout: Duration) -> Self {
        Self {
            registry,
            metrics,
            timeout,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Blocking completion. Attempted exactly once.
    pub async fn complete(&self, request_id: &str, request: &GenerationRequest) -> Completion {
        let handle = self.registry.resolve(request.provider);

        let result = match timeout(self.timeout, handle.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(CompletionError::Timeout(self.timeout)),
        };

        match result {
            Ok(text) => {
                info!(
                    request_id,
                    provider = %request.provider,
                    model = %request.model,
                    "Response generated successfully"
                );
                Completion::Text(text)
            }
            Err(err) => Completion::Failed(report_failure(
                &self.metrics,
                request_id,
                request.provider,
                &err,
            )),
        }
    }

    /// Incremental completion. The returned stream is lazy: nothing is sent
    /// upstream until it is first polled.
    pub fn stream(
        &self,
        request_id: String,
        request: GenerationRequest,
    ) -> impl Stream<Item = StreamEvent> + Send + 'static {
        let handle = self.registry.resolve(request.provider);
        let metrics = Arc::clone(&self.metrics);
        let limit = self.timeout;

        async_stream::stream! {
            let opened = match timeout(limit, handle.generate_stream(&request)).await {
                Ok(result) => result,
                Err(_) => Err(CompletionError::Timeout(limit)),
            };

            let mut chunks = match opened {
                Ok(chunks) => chunks,
                Err(err) => {
                    yield StreamEvent::Error(report_failure(&metrics, &request_id, request.provider, &err));
                    return;
                }
            };

            let mut count = 0usize;
            while let Some(item) = chunks.next().await {
                match item {
                    Ok(text) => {
                        count += 1;
                        metrics.stream_chunks.inc();
                        yield StreamEvent::Chunk(text);
                    }
                    Err(err) => {
                        yield StreamEvent::Error(report_failure(&metrics, &request_id, request.provider, &err));
                        return;
                    }
                }
            }

            info!(
                request_id = %request_id,
                provider = %request.provider,
                model = %request.model,
                chunks = count,
                "Streaming response generated successfully"
            );
        }
    }
}

/// Log an upstream failure and format it for the client.
fn report_failure(
    metrics: &Metrics,
    request_id: &str,
    provider: ProviderId,
    err: &CompletionError,
) -> String {
    metrics
        .upstream_failures
        .with_label_values(&[provider.as_str()])
        .inc();
    error!(request_id, provider = %provider, error = %err, "Error with {provider}: {err}");
    format!("Error: {provider} - {err}")
}
