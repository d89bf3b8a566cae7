//! Completion backend for the aggregator's OpenAI-compatible HTTP API.
//!
//! Requests go to `POST {base_url}/chat/completions` with the provider name
//! in the body. Blocking calls read `choices[0].message.content`; streaming
//! calls parse SSE `chat.completion.chunk` frames until `data: [DONE]`.

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{future, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::error::CompletionError;
use crate::provider::{ChatCompletion, ChunkStream, CompletionRequest};
use crate::request::ChatMessage;

const DONE_SENTINEL: &str = "[DONE]";

/// Error bodies longer than this are cut before being reported.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct UpstreamRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    provider: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct UpstreamResponse {
    #[serde(default)]
    choices: Vec<UpstreamChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct UpstreamChoice {
    #[serde(default)]
    message: Option<UpstreamMessage>,
    #[serde(default)]
    delta: Option<UpstreamMessage>,
}

#[derive(Debug, Deserialize)]
struct UpstreamMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for the aggregator.
pub struct HttpCompletion {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpCompletion {
    pub fn new(config: &UpstreamConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: chat_completions_url(&config.base_url),
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, CompletionError> {
        let payload = UpstreamRequest {
            model: request.model.as_str(),
            messages: &request.messages,
            provider: request.provider.as_str(),
            stream,
        };

        debug!(
            endpoint = %self.endpoint,
            provider = %request.provider,
            model = %request.model,
            stream,
            "Sending upstream request"
        );

        let mut builder = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatCompletion for HttpCompletion {
    async fn create(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let body = self.send(request, false).await?.text().await?;
        parse_completion(&body)
    }

    async fn create_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<ChunkStream, CompletionError> {
        let response = self.send(request, true).await?;

        let chunks = response
            .bytes_stream()
            .eventsource()
            .take_while(|event| {
                let done = matches!(event, Ok(e) if e.data.trim() == DONE_SENTINEL);
                future::ready(!done)
            })
            .filter_map(|event| {
                future::ready(match event {
                    Ok(event) => parse_chunk(&event.data).transpose(),
                    Err(err) => Some(Err(CompletionError::Stream(err.to_string()))),
                })
            });

        Ok(Box::pin(chunks))
    }
}

fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Extract the text of a non-streaming `chat.completion` body.
fn parse_completion(body: &str) -> Result<String, CompletionError> {
    let response: UpstreamResponse = serde_json::from_str(body).map_err(|err| {
        CompletionError::InvalidResponse(format!(
            "{err}: {}",
            truncate(body, MAX_ERROR_BODY)
        ))
    })?;

    if let Some(error) = response.error {
        return Err(CompletionError::Upstream(error_message(&error)));
    }

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or_else(|| CompletionError::InvalidResponse("response has no choices".to_string()))
}

/// Extract the text delta of one streaming frame. Frames without content
/// (role announcements, finish markers) yield `None`.
fn parse_chunk(data: &str) -> Result<Option<String>, CompletionError> {
    if data.trim().is_empty() {
        return Ok(None);
    }

    let frame: UpstreamResponse = serde_json::from_str(data).map_err(|err| {
        CompletionError::InvalidResponse(format!("{err}: {}", truncate(data, MAX_ERROR_BODY)))
    })?;

    if let Some(error) = frame.error {
        return Err(CompletionError::Upstream(error_message(&error)));
    }

    Ok(frame
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|text| !text.is_empty()))
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Object(map) => match map.get("message") {
            Some(Value::String(message)) => message.clone(),
            _ => error.to_string(),
        },
        other => other.to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
