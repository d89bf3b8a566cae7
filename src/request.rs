//! Request validation and normalization.
//!
//! A raw JSON body becomes a [`GenerationRequest`] whose four fields always
//! hold valid values. Only a missing or empty prompt is rejected; an invalid
//! model, provider or mode is replaced by its default and logged.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::GatewayError;
use crate::provider::ProviderId;

/// Models accepted by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Model {
    #[default]
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
    #[serde(rename = "gpt-4")]
    Gpt4,
}

impl Model {
    pub const ALL: [Model; 2] = [Model::Gpt35Turbo, Model::Gpt4];

    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Gpt35Turbo => "gpt-3.5-turbo",
            Model::Gpt4 => "gpt-4",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response delivery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Single JSON body once generation finishes.
    #[default]
    Normal,
    /// Server-sent events, one per upstream chunk.
    Streaming,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Normal, Mode::Streaming];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Streaming => "streaming",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single chat message sent upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A validated generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: Model,
    pub provider: ProviderId,
    pub mode: Mode,
}

impl GenerationRequest {
    /// Messages forwarded to the completion capability.
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![ChatMessage::user(self.prompt.clone())]
    }
}

/// Outcome of normalizing a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub request: GenerationRequest,

    /// Names of the fields that were replaced by their default.
    pub defaulted: Vec<&'static str>,
}

/// Validate a raw JSON body and fill in defaults.
///
/// Absent optional fields take their default silently. A field that is
/// present but unusable (unknown name, `null`, non-string) is defaulted with
/// a warning.
pub fn normalize(body: &Value) -> Result<Normalized, GatewayError> {
    let prompt = match body.get("prompt") {
        Some(Value::String(p)) if !p.is_empty() => p.clone(),
        _ => return Err(GatewayError::prompt_required()),
    };

    let mut defaulted = Vec::new();

    let model = resolve_field(body, "model", Model::parse, Model::default(), &mut defaulted);
    let provider = resolve_field(
        body,
        "provider",
        ProviderId::from_name,
        ProviderId::default(),
        &mut defaulted,
    );
    let mode = resolve_field(body, "mode", Mode::parse, Mode::default(), &mut defaulted);

    Ok(Normalized {
        request: GenerationRequest {
            prompt,
            model,
            provider,
            mode,
        },
        defaulted,
    })
}

fn resolve_field<T: fmt::Display + Copy>(
    body: &Value,
    field: &'static str,
    parse: impl Fn(&str) -> Option<T>,
    default: T,
    defaulted: &mut Vec<&'static str>,
) -> T {
    let Some(raw) = body.get(field) else {
        return default;
    };

    if let Some(value) = raw.as_str().and_then(&parse) {
        return value;
    }

    let shown = match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    warn!(
        field,
        value = %shown,
        default = %default,
        "Invalid {field}: {shown}. Defaulting to {default}"
    );
    defaulted.push(field);
    default
}
