//! Provider registry and the completion capability it dispatches to.
//!
//! - [`ProviderId`]: the closed set of provider names the gateway accepts
//! - [`ProviderRegistry`]: immutable map from every [`ProviderId`] to a backend
//! - [`ChatCompletion`]: blocking and incremental completion interface
//! - [`http`]: backend speaking the aggregator's OpenAI-compatible HTTP API

pub mod http;

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::CompletionError;
use crate::request::{ChatMessage, GenerationRequest, Model};

/// Providers known to the upstream aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProviderId {
    #[default]
    #[serde(rename = "ChatGLM")]
    ChatGlm,
    #[serde(rename = "Free2GPT")]
    Free2Gpt,
    #[serde(rename = "GizAI")]
    GizAi,
    #[serde(rename = "Goabror")]
    Goabror,
    #[serde(rename = "ImageLabs")]
    ImageLabs,
    #[serde(rename = "MetaAI")]
    MetaAi,
    #[serde(rename = "PollinationsAI")]
    PollinationsAi,
    #[serde(rename = "PollinationsImage")]
    PollinationsImage,
    #[serde(rename = "Qwen_QVQ_72B")]
    QwenQvq72b,
    #[serde(rename = "Qwen_Qwen_2_5")]
    QwenQwen25,
    #[serde(rename = "Qwen_Qwen_2_5M")]
    QwenQwen25m,
    #[serde(rename = "Qwen_Qwen_2_5_Max")]
    QwenQwen25Max,
    #[serde(rename = "Qwen_Qwen_2_72B")]
    QwenQwen272b,
    #[serde(rename = "Voodoohop_Flux1Schnell")]
    VoodoohopFlux1Schnell,
    #[serde(rename = "Websim")]
    Websim,
    #[serde(rename = "Yqcloud")]
    Yqcloud,
    /// The aggregator's generic provider entry.
    #[serde(rename = "provider")]
    Generic,
}

impl ProviderId {
    pub const COUNT: usize = 17;

    pub const ALL: [ProviderId; Self::COUNT] = [
        ProviderId::ChatGlm,
        ProviderId::Free2Gpt,
        ProviderId::GizAi,
        ProviderId::Goabror,
        ProviderId::ImageLabs,
        ProviderId::MetaAi,
        ProviderId::PollinationsAi,
        ProviderId::PollinationsImage,
        ProviderId::QwenQvq72b,
        ProviderId::QwenQwen25,
        ProviderId::QwenQwen25m,
        ProviderId::QwenQwen25Max,
        ProviderId::QwenQwen272b,
        ProviderId::VoodoohopFlux1Schnell,
        ProviderId::Websim,
        ProviderId::Yqcloud,
        ProviderId::Generic,
    ];

    /// Name as understood by the aggregator and echoed to clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::ChatGlm => "ChatGLM",
            ProviderId::Free2Gpt => "Free2GPT",
            ProviderId::GizAi => "GizAI",
            ProviderId::Goabror => "Goabror",
            ProviderId::ImageLabs => "ImageLabs",
            ProviderId::MetaAi => "MetaAI",
            ProviderId::PollinationsAi => "PollinationsAI",
            ProviderId::PollinationsImage => "PollinationsImage",
            ProviderId::QwenQvq72b => "Qwen_QVQ_72B",
            ProviderId::QwenQwen25 => "Qwen_Qwen_2_5",
            ProviderId::QwenQwen25m => "Qwen_Qwen_2_5M",
            ProviderId::QwenQwen25Max => "Qwen_Qwen_2_5_Max",
            ProviderId::QwenQwen272b => "Qwen_Qwen_2_72B",
            ProviderId::VoodoohopFlux1Schnell => "Voodoohop_Flux1Schnell",
            ProviderId::Websim => "Websim",
            ProviderId::Yqcloud => "Yqcloud",
            ProviderId::Generic => "provider",
        }
    }

    /// Exact-match lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to a completion backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub provider: ProviderId,
    pub model: Model,
    pub messages: Vec<ChatMessage>,
}

/// Incremental completion output. Finite and not restartable.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

/// The external completion capability.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Run a completion to the end and return the full text.
    async fn create(&self, request: &CompletionRequest) -> Result<String, CompletionError>;

    /// Start an incremental completion.
    async fn create_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<ChunkStream, CompletionError>;
}

/// A provider bound to the backend that serves it.
#[derive(Clone)]
pub struct ProviderHandle {
    pub id: ProviderId,
    backend: Arc<dyn ChatCompletion>,
}

impl ProviderHandle {
    fn completion_request(&self, request: &GenerationRequest) -> CompletionRequest {
        CompletionRequest {
            provider: self.id,
            model: request.model,
            messages: request.messages(),
        }
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, CompletionError> {
        self.backend.create(&self.completion_request(request)).await
    }

    pub async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<ChunkStream, CompletionError> {
        self.backend
            .create_stream(&self.completion_request(request))
            .await
    }
}

/// Immutable provider table. Every [`ProviderId`] always resolves.
pub struct ProviderRegistry {
    backends: [Arc<dyn ChatCompletion>; ProviderId::COUNT],
}

impl ProviderRegistry {
    /// Serve every provider through one backend.
    pub fn new(backend: Arc<dyn ChatCompletion>) -> Self {
        Self {
            backends: std::array::from_fn(|_| Arc::clone(&backend)),
        }
    }

    /// Replace the backend for a single provider.
    pub fn with_backend(mut self, id: ProviderId, backend: Arc<dyn ChatCompletion>) -> Self {
        self.backends[id.index()] = backend;
        self
    }

    pub fn resolve(&self, id: ProviderId) -> ProviderHandle {
        ProviderHandle {
            id,
            backend: Arc::clone(&self.backends[id.index()]),
        }
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
