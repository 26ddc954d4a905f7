use async_trait::async_trait;
use pearl_core::Result;
use serde::{Deserialize, Serialize};

/// Binary input sent alongside the prompt (scan photographs, mostly).
#[derive(Debug, Clone)]
pub struct Attachment {
    /// MIME type, e.g. "image/jpeg".
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// What shape the model is asked to answer in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// Ask the provider for a JSON document. Callers still parse defensively.
    Json,
}

/// A request to a reasoning provider.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Provider-specific model name, e.g. "gemini-3-flash-preview".
    pub model: String,
    pub prompt: String,
    pub attachments: Vec<Attachment>,
    pub response_format: ResponseFormat,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            attachments: Vec::new(),
            response_format: ResponseFormat::Text,
            temperature: 0.4,
            max_tokens: 8192,
        }
    }

    pub fn json(mut self) -> Self {
        self.response_format = ResponseFormat::Json;
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

/// A complete response from a reasoning provider.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub usage: Usage,
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Trait implemented by each reasoning backend (Gemini, OpenAI, mock).
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Human-readable name, e.g. "gemini".
    fn name(&self) -> &str;

    /// Send a single non-streaming request.
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation>;
}
