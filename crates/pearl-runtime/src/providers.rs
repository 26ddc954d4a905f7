use pearl_config::PearlConfig;
use pearl_core::{PearlError, Result};
use pearl_llm::embedding::{GeminiEmbedding, OllamaEmbedding, OpenAiEmbedding};
use pearl_llm::gemini::GeminiProvider;
use pearl_llm::openai::OpenAiProvider;
use pearl_llm::{EmbeddingProvider, MockEmbedding, MockProvider, ReasoningProvider};
use std::sync::Arc;
use std::time::Duration;

fn require_key(key: Option<&String>, var: &str) -> Result<String> {
    key.filter(|k| !k.is_empty())
        .cloned()
        .ok_or_else(|| PearlError::Config(format!("missing API key: set {var} or services config")))
}

/// Build the reasoning provider named by `reasoning.provider`.
pub fn reasoning_provider(config: &PearlConfig) -> Result<Arc<dyn ReasoningProvider>> {
    let timeout = Duration::from_secs(config.reasoning.timeout_secs);
    match config.reasoning.provider.as_str() {
        "gemini" => {
            let key = require_key(config.services.gemini_api_key.as_ref(), "GEMINI_API_KEY")?;
            Ok(Arc::new(GeminiProvider::with_timeout(key, timeout)))
        }
        "openai" => {
            let key = require_key(config.services.openai_api_key.as_ref(), "OPENAI_API_KEY")?;
            Ok(Arc::new(OpenAiProvider::with_timeout(key, timeout)))
        }
        "mock" => Ok(Arc::new(MockProvider::new("mock"))),
        other => Err(PearlError::Config(format!(
            "unknown reasoning provider: {other}"
        ))),
    }
}

/// Build the embedding provider named by `embedding.provider`.
pub fn embedding_provider(config: &PearlConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let model = config.embedding.model.clone();
    let dims = config.embedding.dimensions;
    match config.embedding.provider.as_str() {
        "gemini" => {
            let key = require_key(config.services.gemini_api_key.as_ref(), "GEMINI_API_KEY")?;
            Ok(Arc::new(GeminiEmbedding::new(key).with_model(model, dims)))
        }
        "openai" => {
            let key = require_key(config.services.openai_api_key.as_ref(), "OPENAI_API_KEY")?;
            Ok(Arc::new(OpenAiEmbedding::new(key).with_model(model, dims)))
        }
        "ollama" => Ok(Arc::new(
            OllamaEmbedding::new(&model, dims).with_base_url(config.services.ollama_url.clone()),
        )),
        "mock" => Ok(Arc::new(MockEmbedding::new(dims))),
        other => Err(PearlError::Config(format!(
            "unknown embedding provider: {other}"
        ))),
    }
}
