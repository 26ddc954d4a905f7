//! # pearl-llm
//!
//! Abstraction over the two external collaborators Pearl relies on: an
//! embedding model (text → fixed-dimension vector) and a reasoning model
//! (prompt + optional images → text or JSON). Ships Gemini and OpenAI-compatible
//! adapters, an Ollama embedder, deterministic mocks, and the bounded retry
//! used by the decision path.

pub mod embedding;
pub mod gemini;
pub(crate) mod http;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod retry;

pub use embedding::EmbeddingProvider;
pub use mock::{MockEmbedding, MockProvider, MockResponse};
pub use provider::{
    Attachment, Generation, GenerationRequest, ReasoningProvider, ResponseFormat, Usage,
};
pub use retry::RetryPolicy;
