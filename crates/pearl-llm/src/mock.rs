//! Mock collaborators for deterministic testing and offline runs.
//!
//! `MockProvider` replays queued responses without any HTTP calls.
//! `MockEmbedding` hashes words into a fixed number of buckets, so texts that
//! share vocabulary land close together and identical texts embed identically.

use async_trait::async_trait;
use parking_lot::Mutex;
use pearl_core::{PearlError, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embedding::EmbeddingProvider;
use crate::provider::*;

/// A pre-configured response from the mock provider.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Text(String),
    /// Fails with `PearlError::Transient`.
    Transient(String),
    /// Fails with `PearlError::RateLimited`.
    RateLimited,
    /// Fails with a non-retryable `PearlError::Provider`.
    Error(String),
}

impl MockResponse {
    pub fn text(text: &str) -> Self {
        MockResponse::Text(text.to_string())
    }

    pub fn error(msg: &str) -> Self {
        MockResponse::Error(msg.to_string())
    }

    pub fn transient(msg: &str) -> Self {
        MockResponse::Transient(msg.to_string())
    }
}

/// A mock reasoning provider that returns pre-configured responses in order.
///
/// # Example
/// ```
/// use pearl_llm::mock::MockProvider;
/// let provider = MockProvider::new("test")
///     .with_response("CRITICAL OVERRIDE: IF x THEN y");
/// ```
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    /// Every request received, for assertions in tests.
    pub requests: Arc<Mutex<Vec<GenerationRequest>>>,
    name: String,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(vec![])),
            name: name.into(),
        }
    }

    /// Queue a text response.
    pub fn with_response(self, text: &str) -> Self {
        self.responses.lock().push_back(MockResponse::text(text));
        self
    }

    /// Queue a non-retryable error.
    pub fn with_error(self, error: &str) -> Self {
        self.responses.lock().push_back(MockResponse::error(error));
        self
    }

    /// Queue a transient (retryable) error.
    pub fn with_transient_error(self, error: &str) -> Self {
        self.responses.lock().push_back(MockResponse::transient(error));
        self
    }

    /// Queue any response.
    pub fn with_mock_response(self, resp: MockResponse) -> Self {
        self.responses.lock().push_back(resp);
        self
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn next_response(&self) -> MockResponse {
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| MockResponse::text("(mock: no more queued responses)"))
    }
}

#[async_trait]
impl ReasoningProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        self.requests.lock().push(request.clone());
        match self.next_response() {
            MockResponse::Text(text) => Ok(Generation {
                usage: Usage {
                    input_tokens: request.prompt.split_whitespace().count() as u32,
                    output_tokens: text.split_whitespace().count() as u32,
                },
                text,
            }),
            MockResponse::Transient(msg) => Err(PearlError::Transient(msg)),
            MockResponse::RateLimited => Err(PearlError::RateLimited { retry_after_secs: 0 }),
            MockResponse::Error(msg) => Err(PearlError::Provider(msg)),
        }
    }
}

/// Deterministic bag-of-words embedding.
pub struct MockEmbedding {
    dims: usize,
    /// Texts containing any of these substrings fail to embed.
    failing: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockEmbedding {
    pub fn new(dims: usize) -> Self {
        Self {
            dims: dims.max(1),
            failing: Mutex::new(vec![]),
            calls: AtomicUsize::new(0),
        }
    }

    /// Make every text containing `needle` fail with `PearlError::Embedding`.
    pub fn failing_on(self, needle: &str) -> Self {
        self.failing.lock().push(needle.to_string());
        self
    }

    /// Make every call fail.
    pub fn failing_always(self) -> Self {
        self.failing_on("")
    }

    /// Number of texts embedded (or attempted).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The vector this provider assigns to `text`.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = (fnv1a(word.as_bytes()) % self.dims as u64) as usize;
            v[bucket] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for MockEmbedding {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(texts.len(), Ordering::SeqCst);
        let failing = self.failing.lock().clone();
        texts
            .iter()
            .map(|t| {
                if failing.iter().any(|needle| t.contains(needle.as_str())) {
                    Err(PearlError::Embedding(format!("mock: refusing to embed '{t}'")))
                } else {
                    Ok(self.vector_for(t))
                }
            })
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_text_response() {
        let provider = MockProvider::new("mock").with_response("Hello!");
        let req = GenerationRequest::new("test", "hi");
        let resp = provider.generate(&req).await.unwrap();
        assert_eq!(resp.text, "Hello!");
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_errors_keep_their_class() {
        let provider = MockProvider::new("mock")
            .with_transient_error("HTTP 503")
            .with_mock_response(MockResponse::RateLimited)
            .with_error("HTTP 400");
        let req = GenerationRequest::new("test", "hi");
        assert!(provider.generate(&req).await.unwrap_err().is_transient());
        assert!(provider.generate(&req).await.unwrap_err().is_transient());
        assert!(!provider.generate(&req).await.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn test_mock_multiple_responses_in_order() {
        let provider = MockProvider::new("mock")
            .with_response("first")
            .with_response("second");
        let req = GenerationRequest::new("test", "hi");
        assert_eq!(provider.generate(&req).await.unwrap().text, "first");
        assert_eq!(provider.generate(&req).await.unwrap().text, "second");
        assert!(provider.generate(&req).await.unwrap().text.contains("no more queued"));
    }

    #[tokio::test]
    async fn test_mock_embedding_is_deterministic_and_normalized() {
        let embedder = MockEmbedding::new(64);
        let a = embedder.embed_one("Bilateral sciatica").await.unwrap();
        let b = embedder.embed_one("bilateral SCIATICA").await.unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(embedder.dimensions(), 64);
    }

    #[tokio::test]
    async fn test_mock_embedding_failure() {
        let embedder = MockEmbedding::new(16).failing_on("poison");
        assert!(embedder.embed_one("safe text").await.is_ok());
        assert!(embedder.embed_one("poison pill").await.is_err());
        assert_eq!(embedder.calls(), 2);
    }
}
