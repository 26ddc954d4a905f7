use pearl_core::Result;
use pearl_llm::EmbeddingProvider;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entry::MemoryEntry;
use crate::store::VectorStore;

pub const NO_VISUAL_ERRORS: &str = "No specific past errors.";
pub const VISUAL_MEMORY_UNAVAILABLE: &str = "Memory unavailable.";
pub const DEFAULT_VISUAL_QUERY: &str = "radiology miss";

/// Radiology corrections consulted before every image analysis.
///
/// Recall is keyed on a fixed phrase rather than the case at hand, so every
/// analysis sees the same handful of corrections.
#[derive(Clone)]
pub struct VisualMemory {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    query: String,
    top_k: usize,
}

impl VisualMemory {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            query: DEFAULT_VISUAL_QUERY.to_string(),
            top_k: 3,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>, top_k: usize) -> Self {
        self.query = query.into();
        self.top_k = top_k;
        self
    }

    /// Newline-joined correction texts. Never fails: an empty collection and
    /// an unreachable store each have their own marker.
    pub async fn recall(&self) -> String {
        let vector = match self.embedder.embed_one(&self.query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "visual memory query failed");
                return VISUAL_MEMORY_UNAVAILABLE.to_string();
            }
        };
        match self.store.query(&vector, self.top_k) {
            Ok(hits) if hits.is_empty() => NO_VISUAL_ERRORS.to_string(),
            Ok(hits) => hits
                .iter()
                .map(|s| s.entry.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => {
                warn!(error = %e, "visual memory query failed");
                VISUAL_MEMORY_UNAVAILABLE.to_string()
            }
        }
    }

    /// Store a clinician's correction verbatim as a visual rule.
    pub async fn learn_rule(&self, correction: &str, author: &str) -> Result<String> {
        let vector = self.embedder.embed_one(correction).await?;
        let id = format!("visual_rule_{}", Uuid::new_v4());
        let entry = MemoryEntry::new(&id, format!("CRITICAL VISUAL RULE: {correction}"), vector)
            .with_meta("author", author)
            .with_meta("type", "visual_correction");
        self.store.add(vec![entry])?;
        info!(id = %id, author, "visual rule learned");
        Ok(id)
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }
}
