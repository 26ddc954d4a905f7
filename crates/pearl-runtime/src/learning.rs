use pearl_core::{PearlError, Priority, Result};
use pearl_llm::{EmbeddingProvider, GenerationRequest, ReasoningProvider};
use pearl_memory::entry::{MemoryEntry, rule_metadata};
use pearl_memory::{VectorStore, VisualMemory};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const LEARNING_AUTHOR: &str = "learning_engine";

/// A rule synthesized from a clinician's correction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearnedRule {
    pub id: String,
    pub text: String,
}

/// Disagreement path. Turns corrections into high-priority rules.
pub struct LearningEngine {
    provider: Arc<dyn ReasoningProvider>,
    model: String,
    rules: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    visual: VisualMemory,
    override_confidence: f64,
}

impl LearningEngine {
    pub fn new(
        provider: Arc<dyn ReasoningProvider>,
        model: impl Into<String>,
        rules: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        visual: VisualMemory,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            rules,
            embedder,
            visual,
            override_confidence: 5.0,
        }
    }

    pub fn with_override_confidence(mut self, confidence: f64) -> Self {
        self.override_confidence = confidence;
        self
    }

    /// Ask the model for a generic IF-THEN override covering this mistake and
    /// store it. Every learned rule is a critical override; repeated
    /// corrections are stored again rather than merged.
    pub async fn learn(&self, correct_diagnosis: &str, rationale: &str) -> Result<LearnedRule> {
        let prompt = format!(
            "CASE ERROR: AI was wrong.\n\
             CORRECT DX: {correct_diagnosis}\n\
             REASON: {rationale}\n\
             Create a generic IF-THEN medical rule starting with 'CRITICAL OVERRIDE:'."
        );
        let generation = self
            .provider
            .generate(&GenerationRequest::new(&self.model, prompt))
            .await?;
        let text = generation.text.trim().to_string();
        if text.is_empty() {
            return Err(PearlError::MalformedOutput(
                "model returned an empty rule".into(),
            ));
        }

        let vector = self.embedder.embed_one(&text).await?;
        let id = format!("learned_rule_{}", Uuid::new_v4());
        let metadata = rule_metadata(
            Priority::CriticalOverride,
            self.override_confidence,
            LEARNING_AUTHOR,
        );
        self.rules
            .add(vec![MemoryEntry::new(&id, &text, vector).with_metadata(metadata)])?;
        info!(id = %id, diagnosis = correct_diagnosis, "override rule learned");
        Ok(LearnedRule { id, text })
    }

    /// Store a scan-reading correction verbatim in visual memory.
    pub async fn learn_visual(&self, correction: &str, author: &str) -> Result<String> {
        self.visual.learn_rule(correction, author).await
    }
}
