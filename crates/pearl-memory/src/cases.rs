use pearl_core::{CaseKind, Result};
use pearl_llm::EmbeddingProvider;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::entry::{MemoryEntry, gold_case_metadata};
use crate::store::VectorStore;

/// A clinician-validated case about to become a precedent.
#[derive(Debug, Clone)]
pub struct GoldCase {
    pub narrative: String,
    pub kind: CaseKind,
    pub validated_by: String,
    pub scan_quality: Option<String>,
}

impl GoldCase {
    pub fn textual(narrative: impl Into<String>, validated_by: impl Into<String>) -> Self {
        Self {
            narrative: narrative.into(),
            kind: CaseKind::TextualPrecedent,
            validated_by: validated_by.into(),
            scan_quality: None,
        }
    }

    pub fn vision(
        narrative: impl Into<String>,
        validated_by: impl Into<String>,
        scan_quality: impl Into<String>,
    ) -> Self {
        Self {
            narrative: narrative.into(),
            kind: CaseKind::VisionPrecedent,
            validated_by: validated_by.into(),
            scan_quality: Some(scan_quality.into()),
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self.kind {
            CaseKind::TextualPrecedent => "gold_case",
            CaseKind::VisionPrecedent => "gold_vision",
        }
    }
}

/// Write side of the precedent collection.
#[derive(Clone)]
pub struct CaseMemory {
    cases: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl CaseMemory {
    pub fn new(cases: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { cases, embedder }
    }

    /// Embed and store a validated case. Returns the new entry id.
    pub async fn archive(&self, case: &GoldCase) -> Result<String> {
        let vector = self.embedder.embed_one(&case.narrative).await?;
        let id = format!("{}_{}", case.id_prefix(), Uuid::new_v4());
        let timestamp = chrono::Utc::now().to_rfc3339();
        let metadata = gold_case_metadata(
            case.kind,
            &case.validated_by,
            &timestamp,
            case.scan_quality.as_deref(),
        );
        self.cases
            .add(vec![MemoryEntry::new(&id, &case.narrative, vector).with_metadata(metadata)])?;
        info!(id = %id, kind = %case.kind, validated_by = %case.validated_by, "gold case archived");
        Ok(id)
    }
}
