//! Rule retrieval and context rendering.
//!
//! The rendered context always lists learned overrides before the standard
//! guidelines, and closes with the single nearest validated case.

use pearl_core::{Priority, Result};
use pearl_llm::EmbeddingProvider;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::entry::ScoredEntry;
use crate::store::VectorStore;

pub const OVERRIDES_HEADER: &str = "*** CRITICAL OVERRIDES (MUST FOLLOW) ***";
pub const GUIDELINES_HEADER: &str = "CLINICAL GUIDELINES:";
pub const PRECEDENT_HEADER: &str = "SIMILAR PAST CASE (PRECEDENT):";
pub const NO_RECORDS: &str = "No specific past records found.";
pub const RETRIEVAL_FAILED: &str = "Memory Retrieval Failed.";

/// Rules and precedent retrieved for one query, partitioned by priority.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub overrides: Vec<ScoredEntry>,
    pub standard: Vec<ScoredEntry>,
    pub precedent: Option<ScoredEntry>,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty() && self.standard.is_empty() && self.precedent.is_none()
    }

    /// Render as prompt context. Empty sections are omitted.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return NO_RECORDS.to_string();
        }
        let mut out = String::new();
        if !self.overrides.is_empty() {
            out.push_str(OVERRIDES_HEADER);
            out.push('\n');
            let lines: Vec<String> = self
                .overrides
                .iter()
                .map(|s| format!("!!! CRITICAL: {} (Learned Correction)", s.entry.text))
                .collect();
            out.push_str(&lines.join("\n"));
            out.push_str("\n\n");
        }
        if !self.standard.is_empty() {
            out.push_str(GUIDELINES_HEADER);
            out.push('\n');
            let lines: Vec<String> = self
                .standard
                .iter()
                .map(|s| format!("- {} (Conf: {:.1})", s.entry.text, s.entry.confidence()))
                .collect();
            out.push_str(&lines.join("\n"));
            out.push_str("\n\n");
        }
        if let Some(case) = &self.precedent {
            let _ = writeln!(out, "{PRECEDENT_HEADER}\n{}", case.entry.text);
        }
        out
    }
}

/// Outcome of a fail-open recall. Never an error: callers always get
/// renderable context.
#[derive(Debug, Clone)]
pub enum Recall {
    Found(Retrieval),
    NoRecords,
    /// Embedding or store failure, with the cause for logging.
    Failed(String),
}

impl Recall {
    pub fn render(&self) -> String {
        match self {
            Recall::Found(r) => r.render(),
            Recall::NoRecords => NO_RECORDS.to_string(),
            Recall::Failed(_) => RETRIEVAL_FAILED.to_string(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Recall::Failed(_))
    }
}

/// Read side of the triage memory: nearest rules plus nearest gold case.
#[derive(Clone)]
pub struct RuleMemory {
    rules: Arc<dyn VectorStore>,
    cases: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    rule_top_k: usize,
    case_top_k: usize,
}

impl RuleMemory {
    pub fn new(
        rules: Arc<dyn VectorStore>,
        cases: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            rules,
            cases,
            embedder,
            rule_top_k: 5,
            case_top_k: 1,
        }
    }

    pub fn with_limits(mut self, rule_top_k: usize, case_top_k: usize) -> Self {
        self.rule_top_k = rule_top_k;
        self.case_top_k = case_top_k;
        self
    }

    /// Nearest rules (partitioned by priority, each group nearest first) and
    /// the nearest precedent for an already-embedded query.
    pub fn retrieve(&self, query: &[f32]) -> Result<Retrieval> {
        let rules = self.rules.query(query, self.rule_top_k)?;
        let precedent = self.cases.query(query, self.case_top_k)?.into_iter().next();

        let (overrides, standard): (Vec<_>, Vec<_>) = rules
            .into_iter()
            .partition(|s| s.entry.priority() == Priority::CriticalOverride);

        debug!(
            overrides = overrides.len(),
            standard = standard.len(),
            precedent = precedent.is_some(),
            "rules retrieved"
        );
        Ok(Retrieval {
            overrides,
            standard,
            precedent,
        })
    }

    /// Embed `text` and retrieve. Failures degrade to [`Recall::Failed`].
    pub async fn recall(&self, text: &str) -> Recall {
        let vector = match self.embedder.embed_one(text).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "memory retrieval failed: embedding");
                return Recall::Failed(e.to_string());
            }
        };
        match self.retrieve(&vector) {
            Ok(r) if r.is_empty() => Recall::NoRecords,
            Ok(r) => Recall::Found(r),
            Err(e) => {
                warn!(error = %e, "memory retrieval failed: store");
                Recall::Failed(e.to_string())
            }
        }
    }
}
