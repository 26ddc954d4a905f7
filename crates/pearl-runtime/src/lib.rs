//! # pearl-runtime
//!
//! Wires memory and the two model collaborators into the services the HTTP
//! layer and CLI call:
//!
//! ```text
//!   intake ──► TriageService ──► assessment ──► clinician
//!                 ▲  recall                        │
//!                 │                    agree ──────┼────── disagree
//!            RuleMemory                  ▼                  ▼
//!                 ▲          ReinforcementEngine     LearningEngine
//!                 │            (archive + boost)    (synthesize override)
//!                 └──────────── MemoryBank ◄────────────────┘
//! ```

pub mod learning;
pub mod patient;
pub mod providers;
pub mod reinforcement;
pub mod triage;
pub mod vision;

pub(crate) mod json;

pub use learning::{LearnedRule, LearningEngine};
pub use patient::{DoctorFeedback, PatientData, TriageHypothesis, VisionContext};
pub use reinforcement::{Agreement, BoostedRule, ReinforcementEngine, ReinforcementOutcome};
pub use triage::{TriageAssessment, TriageService};
pub use vision::{VisionAssessment, VisionService};

use pearl_config::PearlConfig;
use pearl_core::Result;
use pearl_llm::{EmbeddingProvider, ReasoningProvider, RetryPolicy};
use pearl_memory::{BankStats, CaseMemory, MemoryBank, RuleMemory, VisualMemory};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Every service, shared across requests.
pub struct PearlRuntime {
    pub bank: MemoryBank,
    pub rules: RuleMemory,
    pub triage: TriageService,
    pub vision: VisionService,
    pub reinforcement: ReinforcementEngine,
    pub learning: LearningEngine,
    pub embedder: Arc<dyn EmbeddingProvider>,
    provider: Arc<dyn ReasoningProvider>,
    backend: String,
}

impl PearlRuntime {
    /// Open the configured store and build the configured providers.
    pub fn from_config(config: &PearlConfig) -> Result<Self> {
        let provider = providers::reasoning_provider(config)?;
        let embedder = providers::embedding_provider(config)?;
        let bank = MemoryBank::open(&config.memory.backend, &config.memory.db_path)?;
        info!(
            reasoning = provider.name(),
            embedding = embedder.name(),
            backend = %config.memory.backend,
            "runtime initialized"
        );
        Ok(Self::with_parts(config, bank, provider, embedder))
    }

    /// Assemble from explicit collaborators.
    pub fn with_parts(
        config: &PearlConfig,
        bank: MemoryBank,
        provider: Arc<dyn ReasoningProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let reasoning = &config.reasoning;

        let rules = RuleMemory::new(bank.rules.clone(), bank.cases.clone(), embedder.clone())
            .with_limits(config.memory.rule_top_k, config.memory.case_top_k);
        let visual = VisualMemory::new(bank.visual.clone(), embedder.clone())
            .with_query(&config.vision.memory_query, config.vision.correction_top_k);
        let cases = CaseMemory::new(bank.cases.clone(), embedder.clone());

        let triage = TriageService::new(provider.clone(), rules.clone(), &reasoning.model)
            .with_sampling(reasoning.temperature, reasoning.max_tokens)
            .with_retry(RetryPolicy::new(
                config.triage.max_attempts,
                Duration::from_millis(config.triage.retry_delay_ms),
            ));
        let vision = VisionService::new(provider.clone(), visual.clone(), &reasoning.model)
            .with_sampling(reasoning.temperature, reasoning.max_tokens);
        let reinforcement = ReinforcementEngine::new(cases, bank.rules.clone(), embedder.clone())
            .with_increment(config.learning.reinforcement_increment)
            .with_max_citation_distance(config.learning.max_citation_distance);
        let learning = LearningEngine::new(
            provider.clone(),
            &reasoning.model,
            bank.rules.clone(),
            embedder.clone(),
            visual,
        )
        .with_override_confidence(config.learning.override_confidence);

        Self {
            bank,
            rules,
            triage,
            vision,
            reinforcement,
            learning,
            embedder,
            provider,
            backend: config.memory.backend.clone(),
        }
    }

    /// Rebuild the services from a new config, keeping the open store and
    /// the existing providers. Backend and provider changes need a restart.
    pub fn reconfigured(&self, config: &PearlConfig) -> Self {
        let mut rt = Self::with_parts(
            config,
            self.bank.clone(),
            self.provider.clone(),
            self.embedder.clone(),
        );
        rt.backend = self.backend.clone();
        rt
    }

    pub fn stats(&self) -> Result<BankStats> {
        self.bank.stats(&self.backend)
    }
}
