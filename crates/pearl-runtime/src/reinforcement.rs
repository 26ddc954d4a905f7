//! Agreement path: archive the validated case, then boost the rules it cited.
//!
//! Citations are matched to stored rules by embedding similarity, not by id,
//! so a paraphrased citation still credits its nearest rule. Each citation is
//! independent; one that cannot be resolved is skipped without affecting the
//! others or the archived case.

use pearl_core::Result;
use pearl_llm::EmbeddingProvider;
use pearl_memory::entry::{MetaValue, confidence_of};
use pearl_memory::{CaseMemory, GoldCase, VectorStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::patient::VisionContext;
use crate::triage::TriageAssessment;
use crate::vision::VisionAssessment;

/// A clinician's agreement with a triage assessment.
#[derive(Debug, Clone)]
pub struct Agreement {
    pub narrative: String,
    pub cited_rules: Vec<String>,
    pub validated_by: String,
}

impl Agreement {
    pub fn new(
        full_name: &str,
        diagnoses: &[String],
        cited_rules: Vec<String>,
        validated_by: &str,
    ) -> Self {
        Self {
            narrative: format!("Case: {full_name}. Dx: {}", diagnoses.join(", ")),
            cited_rules,
            validated_by: validated_by.to_string(),
        }
    }

    pub fn from_assessment(full_name: &str, assessment: &TriageAssessment, validated_by: &str) -> Self {
        Self::new(
            full_name,
            &assessment.medical_diagnosis,
            assessment.cited_rules.clone(),
            validated_by,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoostedRule {
    pub id: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReinforcementOutcome {
    pub case_id: String,
    pub boosted: Vec<BoostedRule>,
    pub skipped: usize,
}

pub struct ReinforcementEngine {
    cases: CaseMemory,
    rules: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    increment: f64,
    max_citation_distance: Option<f32>,
}

impl ReinforcementEngine {
    pub fn new(
        cases: CaseMemory,
        rules: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            cases,
            rules,
            embedder,
            increment: 0.1,
            max_citation_distance: None,
        }
    }

    pub fn with_increment(mut self, increment: f64) -> Self {
        self.increment = increment;
        self
    }

    /// Only credit a rule whose distance to the citation is at most `max`.
    pub fn with_max_citation_distance(mut self, max: Option<f32>) -> Self {
        self.max_citation_distance = max;
        self
    }

    /// Archive the case, then reinforce each cited rule. Fails only when the
    /// case itself cannot be archived.
    pub async fn reinforce(&self, agreement: &Agreement) -> Result<ReinforcementOutcome> {
        let case_id = self
            .cases
            .archive(&GoldCase::textual(&agreement.narrative, &agreement.validated_by))
            .await?;

        let mut boosted = Vec::new();
        let mut skipped = 0;
        for citation in &agreement.cited_rules {
            match self.boost(citation).await {
                Some(rule) => boosted.push(rule),
                None => skipped += 1,
            }
        }
        info!(
            case_id = %case_id,
            boosted = boosted.len(),
            skipped,
            "memory reinforced"
        );
        Ok(ReinforcementOutcome {
            case_id,
            boosted,
            skipped,
        })
    }

    async fn boost(&self, citation: &str) -> Option<BoostedRule> {
        let vector = match self.embedder.embed_one(citation).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "citation skipped: embedding failed");
                return None;
            }
        };
        let nearest = match self.rules.query(&vector, 1) {
            Ok(hits) => hits.into_iter().next()?,
            Err(e) => {
                warn!(error = %e, "citation skipped: rule lookup failed");
                return None;
            }
        };
        if let Some(max) = self.max_citation_distance
            && nearest.distance > max
        {
            debug!(rule = %nearest.entry.id, distance = nearest.distance, "citation too far from any rule");
            return None;
        }

        let increment = self.increment;
        let updated = self.rules.update_metadata_with(&nearest.entry.id, &mut |meta| {
            let next = confidence_of(meta) + increment;
            meta.insert("confidence".into(), MetaValue::Float(next));
        });
        match updated {
            Ok(meta) => Some(BoostedRule {
                id: nearest.entry.id,
                confidence: confidence_of(&meta),
            }),
            Err(e) => {
                warn!(rule = %nearest.entry.id, error = %e, "citation skipped: update failed");
                None
            }
        }
    }

    /// Archive a radiologist-confirmed scan reading as a vision precedent.
    pub async fn archive_vision_case(
        &self,
        context: &VisionContext,
        assessment: &VisionAssessment,
        validated_by: &str,
    ) -> Result<String> {
        let findings: Vec<&str> = assessment
            .visual_findings
            .iter()
            .map(|f| f.observation.as_str())
            .collect();
        let narrative = format!(
            "VERIFIED VISUAL DIAGNOSIS:\nPatient: {}\nVisual Findings: {}.\nFinal Dx: {}.",
            context.summary(),
            findings.join(", "),
            assessment.final_radiological_diagnosis.join(", "),
        );
        self.cases
            .archive(&GoldCase::vision(narrative, validated_by, &assessment.scan_quality))
            .await
    }
}
