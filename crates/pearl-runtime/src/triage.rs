//! The decision path: recall memory, ask the reasoning model, parse its JSON.
//!
//! `assess` never fails. Transient provider errors are retried under the
//! configured [`RetryPolicy`]; anything left over becomes a fallback assessment
//! that tells the clinician to decide manually.

use pearl_llm::{GenerationRequest, ReasoningProvider, RetryPolicy};
use pearl_memory::RuleMemory;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::json::parse_model_json;
use crate::patient::PatientData;

/// The model's structured triage answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageAssessment {
    pub scans: Vec<String>,
    pub reasoning: String,
    pub urgency: String,
    pub medical_diagnosis: Vec<String>,
    #[serde(default)]
    pub safety_override: Option<String>,
    #[serde(rename = "Additional_comments", default)]
    pub additional_comments: String,
    /// Rule texts the model says it relied on. Used for reinforcement.
    #[serde(default)]
    pub cited_rules: Vec<String>,
}

impl TriageAssessment {
    /// Placeholder returned when no real assessment could be produced.
    pub fn fallback(error: &str) -> Self {
        Self {
            scans: vec!["Clinical Judgment Required".into()],
            reasoning: "System temporarily unavailable.".into(),
            urgency: "Routine".into(),
            medical_diagnosis: vec!["System Unavailable".into()],
            safety_override: None,
            additional_comments: error.to_string(),
            cited_rules: Vec::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.medical_diagnosis.len() == 1 && self.medical_diagnosis[0] == "System Unavailable"
    }
}

pub struct TriageService {
    provider: Arc<dyn ReasoningProvider>,
    memory: RuleMemory,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl TriageService {
    pub fn new(provider: Arc<dyn ReasoningProvider>, memory: RuleMemory, model: impl Into<String>) -> Self {
        Self {
            provider,
            memory,
            model: model.into(),
            temperature: 0.4,
            max_tokens: 8192,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn assess(&self, patient: &PatientData) -> TriageAssessment {
        let summary = patient.summary();
        let context = self.memory.recall(&summary).await.render();
        let request = GenerationRequest::new(&self.model, build_prompt(&summary, &context))
            .json()
            .with_sampling(self.temperature, self.max_tokens);

        let result = self
            .retry
            .run("triage", |attempt| {
                let request = &request;
                async move {
                    let generation = self.provider.generate(request).await?;
                    info!(
                        attempt,
                        provider = self.provider.name(),
                        tokens = generation.usage.total_tokens(),
                        "triage generated"
                    );
                    parse_model_json::<TriageAssessment>(&generation.text)
                }
            })
            .await;

        match result {
            Ok(assessment) => assessment,
            Err(e) => {
                warn!(error = %e, "triage failed, returning fallback");
                TriageAssessment::fallback(&e.to_string())
            }
        }
    }
}

fn build_prompt(summary: &str, memory: &str) -> String {
    format!(
        r#"Act as a Senior Neuro-Council (Resident + Critic).
[PATIENT DATA]
{summary}
[INSTITUTIONAL MEMORY]
{memory}
[INSTRUCTION]
1. Check MEMORY first. "CRITICAL OVERRIDE" trumps all other logic.
2. Output the specific Rules you used in 'cited_rules'.
[OUTPUT JSON]
{{
  "scans": ["..."],
  "reasoning": "...",
  "urgency": "Routine/Urgent",
  "medical_diagnosis": ["..."],
  "safety_override": null,
  "Additional_comments": "...",
  "cited_rules": []
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_additional_comments_keeps_wire_name() {
        let json = serde_json::to_value(TriageAssessment::fallback("HTTP 503")).unwrap();
        assert_eq!(json["Additional_comments"], "HTTP 503");
        assert_eq!(json["scans"][0], "Clinical Judgment Required");
        assert!(json.get("additional_comments").is_none());
    }

    #[test]
    fn test_prompt_carries_memory_and_patient() {
        let prompt = build_prompt("PATIENT: 40yo Male.", "CLINICAL GUIDELINES:\n- x (Conf: 1.0)");
        assert!(prompt.contains("[PATIENT DATA]\nPATIENT: 40yo Male."));
        assert!(prompt.contains("[INSTITUTIONAL MEMORY]\nCLINICAL GUIDELINES:"));
        assert!(prompt.contains("\"Additional_comments\""));
    }
}
