use pearl_core::VisualFinding;
use pearl_llm::{Attachment, GenerationRequest, ReasoningProvider};
use pearl_memory::VisualMemory;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::json::parse_model_json;
use crate::patient::VisionContext;

/// The vision model's structured reading of a set of scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionAssessment {
    #[serde(default = "unknown")]
    pub scan_quality: String,
    #[serde(default)]
    pub agreement_with_triage: String,
    #[serde(default)]
    pub reasoning_vs_triage: String,
    #[serde(default)]
    pub visual_findings: Vec<VisualFinding>,
    #[serde(default)]
    pub critic_notes: String,
    #[serde(default)]
    pub final_radiological_diagnosis: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
}

fn unknown() -> String {
    "Unknown".into()
}

impl VisionAssessment {
    pub fn fallback(error: &str) -> Self {
        Self {
            scan_quality: "Readable".into(),
            agreement_with_triage: "Partial".into(),
            reasoning_vs_triage: format!("System Error - Showing Fallback. {error}"),
            visual_findings: vec![VisualFinding {
                structure: "Unknown".into(),
                observation: "Analysis Failed".into(),
                severity: "Unknown".into(),
            }],
            critic_notes: "Could not access memory.".into(),
            final_radiological_diagnosis: vec!["Manual Review Required".into()],
            confidence: 0.0,
        }
    }
}

/// Multimodal scan review, correlated against the triage hypothesis and the
/// doctor's verdict.
pub struct VisionService {
    provider: Arc<dyn ReasoningProvider>,
    memory: VisualMemory,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl VisionService {
    pub fn new(provider: Arc<dyn ReasoningProvider>, memory: VisualMemory, model: impl Into<String>) -> Self {
        Self {
            provider,
            memory,
            model: model.into(),
            temperature: 0.4,
            max_tokens: 8192,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Analyze `images` for the given case. Any failure yields
    /// [`VisionAssessment::fallback`].
    pub async fn analyze(&self, context: &VisionContext, images: Vec<Attachment>) -> VisionAssessment {
        let learned = self.memory.recall().await;
        let prompt = build_prompt(context, &learned);
        let image_count = images.len();
        let request = GenerationRequest::new(&self.model, prompt)
            .json()
            .with_attachments(images)
            .with_sampling(self.temperature, self.max_tokens);

        let result = match self.provider.generate(&request).await {
            Ok(generation) => parse_model_json::<VisionAssessment>(&generation.text),
            Err(e) => Err(e),
        };
        match result {
            Ok(assessment) => {
                info!(
                    images = image_count,
                    findings = assessment.visual_findings.len(),
                    confidence = assessment.confidence,
                    "scans analyzed"
                );
                assessment
            }
            Err(e) => {
                warn!(error = %e, "vision analysis failed, returning fallback");
                VisionAssessment::fallback(&e.to_string())
            }
        }
    }
}

fn build_prompt(context: &VisionContext, learned_rules: &str) -> String {
    let triage_diagnosis = context.triage_diagnosis();
    format!(
        r#"You are "Neuro-Vision," an expert AI Neuroradiologist.
You are analyzing MRI LUMBAR SPINE SCANS (Photos of films).

[CONTEXT 1: PATIENT CLINICAL HISTORY]
{summary}

[CONTEXT 2: TRIAGE BOT HYPOTHESIS (The "Requisition")]
The Triage AI (Text-Based) has already assessed this patient:
- Suspected Diagnosis: {triage_diagnosis}
- Clinical Reasoning: {triage_reasoning}
- Doctor's Feedback/Agreement: {verdict}
(INSTRUCTION: If the Doctor disagreed with the Triage Bot, prioritize the Doctor's opinion as the "True Clinical State".)

[CONTEXT 3: INSTITUTIONAL MEMORY]
{learned_rules}

[TASK: MULTIMODAL CORRELATION]
1. **Verify the Triage Hypothesis:** The Triage Bot suspected "{triage_diagnosis}". Do you see visual evidence for this?
2. **Scan for Missed Pathology:** Did the Text Bot miss something because it couldn't see? (e.g., Spondylolisthesis, Hemangioma).
3. **Deep Analysis:**
   - Scan L1 to S1.
   - Comment on Alignment, Bone Marrow, Discs, and Nerves.

[OUTPUT JSON]
{{
  "scan_quality": "Readable/Suboptimal",
  "agreement_with_triage": "Yes/No/Partial",
  "reasoning_vs_triage": "...",
  "visual_findings": [
    {{"structure": "L4-L5 Disc", "observation": "Herniation", "severity": "Severe"}}
  ],
  "critic_notes": "...",
  "final_radiological_diagnosis": ["..."],
  "confidence": 0.95
}}"#,
        summary = context.summary(),
        triage_reasoning = context.triage_reasoning(),
        verdict = context.doctor_verdict(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_shape() {
        let fb = VisionAssessment::fallback("timeout");
        assert_eq!(fb.confidence, 0.0);
        assert_eq!(fb.final_radiological_diagnosis, vec!["Manual Review Required"]);
        assert!(fb.reasoning_vs_triage.ends_with("timeout"));
    }

    #[test]
    fn test_missing_scan_quality_reads_unknown() {
        let a: VisionAssessment = serde_json::from_str(r#"{"confidence": 0.5}"#).unwrap();
        assert_eq!(a.scan_quality, "Unknown");
        assert!(a.visual_findings.is_empty());
    }
}
