//! Inbound case data as the clinic front-end sends it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Intake record for the triage path. Sections are free-form key/value maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientData {
    #[serde(default)]
    pub details: Map<String, Value>,
    #[serde(default)]
    pub medical_history: Map<String, Value>,
    #[serde(default)]
    pub examination: Map<String, Value>,
    #[serde(default)]
    pub expectations: Map<String, Value>,
    #[serde(default)]
    pub assistant_input: Map<String, Value>,
}

impl PatientData {
    /// The short summary used both as the memory query and in the prompt.
    pub fn summary(&self) -> String {
        format!(
            "PATIENT: {}yo {}.\nCOMPLAINT: {}.\nHISTORY: {}.",
            field(&self.details, "age"),
            field(&self.details, "gender"),
            field(&self.medical_history, "chiefComplaint"),
            field(&self.medical_history, "historyDuration"),
        )
    }
}

/// Context accompanying a scan upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionContext {
    #[serde(default)]
    pub age: Value,
    #[serde(default)]
    pub gender: Value,
    #[serde(default)]
    pub chief_complaint: Value,
    #[serde(default)]
    pub ai_triage_response: Option<TriageHypothesis>,
    #[serde(default)]
    pub doctor_feedback: Option<DoctorFeedback>,
}

/// The parts of an earlier triage answer the vision prompt cares about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriageHypothesis {
    #[serde(default)]
    pub medical_diagnosis: Vec<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorFeedback {
    #[serde(default)]
    pub corrected_diagnosis: String,
    #[serde(default)]
    pub correction_reason: String,
}

impl VisionContext {
    pub fn summary(&self) -> String {
        format!(
            "{}yo {}. {}.",
            display(&self.age),
            display(&self.gender),
            display(&self.chief_complaint)
        )
    }

    pub fn triage_diagnosis(&self) -> String {
        match &self.ai_triage_response {
            Some(t) if !t.medical_diagnosis.is_empty() => t.medical_diagnosis.join(", "),
            _ => "Unknown".to_string(),
        }
    }

    pub fn triage_reasoning(&self) -> &str {
        self.ai_triage_response
            .as_ref()
            .and_then(|t| t.reasoning.as_deref())
            .unwrap_or("No reasoning provided.")
    }

    pub fn doctor_verdict(&self) -> String {
        match &self.doctor_feedback {
            Some(f) => format!(
                "Doctor Disagreed. Correction: {}. Reason: {}",
                f.corrected_diagnosis, f.correction_reason
            ),
            None => "Doctor Agreed with Triage Assessment.".to_string(),
        }
    }
}

fn field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key).map(display).unwrap_or_else(|| "Unknown".into())
}

/// Strings print bare, null prints as "Unknown", anything else as JSON.
pub(crate) fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "Unknown".into(),
        other => other.to_string(),
    }
}
