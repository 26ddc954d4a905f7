use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three independent memory namespaces. Entries never move between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Text triage rules, seeded and learned from disagreements.
    TriageRules,
    /// Clinician-validated cases, both textual and visual.
    GoldCases,
    /// Radiology rules learned from scan disagreements.
    VisualCorrections,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 3] = [
        CollectionKind::TriageRules,
        CollectionKind::GoldCases,
        CollectionKind::VisualCorrections,
    ];

    /// Persisted collection name.
    pub fn name(&self) -> &'static str {
        match self {
            CollectionKind::TriageRules => "triage_pearls",
            CollectionKind::GoldCases => "gold_standard_cases",
            CollectionKind::VisualCorrections => "visual_corrections",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Priority class of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Standard,
    /// Learned correction that always renders ahead of standard rules.
    CriticalOverride,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Standard => "standard",
            Priority::CriticalOverride => "critical_override",
        }
    }

    /// Lenient parse: case-insensitive, anything unrecognised is `Standard`.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Priority::Standard),
            "critical_override" => Ok(Priority::CriticalOverride),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of validated decision a gold case records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseKind {
    TextualPrecedent,
    VisionPrecedent,
}

impl CaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseKind::TextualPrecedent => "textual_precedent",
            CaseKind::VisionPrecedent => "vision_precedent",
        }
    }
}

impl fmt::Display for CaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured finding reported by the vision model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualFinding {
    pub structure: String,
    pub observation: String,
    pub severity: String,
}
