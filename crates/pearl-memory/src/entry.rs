use pearl_core::{CaseKind, Priority};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default confidence of a rule that carries none.
pub const DEFAULT_CONFIDENCE: f64 = 1.0;

/// A scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetaValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Float(f) => Some(*f),
            MetaValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Text(s)
    }
}

impl From<f64> for MetaValue {
    fn from(f: f64) -> Self {
        MetaValue::Float(f)
    }
}

impl From<i64> for MetaValue {
    fn from(i: i64) -> Self {
        MetaValue::Int(i)
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Bool(b)
    }
}

/// Flat scalar metadata attached to an entry.
pub type Metadata = BTreeMap<String, MetaValue>;

/// A stored text unit with its embedding and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl MemoryEntry {
    pub fn new(id: impl Into<String>, text: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            vector,
            metadata: Metadata::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Rule confidence; entries without one count as 1.0.
    pub fn confidence(&self) -> f64 {
        confidence_of(&self.metadata)
    }

    /// Rule priority; missing or unknown values read as standard.
    pub fn priority(&self) -> Priority {
        self.metadata
            .get("priority")
            .and_then(MetaValue::as_str)
            .map(Priority::parse_lenient)
            .unwrap_or_default()
    }
}

/// An entry returned from a nearest-neighbour query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub entry: MemoryEntry,
    /// Cosine distance to the query: 0.0 is identical, 2.0 is opposite.
    pub distance: f32,
}

pub fn confidence_of(metadata: &Metadata) -> f64 {
    metadata
        .get("confidence")
        .and_then(MetaValue::as_f64)
        .unwrap_or(DEFAULT_CONFIDENCE)
}

/// Metadata for a rule entry.
pub fn rule_metadata(priority: Priority, confidence: f64, author: &str) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("priority".into(), priority.as_str().into());
    meta.insert("confidence".into(), confidence.into());
    meta.insert("author".into(), author.into());
    meta
}

/// Metadata for a gold case entry.
pub fn gold_case_metadata(
    kind: CaseKind,
    validated_by: &str,
    timestamp: &str,
    scan_quality: Option<&str>,
) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("type".into(), kind.as_str().into());
    meta.insert("validated_by".into(), validated_by.into());
    meta.insert("timestamp".into(), timestamp.into());
    if let Some(q) = scan_quality {
        meta.insert("scan_quality".into(), q.into());
    }
    meta
}

/// Cosine similarity; mismatched or zero-length vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Score every candidate against `query` and keep the `k` closest, best first.
/// Ties keep insertion order.
pub(crate) fn rank<I>(query: &[f32], candidates: I, k: usize) -> Vec<ScoredEntry>
where
    I: IntoIterator<Item = MemoryEntry>,
{
    if k == 0 {
        return Vec::new();
    }
    let mut scored: Vec<ScoredEntry> = candidates
        .into_iter()
        .map(|entry| ScoredEntry {
            distance: cosine_distance(query, &entry.vector),
            entry,
        })
        .collect();
    scored.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}
