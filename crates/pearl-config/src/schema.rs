use pearl_core::PearlError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration, mapped from `pearl.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PearlConfig {
    pub reasoning: ReasoningConfig,
    pub embedding: EmbeddingConfig,
    pub memory: MemoryConfig,
    pub learning: LearningConfig,
    pub triage: TriageConfig,
    pub vision: VisionConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub services: ServicesConfig,
}

// ── Reasoning ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Provider backend: "gemini", "openai", or "mock".
    pub provider: String,
    /// Model used for triage, vision analysis and rule synthesis.
    pub model: String,
    /// Temperature (0.0 - 2.0).
    pub temperature: f32,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".into(),
            model: "gemini-3-flash-preview".into(),
            temperature: 0.4,
            max_tokens: 8192,
            timeout_secs: 120,
        }
    }
}

// ── Embedding ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider backend: "gemini", "openai", "ollama", or "mock".
    pub provider: String,
    pub model: String,
    /// Output dimensionality. Must stay constant for an existing database.
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".into(),
            model: "text-embedding-004".into(),
            dimensions: 768,
        }
    }
}

// ── Memory ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Storage backend: "sqlite" (persistent) or "memory" (ephemeral).
    pub backend: String,
    /// Path to the SQLite database.
    pub db_path: PathBuf,
    /// Rules retrieved per triage query.
    pub rule_top_k: usize,
    /// Gold cases retrieved per triage query.
    pub case_top_k: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".into(),
            db_path: PathBuf::from("ai_memory/pearl.db"),
            rule_top_k: 5,
            case_top_k: 1,
        }
    }
}

// ── Learning ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Confidence added to a cited rule on clinician agreement.
    pub reinforcement_increment: f64,
    /// Confidence given to a freshly synthesized override rule.
    pub override_confidence: f64,
    /// If set, citations whose nearest rule is farther than this cosine
    /// distance are skipped. Unset means the nearest rule is always credited.
    pub max_citation_distance: Option<f32>,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            reinforcement_increment: 0.1,
            override_confidence: 5.0,
            max_citation_distance: None,
        }
    }
}

// ── Triage ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Total attempts (first try included) for transient model failures.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay_ms: u64,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 2000,
        }
    }
}

// ── Vision ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Phrase embedded to query visual corrections. The patient context is
    /// not used for this lookup.
    pub memory_query: String,
    /// Visual corrections retrieved per analysis.
    pub correction_top_k: usize,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            memory_query: "radiology miss".into(),
            correction_top_k: 3,
        }
    }
}

// ── Server ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address.
    pub listen: String,
    /// Enable permissive CORS (for the web frontend during development).
    pub cors: bool,
    /// Maximum request body size in bytes (image uploads are base64 JSON).
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8000".into(),
            cors: true,
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Services ───────────────────────────────────────────────────

/// API keys and endpoints for external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Base URL of a local Ollama instance.
    pub ollama_url: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            openai_api_key: None,
            ollama_url: "http://127.0.0.1:11434".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

const REASONING_PROVIDERS: [&str; 3] = ["gemini", "openai", "mock"];
const EMBEDDING_PROVIDERS: [&str; 4] = ["gemini", "openai", "ollama", "mock"];

impl PearlConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Any Error-severity issue becomes a `ConfigValidation` error naming
    /// every offending field.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, PearlError> {
        let mut warnings = Vec::new();

        // ── Providers ───
        if !REASONING_PROVIDERS.contains(&self.reasoning.provider.as_str()) {
            warnings.push(ConfigWarning {
                field: "reasoning.provider".into(),
                message: format!("unknown provider '{}'", self.reasoning.provider),
                severity: WarningSeverity::Error,
                hint: Some(format!("Supported: {}", REASONING_PROVIDERS.join(", "))),
            });
        }
        if !EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            warnings.push(ConfigWarning {
                field: "embedding.provider".into(),
                message: format!("unknown provider '{}'", self.embedding.provider),
                severity: WarningSeverity::Error,
                hint: Some(format!("Supported: {}", EMBEDDING_PROVIDERS.join(", "))),
            });
        }
        if self.reasoning.model.is_empty() {
            warnings.push(ConfigWarning {
                field: "reasoning.model".into(),
                message: "model is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'gemini-3-flash-preview'".into()),
            });
        }

        // ── Temperature ───
        if self.reasoning.temperature < 0.0 || self.reasoning.temperature > 2.0 {
            warnings.push(ConfigWarning {
                field: "reasoning.temperature".into(),
                message: format!("temperature {} is out of range", self.reasoning.temperature),
                severity: WarningSeverity::Error,
                hint: Some("Temperature must be between 0.0 and 2.0".into()),
            });
        }

        // ── Embedding dimensions ───
        if self.embedding.dimensions == 0 {
            warnings.push(ConfigWarning {
                field: "embedding.dimensions".into(),
                message: "dimensions is 0".into(),
                severity: WarningSeverity::Error,
                hint: Some("768 for text-embedding-004, 1536 for text-embedding-3-small".into()),
            });
        }

        // ── Memory ───
        let valid_backends = ["sqlite", "memory"];
        if !valid_backends.contains(&self.memory.backend.as_str()) {
            warnings.push(ConfigWarning {
                field: "memory.backend".into(),
                message: format!("unknown backend '{}'", self.memory.backend),
                severity: WarningSeverity::Error,
                hint: Some(format!("Valid values: {}", valid_backends.join(", "))),
            });
        } else if self.memory.backend == "memory" {
            warnings.push(ConfigWarning {
                field: "memory.backend".into(),
                message: "in-memory backend (learned rules are lost on restart)".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }
        if self.memory.rule_top_k == 0 {
            warnings.push(ConfigWarning {
                field: "memory.rule_top_k".into(),
                message: "rule_top_k is 0, no rules will ever be retrieved".into(),
                severity: WarningSeverity::Warning,
                hint: Some("The reference setting is 5".into()),
            });
        }

        // ── Learning ───
        if self.learning.reinforcement_increment <= 0.0 {
            warnings.push(ConfigWarning {
                field: "learning.reinforcement_increment".into(),
                message: "increment must be positive or confidence would never grow".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 0.1".into()),
            });
        }
        if self.learning.override_confidence <= 1.0 {
            warnings.push(ConfigWarning {
                field: "learning.override_confidence".into(),
                message: format!(
                    "override confidence {} does not exceed the seeded 1.0",
                    self.learning.override_confidence
                ),
                severity: WarningSeverity::Warning,
                hint: Some("Learned overrides normally start at 5.0".into()),
            });
        }
        if let Some(d) = self.learning.max_citation_distance {
            if !(0.0..=2.0).contains(&d) {
                warnings.push(ConfigWarning {
                    field: "learning.max_citation_distance".into(),
                    message: format!("distance {d} is outside the cosine range 0.0-2.0"),
                    severity: WarningSeverity::Error,
                    hint: None,
                });
            }
        }

        // ── Triage retry ───
        if self.triage.max_attempts == 0 {
            warnings.push(ConfigWarning {
                field: "triage.max_attempts".into(),
                message: "max_attempts is 0, triage would never call the model".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 3".into()),
            });
        }

        // ── API keys ───
        let needs_gemini =
            self.reasoning.provider == "gemini" || self.embedding.provider == "gemini";
        if needs_gemini && self.services.gemini_api_key.is_none() {
            warnings.push(ConfigWarning {
                field: "services.gemini_api_key".into(),
                message: "no Gemini API key configured".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set services.gemini_api_key or export GEMINI_API_KEY".into()),
            });
        }
        let needs_openai =
            self.reasoning.provider == "openai" || self.embedding.provider == "openai";
        if needs_openai && self.services.openai_api_key.is_none() {
            warnings.push(ConfigWarning {
                field: "services.openai_api_key".into(),
                message: "no OpenAI API key configured".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set services.openai_api_key or export OPENAI_API_KEY".into()),
            });
        }

        // ── Server listen address ───
        if self.server.listen.is_empty() {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "listen address is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. '127.0.0.1:8000'".into()),
            });
        } else if self.server.listen.starts_with("0.0.0.0") {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "binding to 0.0.0.0, server is accessible from all interfaces".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Put an authenticating proxy in front of it".into()),
            });
        }

        // ── Logging ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        let errors: Vec<&ConfigWarning> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .collect();

        if !errors.is_empty() {
            return Err(PearlError::ConfigValidation {
                field: errors.iter().map(|w| w.field.as_str()).collect::<Vec<_>>().join(", "),
                reason: errors.iter().map(|w| w.message.as_str()).collect::<Vec<_>>().join("; "),
            });
        }

        Ok(warnings)
    }
}
