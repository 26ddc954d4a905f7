use thiserror::Error;

/// Unified error type for the Pearl workspace.
#[derive(Error, Debug)]
pub enum PearlError {
    // ── Provider errors ────────────────────────────────────────
    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("provider rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    // ── Store errors ───────────────────────────────────────────
    #[error("entry not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("duplicate entry id: {collection}/{id}")]
    DuplicateId { collection: String, id: String },

    #[error("vector dimension mismatch in {collection}: expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PearlError {
    /// Whether the error is a timeout / overload / rate limit that a bounded
    /// retry may clear.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PearlError::Transient(_) | PearlError::RateLimited { .. }
        )
    }

    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        PearlError::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PearlError>;
