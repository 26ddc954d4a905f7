use pearl_core::{CollectionKind, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::in_memory::InMemoryCollection;
use crate::sqlite::SqliteMemory;
use crate::store::VectorStore;

/// The three independent collections the system reads and writes.
#[derive(Clone)]
pub struct MemoryBank {
    pub rules: Arc<dyn VectorStore>,
    pub cases: Arc<dyn VectorStore>,
    pub visual: Arc<dyn VectorStore>,
}

/// Entry counts per collection.
#[derive(Debug, Clone, Serialize)]
pub struct BankStats {
    pub backend: String,
    pub triage_pearls: usize,
    pub gold_standard_cases: usize,
    pub visual_corrections: usize,
}

impl MemoryBank {
    pub fn in_memory() -> Self {
        Self {
            rules: Arc::new(InMemoryCollection::new(CollectionKind::TriageRules.name())),
            cases: Arc::new(InMemoryCollection::new(CollectionKind::GoldCases.name())),
            visual: Arc::new(InMemoryCollection::new(
                CollectionKind::VisualCorrections.name(),
            )),
        }
    }

    /// All three collections in one SQLite file.
    pub fn sqlite(path: &Path) -> Result<Self> {
        let db = SqliteMemory::open(path)?;
        Ok(Self::from_sqlite(&db))
    }

    pub fn from_sqlite(db: &SqliteMemory) -> Self {
        Self {
            rules: Arc::new(db.collection(CollectionKind::TriageRules.name())),
            cases: Arc::new(db.collection(CollectionKind::GoldCases.name())),
            visual: Arc::new(db.collection(CollectionKind::VisualCorrections.name())),
        }
    }

    /// Open the backend named in config: `"sqlite"` or `"memory"`.
    pub fn open(backend: &str, db_path: &Path) -> Result<Self> {
        match backend {
            "memory" => Ok(Self::in_memory()),
            "sqlite" => Self::sqlite(db_path),
            other => Err(pearl_core::PearlError::Config(format!(
                "unknown memory backend: {other}"
            ))),
        }
    }

    pub fn collection(&self, kind: CollectionKind) -> &Arc<dyn VectorStore> {
        match kind {
            CollectionKind::TriageRules => &self.rules,
            CollectionKind::GoldCases => &self.cases,
            CollectionKind::VisualCorrections => &self.visual,
        }
    }

    pub fn stats(&self, backend: &str) -> Result<BankStats> {
        Ok(BankStats {
            backend: backend.to_string(),
            triage_pearls: self.rules.count()?,
            gold_standard_cases: self.cases.count()?,
            visual_corrections: self.visual.count()?,
        })
    }
}
