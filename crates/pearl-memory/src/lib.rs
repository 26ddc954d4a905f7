//! # pearl-memory
//!
//! Adaptive memory for clinical triage:
//!
//! - **Vector store**: three independent collections (triage rules, gold
//!   cases, visual corrections) with k-nearest-neighbour search. In-memory and
//!   SQLite backends.
//! - **Rule memory**: retrieves rules + the nearest precedent for a query and
//!   renders them with learned overrides first.
//! - **Case memory**: archives clinician-validated cases as precedents.
//! - **Visual memory**: radiology corrections for the vision path.
//! - **Seeding**: the curated rule sets a fresh database starts from.

pub mod bank;
pub mod cases;
pub mod entry;
pub mod in_memory;
pub mod rules;
pub mod seed;
pub mod sqlite;
pub mod store;
pub mod visual;

pub use bank::{BankStats, MemoryBank};
pub use cases::{CaseMemory, GoldCase};
pub use entry::{MemoryEntry, MetaValue, Metadata, ScoredEntry};
pub use in_memory::InMemoryCollection;
pub use rules::{Recall, Retrieval, RuleMemory};
pub use seed::SeedReport;
pub use sqlite::{SqliteCollection, SqliteMemory};
pub use store::VectorStore;
pub use visual::VisualMemory;
