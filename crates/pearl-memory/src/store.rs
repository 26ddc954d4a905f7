use pearl_core::Result;

use crate::entry::{MemoryEntry, Metadata, ScoredEntry};

/// One named collection of embedded entries.
///
/// Implementations must keep ids unique and vector dimensions constant within
/// the collection. `add` and each metadata update are individually atomic;
/// there is no cross-entry transaction.
pub trait VectorStore: Send + Sync {
    /// Persisted collection name.
    fn name(&self) -> &str;

    /// Insert a batch. A duplicate id (existing or within the batch) or a
    /// vector of the wrong dimension rejects the whole batch.
    fn add(&self, entries: Vec<MemoryEntry>) -> Result<()>;

    /// Up to `k` entries closest to `vector`, nearest first. An empty
    /// collection yields an empty vec; a query vector whose length differs
    /// from the stored dimension is a `DimensionMismatch`.
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>>;

    /// Replace an entry's metadata wholesale. `NotFound` if the id is absent.
    fn update_metadata(&self, id: &str, metadata: Metadata) -> Result<()>;

    /// Read-modify-write an entry's metadata under the store's lock, so two
    /// concurrent updates to the same id cannot lose each other's writes.
    /// Returns the metadata as stored.
    fn update_metadata_with(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut Metadata),
    ) -> Result<Metadata>;

    fn get(&self, id: &str) -> Result<Option<MemoryEntry>>;

    fn count(&self) -> Result<usize>;

    /// Dimension fixed by the first stored vector, if any.
    fn dimension(&self) -> Result<Option<usize>>;
}

/// Validate a batch against the collection's existing ids and dimension.
/// `exists` answers whether an id is already stored.
pub(crate) fn check_batch(
    collection: &str,
    entries: &[MemoryEntry],
    existing_dim: Option<usize>,
    exists: impl Fn(&str) -> bool,
) -> Result<()> {
    let mut dim = existing_dim;
    let mut seen = std::collections::HashSet::new();
    for entry in entries {
        if exists(&entry.id) || !seen.insert(entry.id.as_str()) {
            return Err(pearl_core::PearlError::DuplicateId {
                collection: collection.to_string(),
                id: entry.id.clone(),
            });
        }
        match dim {
            Some(expected) if expected != entry.vector.len() => {
                return Err(pearl_core::PearlError::DimensionMismatch {
                    collection: collection.to_string(),
                    expected,
                    actual: entry.vector.len(),
                });
            }
            None => dim = Some(entry.vector.len()),
            _ => {}
        }
    }
    Ok(())
}

/// Reject a query vector that cannot be compared with the stored ones.
pub(crate) fn check_query(collection: &str, vector: &[f32], stored_dim: Option<usize>) -> Result<()> {
    match stored_dim {
        Some(expected) if expected != vector.len() => Err(pearl_core::PearlError::DimensionMismatch {
            collection: collection.to_string(),
            expected,
            actual: vector.len(),
        }),
        _ => Ok(()),
    }
}
