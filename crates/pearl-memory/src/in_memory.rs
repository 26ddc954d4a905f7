use parking_lot::RwLock;
use pearl_core::{PearlError, Result};
use std::collections::HashMap;

use crate::entry::{MemoryEntry, Metadata, ScoredEntry, rank};
use crate::store::{VectorStore, check_batch, check_query};

/// Ephemeral collection held entirely in process memory.
pub struct InMemoryCollection {
    name: String,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Insertion order, so ties in distance resolve deterministically.
    entries: Vec<MemoryEntry>,
    index: HashMap<String, usize>,
}

impl InMemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl VectorStore for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn add(&self, entries: Vec<MemoryEntry>) -> Result<()> {
        let mut inner = self.inner.write();
        let dim = inner.entries.first().map(|e| e.vector.len());
        check_batch(&self.name, &entries, dim, |id| inner.index.contains_key(id))?;
        for entry in entries {
            let pos = inner.entries.len();
            inner.index.insert(entry.id.clone(), pos);
            inner.entries.push(entry);
        }
        Ok(())
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        let inner = self.inner.read();
        check_query(&self.name, vector, inner.entries.first().map(|e| e.vector.len()))?;
        Ok(rank(vector, inner.entries.iter().cloned(), k))
    }

    fn update_metadata(&self, id: &str, metadata: Metadata) -> Result<()> {
        let mut metadata = Some(metadata);
        self.update_metadata_with(id, &mut |meta| {
            if let Some(m) = metadata.take() {
                *meta = m;
            }
        })
        .map(|_| ())
    }

    fn update_metadata_with(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut Metadata),
    ) -> Result<Metadata> {
        let mut inner = self.inner.write();
        let pos = *inner
            .index
            .get(id)
            .ok_or_else(|| PearlError::not_found(&self.name, id))?;
        let entry = &mut inner.entries[pos];
        apply(&mut entry.metadata);
        Ok(entry.metadata.clone())
    }

    fn get(&self, id: &str) -> Result<Option<MemoryEntry>> {
        let inner = self.inner.read();
        Ok(inner.index.get(id).map(|&pos| inner.entries[pos].clone()))
    }

    fn count(&self) -> Result<usize> {
        Ok(self.inner.read().entries.len())
    }

    fn dimension(&self) -> Result<Option<usize>> {
        Ok(self.inner.read().entries.first().map(|e| e.vector.len()))
    }
}
