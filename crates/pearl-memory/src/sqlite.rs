use parking_lot::Mutex;
use pearl_core::{PearlError, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::entry::{MemoryEntry, Metadata, ScoredEntry, rank};
use crate::store::{VectorStore, check_batch, check_query};

fn store_err(e: rusqlite::Error) -> PearlError {
    PearlError::StoreUnavailable(e.to_string())
}

/// One SQLite database holding every collection in a single `entries` table.
#[derive(Clone)]
pub struct SqliteMemory {
    db: Arc<Mutex<Connection>>,
}

impl SqliteMemory {
    /// Open or create the memory database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        info!(?path, "opening memory database");
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;

        // WAL keeps readers from blocking on the writer
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(store_err)?;
        Self::init(conn)
    }

    /// A private database that disappears with the process.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS entries (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                document TEXT NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );
            CREATE INDEX IF NOT EXISTS idx_entries_collection ON entries(collection);
            ",
        )
        .map_err(store_err)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// A handle to one named collection. Collections are created lazily on
    /// first insert.
    pub fn collection(&self, name: &str) -> SqliteCollection {
        SqliteCollection {
            name: name.to_string(),
            db: self.db.clone(),
        }
    }
}

/// A named collection backed by a shared [`SqliteMemory`] connection.
pub struct SqliteCollection {
    name: String,
    db: Arc<Mutex<Connection>>,
}

impl SqliteCollection {
    fn read_metadata(conn: &Connection, collection: &str, id: &str) -> Result<Option<Metadata>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT metadata FROM entries WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        raw.map(|json| serde_json::from_str(&json).map_err(PearlError::from))
            .transpose()
    }

    fn write_metadata(conn: &Connection, collection: &str, id: &str, meta: &Metadata) -> Result<()> {
        let json = serde_json::to_string(meta)?;
        conn.execute(
            "UPDATE entries SET metadata = ?1 WHERE collection = ?2 AND id = ?3",
            params![json, collection, id],
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn load_all(&self, conn: &Connection) -> Result<Vec<MemoryEntry>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, document, embedding, metadata FROM entries
                 WHERE collection = ?1 ORDER BY rowid",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![self.name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(store_err)?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, text, blob, meta) = row.map_err(store_err)?;
            entries.push(MemoryEntry {
                id,
                text,
                vector: decode_vector(&blob),
                metadata: serde_json::from_str(&meta)?,
            });
        }
        Ok(entries)
    }

    fn stored_dimension(&self, conn: &Connection) -> Result<Option<usize>> {
        let len: Option<i64> = conn
            .query_row(
                "SELECT length(embedding) FROM entries WHERE collection = ?1 LIMIT 1",
                params![self.name],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        Ok(len.map(|bytes| bytes as usize / 4))
    }
}

impl VectorStore for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn add(&self, entries: Vec<MemoryEntry>) -> Result<()> {
        let mut conn = self.db.lock();
        let dim = self.stored_dimension(&conn)?;

        let mut existing = HashSet::new();
        for entry in &entries {
            let found = conn
                .query_row(
                    "SELECT 1 FROM entries WHERE collection = ?1 AND id = ?2",
                    params![self.name, entry.id],
                    |_| Ok(()),
                )
                .optional()
                .map_err(store_err)?;
            if found.is_some() {
                existing.insert(entry.id.clone());
            }
        }
        check_batch(&self.name, &entries, dim, |id| existing.contains(id))?;

        let now = chrono::Utc::now().to_rfc3339();
        let tx = conn.transaction().map_err(store_err)?;
        for entry in &entries {
            tx.execute(
                "INSERT INTO entries (collection, id, document, embedding, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    self.name,
                    entry.id,
                    entry.text,
                    encode_vector(&entry.vector),
                    serde_json::to_string(&entry.metadata)?,
                    now,
                ],
            )
            .map_err(store_err)?;
        }
        tx.commit().map_err(store_err)?;
        debug!(collection = %self.name, count = entries.len(), "entries stored");
        Ok(())
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let conn = self.db.lock();
        let entries = self.load_all(&conn)?;
        check_query(&self.name, vector, entries.first().map(|e| e.vector.len()))?;
        Ok(rank(vector, entries, k))
    }

    fn update_metadata(&self, id: &str, metadata: Metadata) -> Result<()> {
        let conn = self.db.lock();
        if Self::read_metadata(&conn, &self.name, id)?.is_none() {
            return Err(PearlError::not_found(&self.name, id));
        }
        Self::write_metadata(&conn, &self.name, id, &metadata)
    }

    fn update_metadata_with(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut Metadata),
    ) -> Result<Metadata> {
        let conn = self.db.lock();
        let mut meta = Self::read_metadata(&conn, &self.name, id)?
            .ok_or_else(|| PearlError::not_found(&self.name, id))?;
        apply(&mut meta);
        Self::write_metadata(&conn, &self.name, id, &meta)?;
        Ok(meta)
    }

    fn get(&self, id: &str) -> Result<Option<MemoryEntry>> {
        let conn = self.db.lock();
        let row = conn
            .query_row(
                "SELECT document, embedding, metadata FROM entries
                 WHERE collection = ?1 AND id = ?2",
                params![self.name, id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(store_err)?;
        match row {
            Some((text, blob, meta)) => Ok(Some(MemoryEntry {
                id: id.to_string(),
                text,
                vector: decode_vector(&blob),
                metadata: serde_json::from_str(&meta)?,
            })),
            None => Ok(None),
        }
    }

    fn count(&self) -> Result<usize> {
        let conn = self.db.lock();
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM entries WHERE collection = ?1",
                params![self.name],
                |row| row.get(0),
            )
            .map_err(store_err)?;
        Ok(n as usize)
    }

    fn dimension(&self) -> Result<Option<usize>> {
        let conn = self.db.lock();
        self.stored_dimension(&conn)
    }
}

fn encode_vector(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_blob_roundtrip() {
        let v = vec![0.25f32, -1.5, 3.0e-7, 0.0];
        assert_eq!(decode_vector(&encode_vector(&v)), v);
    }

    #[test]
    fn test_collections_are_isolated() {
        let db = SqliteMemory::open_in_memory().unwrap();
        let a = db.collection("triage_pearls");
        let b = db.collection("gold_standard_cases");
        a.add(vec![MemoryEntry::new("r1", "rule", vec![1.0, 0.0])]).unwrap();
        assert_eq!(a.count().unwrap(), 1);
        assert_eq!(b.count().unwrap(), 0);
        // same id is fine in a different collection
        b.add(vec![MemoryEntry::new("r1", "case", vec![0.0, 1.0, 0.0])]).unwrap();
        assert_eq!(b.dimension().unwrap(), Some(3));
    }
}
