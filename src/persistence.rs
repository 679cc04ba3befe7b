//! Block storage for bundchain
//!
//! Blocks are stored in their wire form so a node can replay its chain at
//! startup and hand the same bytes to peers that ask for them.

use crate::blockchain::BlockData;
use crate::error::ChainError;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Abstraction for block storage backends.
pub trait Persistence: Send + Sync {
    /// Stores a block; writing the same number again replaces it.
    fn write(&self, block: &BlockData) -> Result<(), ChainError>;
    fn get_block(&self, number: u64) -> Result<Option<BlockData>, ChainError>;
    /// Every stored block in ascending number order.
    fn blocks(&self) -> Result<Vec<BlockData>, ChainError>;
    fn reset(&self) -> Result<(), ChainError>;
    fn close(&self) -> Result<(), ChainError>;
}

pub struct Database {
    conn: Mutex<Option<Connection>>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, ChainError> {
        let conn = Connection::open(path)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blocks (
                number INTEGER PRIMARY KEY,
                hash TEXT NOT NULL,
                data TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to create blocks table: {}", e)))?;

        Ok(Database {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, ChainError>,
    ) -> Result<T, ChainError> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| ChainError::DatabaseError("Database is closed".to_string()))?;
        f(conn)
    }
}

fn decode(json: &str) -> Result<BlockData, ChainError> {
    serde_json::from_str(json)
        .map_err(|e| ChainError::DatabaseError(format!("Failed to deserialize block: {}", e)))
}

impl Persistence for Database {
    fn write(&self, block: &BlockData) -> Result<(), ChainError> {
        let data = serde_json::to_string(block)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to serialize block: {}", e)))?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO blocks (number, hash, data) VALUES (?1, ?2, ?3)",
                params![block.header.number as i64, hex::encode(block.hash), data],
            )
            .map_err(|e| ChainError::DatabaseError(format!("Failed to save block: {}", e)))?;
            Ok(())
        })
    }

    fn get_block(&self, number: u64) -> Result<Option<BlockData>, ChainError> {
        let json: Option<String> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT data FROM blocks WHERE number = ?1",
                params![number as i64],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to load block: {}", e)))
        })?;

        json.as_deref().map(decode).transpose()
    }

    fn blocks(&self) -> Result<Vec<BlockData>, ChainError> {
        let rows: Vec<String> = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT data FROM blocks ORDER BY number ASC")
                .map_err(|e| ChainError::DatabaseError(format!("Failed to prepare query: {}", e)))?;

            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| ChainError::DatabaseError(format!("Failed to query blocks: {}", e)))?;

            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| ChainError::DatabaseError(format!("Failed to read row: {}", e)))
        })?;

        rows.iter().map(|json| decode(json)).collect()
    }

    fn reset(&self) -> Result<(), ChainError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM blocks", [])
                .map_err(|e| ChainError::DatabaseError(format!("Failed to clear blocks: {}", e)))?;
            Ok(())
        })
    }

    fn close(&self) -> Result<(), ChainError> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;

        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| {
                ChainError::DatabaseError(format!("Failed to close database: {}", e))
            })?;
        }
        Ok(())
    }
}

/// Keeps blocks in memory only; used by tests and throwaway nodes.
#[derive(Default)]
pub struct InMemoryPersistence {
    blocks: Mutex<BTreeMap<u64, BlockData>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<u64, BlockData>>, ChainError> {
        self.blocks
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))
    }
}

impl Persistence for InMemoryPersistence {
    fn write(&self, block: &BlockData) -> Result<(), ChainError> {
        self.lock()?.insert(block.header.number, block.clone());
        Ok(())
    }

    fn get_block(&self, number: u64) -> Result<Option<BlockData>, ChainError> {
        Ok(self.lock()?.get(&number).cloned())
    }

    fn blocks(&self) -> Result<Vec<BlockData>, ChainError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn reset(&self) -> Result<(), ChainError> {
        self.lock()?.clear();
        Ok(())
    }

    fn close(&self) -> Result<(), ChainError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::BlockHeader;
    use tempfile::NamedTempFile;

    fn block(number: u64) -> BlockData {
        BlockData {
            hash: [number as u8; 32],
            header: BlockHeader {
                number,
                ..Default::default()
            },
            trans: vec![],
        }
    }

    fn check_backend(store: &dyn Persistence) {
        store.write(&block(2)).unwrap();
        store.write(&block(1)).unwrap();
        store.write(&block(3)).unwrap();

        let numbers: Vec<u64> = store.blocks().unwrap().iter().map(|b| b.header.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        assert_eq!(store.get_block(2).unwrap(), Some(block(2)));
        assert_eq!(store.get_block(9).unwrap(), None);

        store.reset().unwrap();
        assert!(store.blocks().unwrap().is_empty());
    }

    #[test]
    fn test_sqlite_database() {
        let file = NamedTempFile::new().unwrap();
        let db = Database::open(file.path().to_str().unwrap()).unwrap();
        check_backend(&db);
    }

    #[test]
    fn test_in_memory() {
        check_backend(&InMemoryPersistence::new());
    }

    #[test]
    fn test_blocks_survive_reopen() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let db = Database::open(&path).unwrap();
        db.write(&block(1)).unwrap();
        db.close().unwrap();
        assert!(db.blocks().is_err());

        let db = Database::open(&path).unwrap();
        assert_eq!(db.blocks().unwrap(), vec![block(1)]);
    }
}
