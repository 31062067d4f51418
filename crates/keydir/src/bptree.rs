use datafile::{decode_record_pos, encode_record_pos, RecordPos};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

use crate::{IndexError, IndexIterator, Indexer};

/// The single table holding `user key -> encoded position`.
const KEYDIR_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("keydir");

/// File name of the on-disk index inside the data directory.
pub const BPTREE_INDEX_FILE_NAME: &str = "bptree-index";

/// Persistent keydir backed by an on-disk B+ tree.
///
/// Unlike the in-memory variants this index survives restarts, so the
/// engine skips log replay when it is selected and recovers the sequence
/// counter from the `seq-no` file instead. Every update commits its own
/// transaction; durability is the backend's, not the log's.
pub struct BptreeIndex {
    db: Database,
}

impl BptreeIndex {
    /// Opens (or creates) the index file inside `dir_path`.
    pub fn open(dir_path: &Path) -> Result<Self, IndexError> {
        let db = Database::create(dir_path.join(BPTREE_INDEX_FILE_NAME))
            .map_err(redb::Error::from)?;

        // Create the table up front so readers never race its existence.
        let txn = db.begin_write().map_err(redb::Error::from)?;
        txn.open_table(KEYDIR_TABLE).map_err(redb::Error::from)?;
        txn.commit().map_err(redb::Error::from)?;

        Ok(Self { db })
    }
}

impl Indexer for BptreeIndex {
    fn put(&self, key: Vec<u8>, pos: RecordPos) -> Result<bool, IndexError> {
        let value = encode_record_pos(pos);
        let txn = self.db.begin_write().map_err(redb::Error::from)?;
        let existed;
        {
            let mut table = txn.open_table(KEYDIR_TABLE).map_err(redb::Error::from)?;
            existed = table
                .insert(key.as_slice(), value.as_slice())
                .map_err(redb::Error::from)?
                .is_some();
        }
        txn.commit().map_err(redb::Error::from)?;
        Ok(existed)
    }

    fn get(&self, key: &[u8]) -> Result<Option<RecordPos>, IndexError> {
        let txn = self.db.begin_read().map_err(redb::Error::from)?;
        let table = txn.open_table(KEYDIR_TABLE).map_err(redb::Error::from)?;
        match table.get(key).map_err(redb::Error::from)? {
            Some(guard) => {
                let pos = decode_record_pos(guard.value()).ok_or(IndexError::Corrupt)?;
                Ok(Some(pos))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, key: &[u8]) -> Result<bool, IndexError> {
        let txn = self.db.begin_write().map_err(redb::Error::from)?;
        let existed;
        {
            let mut table = txn.open_table(KEYDIR_TABLE).map_err(redb::Error::from)?;
            existed = table.remove(key).map_err(redb::Error::from)?.is_some();
        }
        txn.commit().map_err(redb::Error::from)?;
        Ok(existed)
    }

    fn size(&self) -> Result<usize, IndexError> {
        let txn = self.db.begin_read().map_err(redb::Error::from)?;
        let table = txn.open_table(KEYDIR_TABLE).map_err(redb::Error::from)?;
        Ok(table.len().map_err(redb::Error::from)? as usize)
    }

    fn iterator(&self, reverse: bool) -> Result<IndexIterator, IndexError> {
        let txn = self.db.begin_read().map_err(redb::Error::from)?;
        let table = txn.open_table(KEYDIR_TABLE).map_err(redb::Error::from)?;
        let mut entries = Vec::new();
        for item in table.range::<&[u8]>(..).map_err(redb::Error::from)? {
            let (key, value) = item.map_err(redb::Error::from)?;
            let pos = decode_record_pos(value.value()).ok_or(IndexError::Corrupt)?;
            entries.push((key.value().to_vec(), pos));
        }
        Ok(IndexIterator::new(entries, reverse))
    }

    fn close(&self) -> Result<(), IndexError> {
        // Every update committed its own transaction; nothing is buffered.
        // The file handle is released when the index is dropped.
        Ok(())
    }
}
