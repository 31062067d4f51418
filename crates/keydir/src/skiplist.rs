use crossbeam_skiplist::SkipMap;
use datafile::RecordPos;

use crate::{IndexError, IndexIterator, Indexer};

/// Concurrent in-memory keydir backed by a lock-free skip list.
///
/// Same contract as [`BTreeIndex`](crate::BTreeIndex); readers and writers
/// never block each other.
#[derive(Debug, Default)]
pub struct SkipListIndex {
    map: SkipMap<Vec<u8>, RecordPos>,
}

impl SkipListIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indexer for SkipListIndex {
    fn put(&self, key: Vec<u8>, pos: RecordPos) -> Result<bool, IndexError> {
        let existed = self.map.contains_key(&key);
        self.map.insert(key, pos);
        Ok(existed)
    }

    fn get(&self, key: &[u8]) -> Result<Option<RecordPos>, IndexError> {
        Ok(self.map.get(key).map(|entry| *entry.value()))
    }

    fn delete(&self, key: &[u8]) -> Result<bool, IndexError> {
        Ok(self.map.remove(key).is_some())
    }

    fn size(&self) -> Result<usize, IndexError> {
        Ok(self.map.len())
    }

    fn iterator(&self, reverse: bool) -> Result<IndexIterator, IndexError> {
        let entries = self
            .map
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        Ok(IndexIterator::new(entries, reverse))
    }

    fn close(&self) -> Result<(), IndexError> {
        Ok(())
    }
}
