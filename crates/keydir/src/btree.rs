use datafile::RecordPos;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::{IndexError, IndexIterator, Indexer};

/// Ordered in-memory keydir backed by a [`BTreeMap`].
#[derive(Debug, Default)]
pub struct BTreeIndex {
    tree: RwLock<BTreeMap<Vec<u8>, RecordPos>>,
}

impl BTreeIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indexer for BTreeIndex {
    fn put(&self, key: Vec<u8>, pos: RecordPos) -> Result<bool, IndexError> {
        Ok(self.tree.write().insert(key, pos).is_some())
    }

    fn get(&self, key: &[u8]) -> Result<Option<RecordPos>, IndexError> {
        Ok(self.tree.read().get(key).copied())
    }

    fn delete(&self, key: &[u8]) -> Result<bool, IndexError> {
        Ok(self.tree.write().remove(key).is_some())
    }

    fn size(&self) -> Result<usize, IndexError> {
        Ok(self.tree.read().len())
    }

    fn iterator(&self, reverse: bool) -> Result<IndexIterator, IndexError> {
        let entries = self
            .tree
            .read()
            .iter()
            .map(|(key, pos)| (key.clone(), *pos))
            .collect();
        Ok(IndexIterator::new(entries, reverse))
    }

    fn close(&self) -> Result<(), IndexError> {
        Ok(())
    }
}
