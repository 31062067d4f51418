//! # keydir — the in-memory key index
//!
//! Sorted mapping from user key to the on-disk location of that key's most
//! recent live record. Every read the engine serves starts here; the log is
//! only touched to materialize the value.
//!
//! Three interchangeable backends implement the same [`Indexer`] contract:
//!
//! | Variant | Backing | Notes |
//! |---|---|---|
//! | [`BTreeIndex`] | `BTreeMap` behind a `RwLock` | The default. |
//! | [`SkipListIndex`] | `crossbeam_skiplist::SkipMap` | Lock-free sorted map. |
//! | [`BptreeIndex`] | `redb` on-disk B+ tree | Survives restarts; the engine skips log replay when this variant is selected. |
//!
//! Ordering is lexicographic over raw key bytes in every variant. Iteration
//! happens over a point-in-time snapshot ([`IndexIterator`]), so concurrent
//! writes never invalidate an in-flight cursor.

mod bptree;
mod btree;
mod skiplist;

pub use bptree::{BptreeIndex, BPTREE_INDEX_FILE_NAME};
pub use btree::BTreeIndex;
pub use skiplist::SkipListIndex;

use datafile::RecordPos;
use std::path::Path;
use thiserror::Error;

/// Errors from keydir operations. In-memory variants never fail; the
/// persistent variant surfaces its storage errors here.
#[derive(Debug, Error)]
pub enum IndexError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The persistent backend reported a failure.
    #[error("index storage error: {0}")]
    Storage(#[from] redb::Error),

    /// A stored position could not be decoded.
    #[error("corrupt index entry")]
    Corrupt,
}

/// Which keydir backend the engine opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexType {
    /// Ordered in-memory tree.
    #[default]
    BTree,
    /// Concurrent in-memory skip list.
    SkipList,
    /// Persistent on-disk B+ tree.
    BPlusTree,
}

/// The keydir contract. All operations are thread-safe under the variant's
/// internal synchronization.
pub trait Indexer: Send + Sync {
    /// Insert-or-replace. Returns whether a prior entry was overwritten.
    fn put(&self, key: Vec<u8>, pos: RecordPos) -> Result<bool, IndexError>;

    /// Returns the stored location, or `None` when the key is absent.
    fn get(&self, key: &[u8]) -> Result<Option<RecordPos>, IndexError>;

    /// Removes the entry. Returns whether it existed.
    fn delete(&self, key: &[u8]) -> Result<bool, IndexError>;

    /// Current number of entries.
    fn size(&self) -> Result<usize, IndexError>;

    /// Returns a stateful cursor over a snapshot of the current entries.
    fn iterator(&self, reverse: bool) -> Result<IndexIterator, IndexError>;

    /// Releases backing resources. A no-op for in-memory variants.
    fn close(&self) -> Result<(), IndexError>;
}

/// Constructs the keydir variant selected by `index_type`.
///
/// Only [`IndexType::BPlusTree`] uses `dir_path`; the in-memory variants
/// ignore it.
pub fn new_indexer(index_type: IndexType, dir_path: &Path) -> Result<Box<dyn Indexer>, IndexError> {
    match index_type {
        IndexType::BTree => Ok(Box::new(BTreeIndex::new())),
        IndexType::SkipList => Ok(Box::new(SkipListIndex::new())),
        IndexType::BPlusTree => Ok(Box::new(BptreeIndex::open(dir_path)?)),
    }
}

/// Stateful cursor over a point-in-time snapshot of the keydir.
///
/// Entries are held in iteration order: ascending for forward cursors,
/// descending for reverse ones. `key`/`value` must only be called while
/// [`valid`](Self::valid) returns `true`.
pub struct IndexIterator {
    entries: Vec<(Vec<u8>, RecordPos)>,
    current: usize,
    reverse: bool,
}

impl IndexIterator {
    /// Builds a cursor from entries sorted in ascending key order.
    pub(crate) fn new(mut entries: Vec<(Vec<u8>, RecordPos)>, reverse: bool) -> Self {
        if reverse {
            entries.reverse();
        }
        Self {
            entries,
            current: 0,
            reverse,
        }
    }

    /// Repositions before the first entry.
    pub fn rewind(&mut self) {
        self.current = 0;
    }

    /// Positions at the first entry whose key is `>= key` (forward) or
    /// `<= key` (reverse).
    pub fn seek(&mut self, key: &[u8]) {
        self.current = if self.reverse {
            self.entries.partition_point(|(k, _)| k.as_slice() > key)
        } else {
            self.entries.partition_point(|(k, _)| k.as_slice() < key)
        };
    }

    /// Advances to the next entry.
    pub fn next(&mut self) {
        if self.current < self.entries.len() {
            self.current += 1;
        }
    }

    /// Whether the cursor currently points at an entry.
    pub fn valid(&self) -> bool {
        self.current < self.entries.len()
    }

    /// Key of the current entry. Panics when the cursor is not valid.
    pub fn key(&self) -> &[u8] {
        &self.entries[self.current].0
    }

    /// Location of the current entry. Panics when the cursor is not valid.
    pub fn value(&self) -> RecordPos {
        self.entries[self.current].1
    }

    /// Releases the snapshot.
    pub fn close(&mut self) {
        self.entries.clear();
        self.current = 0;
    }
}

#[cfg(test)]
mod tests;
