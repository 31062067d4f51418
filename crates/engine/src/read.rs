//! Read path: `get()`, `list_keys()`, and `fold()`.
//!
//! Reads hold the engine read lock across the keydir lookup and the segment
//! read, so a concurrent merge swap can never pull a file out from under
//! them.

use datafile::{LogRecordType, RecordPos};

use crate::{DbInner, Error, Result, DB};

impl DB {
    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] when the key has no live record,
    /// [`Error::DataFileNotFound`] when the keydir references a segment
    /// that no longer resolves.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        if key.is_empty() {
            return Err(Error::KeyIsEmpty);
        }

        let inner = self.inner.read();
        let pos = self.index.get(key)?.ok_or(Error::KeyNotFound)?;
        self.read_at(&inner, pos)
    }

    /// Materializes the value stored at `pos`. The caller must hold the
    /// engine lock (read or write).
    pub(crate) fn read_at(&self, inner: &DbInner, pos: RecordPos) -> Result<Vec<u8>> {
        let data_file = match inner.active_file.as_ref() {
            Some(active) if active.file_id() == pos.file_id => active,
            _ => inner
                .older_files
                .get(&pos.file_id)
                .ok_or(Error::DataFileNotFound)?,
        };

        let (record, _) = data_file
            .read_record(pos.offset)?
            .ok_or(Error::DataDirectoryCorrupted)?;

        // A stale pointer at a tombstone can only exist transiently during
        // crash recovery, never in steady state.
        if record.rec_type == LogRecordType::Deleted {
            return Err(Error::KeyNotFound);
        }
        Ok(record.value)
    }

    /// Snapshot of every live key, in keydir order.
    pub fn list_keys(&self) -> Result<Vec<Vec<u8>>> {
        let mut iter = self.index.iterator(false)?;
        let mut keys = Vec::with_capacity(self.index.size()?);
        iter.rewind();
        while iter.valid() {
            keys.push(iter.key().to_vec());
            iter.next();
        }
        Ok(keys)
    }

    /// Calls `f` for every live key-value pair in ascending key order,
    /// stopping early when `f` returns `false`.
    ///
    /// Values are materialized on demand; the engine read lock is held for
    /// the whole traversal.
    pub fn fold<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], Vec<u8>) -> bool,
    {
        let inner = self.inner.read();
        let mut iter = self.index.iterator(false)?;
        iter.rewind();
        while iter.valid() {
            let value = self.read_at(&inner, iter.value())?;
            if !f(iter.key(), value) {
                break;
            }
            iter.next();
        }
        Ok(())
    }
}
