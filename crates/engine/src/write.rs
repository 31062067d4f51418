//! Write path: `put()`, `delete()`, and the shared append machinery.
//!
//! All mutations flow through [`DB::append_log_record`]: encode, rotate the
//! active segment when the append would overflow it, write, and optionally
//! sync. The caller holds the engine write lock for the append **and** the
//! keydir update, so readers never observe one without the other.

use datafile::{encode_log_record, DataFile, LogRecord, LogRecordType, RecordPos};

use crate::batch::{record_key_with_seq, NON_TXN_SEQ_NO};
use crate::{DbInner, Error, Result, DB};

impl DB {
    /// Stores `value` under `key`, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// [`Error::KeyIsEmpty`] for an empty key, [`Error::IndexUpdateFailed`]
    /// when the keydir rejects the update, plus any append error.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::KeyIsEmpty);
        }

        let record = LogRecord {
            key: record_key_with_seq(key, NON_TXN_SEQ_NO),
            value: value.to_vec(),
            rec_type: LogRecordType::Normal,
        };

        let mut inner = self.inner.write();
        let pos = self.append_log_record(&mut inner, &record)?;
        if self.index.put(key.to_vec(), pos).is_err() {
            return Err(Error::IndexUpdateFailed);
        }
        Ok(())
    }

    /// Removes `key`. A no-op when the key is absent.
    ///
    /// Appends a tombstone record and drops the keydir entry; the dead
    /// bytes are reclaimed by the next merge.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::KeyIsEmpty);
        }

        let mut inner = self.inner.write();
        if self.index.get(key)?.is_none() {
            return Ok(());
        }

        let record = LogRecord {
            key: record_key_with_seq(key, NON_TXN_SEQ_NO),
            value: Vec::new(),
            rec_type: LogRecordType::Deleted,
        };
        self.append_log_record(&mut inner, &record)?;

        if self.index.delete(key).is_err() {
            return Err(Error::IndexUpdateFailed);
        }
        Ok(())
    }

    /// Appends one encoded record to the active segment and returns where
    /// it landed. The caller must hold the engine write lock.
    pub(crate) fn append_log_record(
        &self,
        inner: &mut DbInner,
        record: &LogRecord,
    ) -> Result<RecordPos> {
        // A fresh database has no segment until the first write.
        if inner.active_file.is_none() {
            self.set_active_data_file(inner, 0)?;
        }

        let encoded = encode_log_record(record);
        let size = encoded.len() as u64;

        let needs_rotation = inner
            .active_file
            .as_ref()
            .is_some_and(|active| active.write_off() + size > self.options.data_file_size);
        if needs_rotation {
            let active = inner.active_file.take().ok_or(Error::DataFileNotFound)?;
            // Everything already appended must be durable before the file
            // becomes read-only.
            active.sync()?;
            let next_id = active.file_id() + 1;
            inner.older_files.insert(active.file_id(), active);
            self.set_active_data_file(inner, next_id)?;
        }

        let active = inner.active_file.as_mut().ok_or(Error::DataFileNotFound)?;
        let write_off = active.write_off();
        active.write(&encoded)?;

        if self.options.sync_writes {
            active.sync()?;
        }

        Ok(RecordPos {
            file_id: active.file_id(),
            offset: write_off,
        })
    }

    /// Convenience wrapper taking the engine write lock for one append.
    pub(crate) fn append_log_record_with_lock(&self, record: &LogRecord) -> Result<RecordPos> {
        let mut inner = self.inner.write();
        self.append_log_record(&mut inner, record)
    }

    /// Opens segment `file_id` as the new active file. The caller must hold
    /// the engine write lock.
    pub(crate) fn set_active_data_file(&self, inner: &mut DbInner, file_id: u32) -> Result<()> {
        let data_file = DataFile::open(&self.options.dir_path, file_id)?;
        inner.active_file = Some(data_file);
        Ok(())
    }
}
