//! Atomic multi-key write batches.
//!
//! A batch buffers puts and deletes in memory; nothing touches disk until
//! `commit`. The commit appends every record under a single fresh sequence
//! number and terminates with a `TxnFinished` marker — the marker's
//! presence on disk is the atomic switch. Replay treats records as
//! provisional until it sees their marker, so a crash mid-commit loses the
//! whole batch and never part of it.

use datafile::{put_uvarint, read_uvarint, LogRecord, LogRecordType, RecordPos};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::Ordering;

use crate::{Error, IndexType, Result, WriteBatchOptions, DB};

/// Sequence number reserved for writes outside any batch.
pub(crate) const NON_TXN_SEQ_NO: u64 = 0;

/// Key of the commit-marker record (with its sequence prefix).
pub(crate) const TXN_FIN_KEY: &[u8] = b"txn-fin";

/// A buffered set of writes committed atomically under one sequence number.
///
/// Last write wins within the batch: a `put` followed by a `delete` of the
/// same key commits only the delete.
pub struct WriteBatch<'a> {
    db: &'a DB,
    options: WriteBatchOptions,
    pending: Mutex<HashMap<Vec<u8>, LogRecord>>,
}

impl DB {
    /// Creates an empty write batch against this engine.
    ///
    /// # Errors
    ///
    /// [`Error::SeqNoFileNotFound`] when the persistent-index variant has
    /// no recoverable sequence counter (no `seq-no` file and the directory
    /// was not freshly created) — committing would reuse sequence numbers.
    pub fn new_write_batch(&self, options: WriteBatchOptions) -> Result<WriteBatch<'_>> {
        if self.options.index_type == IndexType::BPlusTree
            && !self.seq_file_exists
            && !self.is_initial
        {
            return Err(Error::SeqNoFileNotFound);
        }
        Ok(WriteBatch {
            db: self,
            options,
            pending: Mutex::new(HashMap::new()),
        })
    }
}

impl WriteBatch<'_> {
    /// Buffers a put. No disk activity until [`commit`](Self::commit).
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::KeyIsEmpty);
        }
        self.pending.lock().insert(
            key.to_vec(),
            LogRecord {
                key: key.to_vec(),
                value: value.to_vec(),
                rec_type: LogRecordType::Normal,
            },
        );
        Ok(())
    }

    /// Buffers a delete. No disk activity until [`commit`](Self::commit).
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::KeyIsEmpty);
        }
        self.pending.lock().insert(
            key.to_vec(),
            LogRecord {
                key: key.to_vec(),
                value: Vec::new(),
                rec_type: LogRecordType::Deleted,
            },
        );
        Ok(())
    }

    /// Number of pending records.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Commits every buffered operation atomically.
    ///
    /// The engine write lock is held for the whole commit: rotations may
    /// happen mid-batch, but no other writer can interleave records into
    /// the sequence.
    ///
    /// # Errors
    ///
    /// [`Error::ExceedMaxBatchNum`] when the buffer exceeds
    /// `max_batch_size`; the batch is left intact so the caller can split
    /// it. Append errors leave orphan records that the next replay
    /// discards.
    pub fn commit(&self) -> Result<()> {
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return Ok(());
        }
        if pending.len() > self.options.max_batch_size {
            return Err(Error::ExceedMaxBatchNum);
        }

        let mut inner = self.db.inner.write();
        let seq_no = self.db.seq_no.fetch_add(1, Ordering::SeqCst) + 1;

        let mut positions: HashMap<Vec<u8>, RecordPos> = HashMap::with_capacity(pending.len());
        for (key, record) in pending.iter() {
            let pos = self.db.append_log_record(
                &mut inner,
                &LogRecord {
                    key: record_key_with_seq(key, seq_no),
                    value: record.value.clone(),
                    rec_type: record.rec_type,
                },
            )?;
            positions.insert(key.clone(), pos);
        }

        // The commit point: once this marker is on disk the batch is
        // visible to replay.
        self.db.append_log_record(
            &mut inner,
            &LogRecord {
                key: record_key_with_seq(TXN_FIN_KEY, seq_no),
                value: Vec::new(),
                rec_type: LogRecordType::TxnFinished,
            },
        )?;

        if self.options.sync_on_commit || self.db.options.sync_writes {
            if let Some(active) = inner.active_file.as_ref() {
                active.sync()?;
            }
        }

        for (key, record) in pending.iter() {
            let applied = match record.rec_type {
                LogRecordType::Normal => {
                    let pos = positions.get(key).copied().ok_or(Error::IndexUpdateFailed)?;
                    self.db.index.put(key.clone(), pos).map(|_| ())
                }
                LogRecordType::Deleted => self.db.index.delete(key).map(|_| ()),
                LogRecordType::TxnFinished => Ok(()),
            };
            if applied.is_err() {
                return Err(Error::IndexUpdateFailed);
            }
        }

        pending.clear();
        Ok(())
    }
}

/// Prefixes `key` with the unsigned-varint encoding of `seq_no`.
pub(crate) fn record_key_with_seq(key: &[u8], seq_no: u64) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(key.len() + 10);
    put_uvarint(&mut encoded, seq_no);
    encoded.extend_from_slice(key);
    encoded
}

/// Splits an on-disk key back into `(user key, sequence number)`.
pub(crate) fn parse_record_key(key: &[u8]) -> Result<(Vec<u8>, u64)> {
    let (seq_no, n) = read_uvarint(key).ok_or(Error::DataDirectoryCorrupted)?;
    Ok((key[n..].to_vec(), seq_no))
}
