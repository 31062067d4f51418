//! # Engine - DriftKV Storage Engine
//!
//! The central orchestrator that ties the [`datafile`] and [`keydir`]
//! crates into a complete Bitcask-style key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                    DB                         │
//! │                                               │
//! │ write.rs → active segment append → keydir put │
//! │              |                                │
//! │              |  (data_file_size exceeded?)    │
//! │              |            yes                 │
//! │              v                                │
//! │          rotate → older segment set           │
//! │                                               │
//! │ merge.rs → rewrite live records → <dir>-merge │
//! │              → hint file → atomic swap        │
//! │                                               │
//! │ read.rs  → keydir lookup → read at offset     │
//! │              → CRC check → value              │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module       | Purpose                                                |
//! |--------------|--------------------------------------------------------|
//! | [`lib.rs`]   | `DB` struct, `open`, `close`, `sync`, `Drop`           |
//! | [`recovery`] | Segment enumeration and keydir rebuild from the log    |
//! | [`write`]    | `put()`, `delete()`, the append path, rotation         |
//! | [`read`]     | `get()`, `list_keys()`, `fold()`                       |
//! | [`batch`]    | Atomic multi-key commits under one sequence number     |
//! | [`merge`]    | Online compaction into a side directory + atomic swap  |
//! | [`iterator`] | Ordered user-facing traversal                          |
//!
//! ## Crash Safety
//!
//! The log is the source of truth. Every mutation is appended to the active
//! segment **before** the keydir is updated; reopening replays the segments
//! (or the hint file after a merge) to rebuild the keydir. Partial records
//! at the tail read as end-of-file and are truncated away. Batch records
//! are provisional until their commit marker is on disk.

mod batch;
mod error;
mod iterator;
mod merge;
mod options;
mod read;
mod recovery;
mod write;

pub use batch::WriteBatch;
pub use error::{Error, Result};
pub use iterator::Iter;
pub use keydir::IndexType;
pub use options::{IteratorOptions, Options, WriteBatchOptions};

use datafile::{DataFile, LogRecord, LogRecordType};
use keydir::Indexer;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Key of the single record in the `seq-no` file.
pub(crate) const SEQ_NO_KEY: &[u8] = b"seq.no";

/// The storage engine. Thread-safe: wrap it in an `Arc` and share it.
///
/// # Write Path
///
/// 1. Encode the record with its sequence-prefixed key.
/// 2. Under the engine write lock, append to the active segment (rotating
///    it first when the append would overflow `data_file_size`).
/// 3. Update the keydir before releasing the lock.
///
/// # Read Path
///
/// 1. Under the engine read lock, look the key up in the keydir.
/// 2. Read the record at the stored `(file id, offset)`, verify its CRC.
/// 3. Return the value (a tombstone reads as not-found).
///
/// # Recovery
///
/// [`DB::open`] completes or discards an interrupted merge, enumerates the
/// `*.data` segments, and rebuilds the keydir — from the hint file for
/// merged segments, by full replay for the rest. The persistent-index
/// variant skips replay entirely and restores the sequence counter from
/// the `seq-no` file.
pub struct DB {
    pub(crate) options: Options,
    pub(crate) inner: RwLock<DbInner>,
    pub(crate) index: Box<dyn Indexer>,
    /// Transaction sequence counter; incremented once per batch commit.
    pub(crate) seq_no: AtomicU64,
    /// Held for the duration of a merge. `try_lock` failure means a merge
    /// is already running.
    pub(crate) merging: Mutex<()>,
    /// Whether a `seq-no` file was present at open.
    pub(crate) seq_file_exists: bool,
    /// Whether the data directory was absent or empty at open.
    pub(crate) is_initial: bool,
}

/// State guarded by the engine lock: the segment set.
pub(crate) struct DbInner {
    /// The one segment accepting appends. `None` until the first write of
    /// a fresh database.
    pub(crate) active_file: Option<DataFile>,
    /// Read-only older segments, keyed by file id.
    pub(crate) older_files: HashMap<u32, DataFile>,
}

impl DB {
    /// Opens a database directory, creating it if absent, and performs
    /// recovery.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOptions`] for a bad configuration,
    /// [`Error::InvalidCrc`] for a corrupt record met during replay,
    /// [`Error::DataDirectoryCorrupted`] for unparsable file names or
    /// record keys, plus any underlying I/O error.
    pub fn open(options: Options) -> Result<DB> {
        options::check_options(&options)?;

        let dir = options.dir_path.clone();
        let mut is_initial = false;
        if !dir.is_dir() {
            is_initial = true;
            std::fs::create_dir_all(&dir)?;
        } else if std::fs::read_dir(&dir)?.next().is_none() {
            is_initial = true;
        }

        // A finished merge left by a crash is completed here; an unfinished
        // one is discarded. Must happen before segments are enumerated.
        merge::load_merge_files(&dir)?;

        let index = keydir::new_indexer(options.index_type, &dir)?;

        let file_ids = recovery::sorted_data_file_ids(&dir)?;
        let mut active_file = None;
        let mut older_files = HashMap::new();
        for (i, &file_id) in file_ids.iter().enumerate() {
            let data_file = DataFile::open(&dir, file_id)?;
            if i == file_ids.len() - 1 {
                active_file = Some(data_file);
            } else {
                older_files.insert(file_id, data_file);
            }
        }

        let mut db = DB {
            options,
            inner: RwLock::new(DbInner {
                active_file,
                older_files,
            }),
            index,
            seq_no: AtomicU64::new(0),
            merging: Mutex::new(()),
            seq_file_exists: false,
            is_initial,
        };

        if db.options.index_type == IndexType::BPlusTree {
            // The index survived on disk; only the sequence counter needs
            // recovering, and replay would be wasted work.
            db.load_seq_no()?;
        } else {
            db.load_index_from_hint_file()?;
            db.load_index_from_data_files(&file_ids)?;
        }

        Ok(db)
    }

    /// Flushes the active segment to durable storage.
    pub fn sync(&self) -> Result<()> {
        let inner = self.inner.read();
        if let Some(active) = inner.active_file.as_ref() {
            active.sync()?;
        }
        Ok(())
    }

    /// Closes the engine: persists the sequence counter, closes the keydir
    /// and every segment file. The final sync error is propagated.
    pub fn close(&self) -> Result<()> {
        let inner = self.inner.write();

        self.index.close()?;

        // Persist the sequence counter for variants that cannot recover it
        // by replay. Written even when nothing was ever appended: a clean
        // close of an untouched database must still leave a loadable
        // counter behind.
        let mut seq_file = DataFile::seq_no_file(&self.options.dir_path)?;
        seq_file.write_record(&LogRecord {
            key: SEQ_NO_KEY.to_vec(),
            value: self.seq_no.load(Ordering::SeqCst).to_string().into_bytes(),
            rec_type: LogRecordType::Normal,
        })?;
        seq_file.sync()?;

        if let Some(active) = inner.active_file.as_ref() {
            active.sync()?;
            active.close()?;
        }
        for file in inner.older_files.values() {
            file.close()?;
        }
        Ok(())
    }
}

/// Best-effort close on drop.
///
/// Errors are ignored because `Drop` cannot propagate them; the log remains
/// the source of truth and the next open recovers from it.
impl Drop for DB {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests;
