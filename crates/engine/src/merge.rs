//! Online merge: compaction of superseded records.
//!
//! Merge rewrites only the live records of the older segments into a side
//! directory (`<dir>-merge`), together with a hint file mapping every live
//! key to its new position. A `merge-finished` marker records the first
//! file id *not* covered by the merge; writing it is the commit point.
//! The rewritten files are then swapped into the data directory under the
//! engine write lock and the keydir is repointed from the hint file.
//!
//! Writers are never blocked: the active segment is rotated out at the
//! start, so every write made during the merge lands in a segment at or
//! above the watermark and survives the swap untouched.
//!
//! If the process dies mid-merge, [`load_merge_files`] either completes the
//! swap (marker present) or discards the side directory (marker absent) on
//! the next open.

use datafile::{
    DataFile, LogRecord, LogRecordType, DATA_FILE_SUFFIX, HINT_FILE_NAME,
    MERGE_FINISHED_FILE_NAME,
};
use std::path::{Path, PathBuf};

use crate::batch::{parse_record_key, record_key_with_seq, NON_TXN_SEQ_NO};
use crate::{Error, IndexType, Options, Result, DB};

/// Appended to the data directory's path to form the side directory.
const MERGE_DIR_SUFFIX: &str = "-merge";

/// Key of the single record in the `merge-finished` file.
const MERGE_FINISHED_KEY: &[u8] = b"merge.finished";

/// `<dir>-merge`, the transient sibling directory merge writes into.
fn merge_dir_path(dir: &Path) -> PathBuf {
    let mut path = dir.as_os_str().to_os_string();
    path.push(MERGE_DIR_SUFFIX);
    PathBuf::from(path)
}

impl DB {
    /// Compacts all older segments, reclaiming the space of overwritten and
    /// deleted records.
    ///
    /// The engine keeps serving reads and writes throughout; only the brief
    /// initial rotation and the final swap take the engine write lock.
    ///
    /// # Errors
    ///
    /// [`Error::MergeInProgress`] when another merge is running. I/O errors
    /// before the swap leave the data directory untouched.
    pub fn merge(&self) -> Result<()> {
        let Some(_merge_guard) = self.merging.try_lock() else {
            return Err(Error::MergeInProgress);
        };

        // Rotate the active segment out so it becomes mergeable and all
        // concurrent writes land above the watermark.
        let (merge_ids, non_merge_file_id) = {
            let mut inner = self.inner.write();
            if inner.active_file.is_none() {
                return Ok(());
            }
            let active = inner.active_file.take().ok_or(Error::DataFileNotFound)?;
            active.sync()?;
            let rotated_id = active.file_id();
            inner.older_files.insert(rotated_id, active);
            self.set_active_data_file(&mut inner, rotated_id + 1)?;

            let mut ids: Vec<u32> = inner.older_files.keys().copied().collect();
            ids.sort_unstable();
            (ids, rotated_id + 1)
        };

        tracing::debug!(
            segments = merge_ids.len(),
            watermark = non_merge_file_id,
            "merge started"
        );

        let merge_path = merge_dir_path(&self.options.dir_path);
        if merge_path.exists() {
            std::fs::remove_dir_all(&merge_path)?;
        }
        std::fs::create_dir_all(&merge_path)?;

        // A scratch engine writing into the side directory reuses the
        // normal append/rotation machinery.
        let merge_db = DB::open(Options {
            dir_path: merge_path.clone(),
            data_file_size: self.options.data_file_size,
            sync_writes: false,
            index_type: IndexType::BTree,
        })?;
        let mut hint_file = DataFile::hint_file(&merge_path)?;

        for &file_id in &merge_ids {
            let data_file = DataFile::open(&self.options.dir_path, file_id)?;
            let mut offset = 0u64;
            while let Some((record, size)) = data_file.read_record(offset)? {
                let (real_key, _) = parse_record_key(&record.key)?;
                // Live iff the keydir still points exactly here.
                if let Some(pos) = self.index.get(&real_key)? {
                    if pos.file_id == file_id && pos.offset == offset {
                        // Merge collapses transactions: committed records
                        // are rewritten as plain non-transactional ones.
                        let rewritten = LogRecord {
                            key: record_key_with_seq(&real_key, NON_TXN_SEQ_NO),
                            value: record.value,
                            rec_type: LogRecordType::Normal,
                        };
                        let new_pos = merge_db.append_log_record_with_lock(&rewritten)?;
                        hint_file.write_hint_record(&real_key, new_pos)?;
                    }
                }
                offset += size;
            }
        }

        merge_db.sync()?;
        hint_file.sync()?;
        hint_file.close()?;
        drop(hint_file);
        drop(merge_db);

        // The commit point: a side directory carrying this marker is
        // complete and will be swapped in even after a crash.
        let mut finished_file = DataFile::merge_finished_file(&merge_path)?;
        finished_file.write_record(&LogRecord {
            key: MERGE_FINISHED_KEY.to_vec(),
            value: non_merge_file_id.to_string().into_bytes(),
            rec_type: LogRecordType::Normal,
        })?;
        finished_file.sync()?;
        finished_file.close()?;
        drop(finished_file);

        // Publish: replace the merged segments and repoint the keydir.
        {
            let mut inner = self.inner.write();

            // Old handles must drop before their files are replaced.
            for &file_id in &merge_ids {
                if let Some(file) = inner.older_files.remove(&file_id) {
                    file.close()?;
                }
            }

            let moved_ids = swap_in_merge_files(&merge_path, &self.options.dir_path)?;

            // Segments whose id got no replacement (the merge packed their
            // records into fewer files) are stale; delete them.
            for &file_id in &merge_ids {
                if !moved_ids.contains(&file_id) {
                    let path = DataFile::data_file_path(&self.options.dir_path, file_id);
                    if path.is_file() {
                        std::fs::remove_file(&path)?;
                    }
                }
            }

            for &file_id in &moved_ids {
                let data_file = DataFile::open(&self.options.dir_path, file_id)?;
                inner.older_files.insert(file_id, data_file);
            }

            // Keys still pointing below the watermark moved with the merge;
            // keys at or above it were rewritten during the merge and win.
            let hint = DataFile::hint_file(&self.options.dir_path)?;
            let mut offset = 0u64;
            while let Some((record, size)) = hint.read_record(offset)? {
                let new_pos = datafile::decode_record_pos(&record.value)
                    .ok_or(Error::DataDirectoryCorrupted)?;
                if let Some(current) = self.index.get(&record.key)? {
                    if current.file_id < non_merge_file_id
                        && self.index.put(record.key, new_pos).is_err()
                    {
                        return Err(Error::IndexUpdateFailed);
                    }
                }
                offset += size;
            }
        }

        let _ = std::fs::remove_dir_all(&merge_path);
        tracing::debug!("merge finished");
        Ok(())
    }

    /// Fast-path index load: replays the hint file left by the last merge,
    /// so the segments it covers never need a full scan.
    pub(crate) fn load_index_from_hint_file(&self) -> Result<()> {
        let path = self.options.dir_path.join(HINT_FILE_NAME);
        if !path.is_file() {
            return Ok(());
        }

        let hint = DataFile::hint_file(&self.options.dir_path)?;
        let mut offset = 0u64;
        while let Some((record, size)) = hint.read_record(offset)? {
            let pos = datafile::decode_record_pos(&record.value)
                .ok_or(Error::DataDirectoryCorrupted)?;
            if self.index.put(record.key, pos).is_err() {
                return Err(Error::IndexUpdateFailed);
            }
            offset += size;
        }
        Ok(())
    }
}

/// Handles a side directory left behind by a previous process.
///
/// Called by [`DB::open`] before segments are enumerated. A directory
/// without the `merge-finished` marker is garbage from a crashed merge and
/// is discarded; one with the marker is swapped in, completing the merge.
pub(crate) fn load_merge_files(dir: &Path) -> Result<()> {
    let merge_path = merge_dir_path(dir);
    if !merge_path.is_dir() {
        return Ok(());
    }

    if !merge_path.join(MERGE_FINISHED_FILE_NAME).is_file() {
        tracing::warn!(
            path = %merge_path.display(),
            "discarding unfinished merge directory"
        );
        std::fs::remove_dir_all(&merge_path)?;
        return Ok(());
    }

    // Complete the swap the crashed process started. Segments it meant to
    // delete afterwards stay behind: they hold no indexed records, and the
    // next merge collapses them.
    swap_in_merge_files(&merge_path, dir)?;
    std::fs::remove_dir_all(&merge_path)?;
    Ok(())
}

/// Reads the watermark out of the `merge-finished` file in `dir`: the
/// smallest file id that did not take part in the merge.
pub(crate) fn non_merge_file_id(dir: &Path) -> Result<u32> {
    let finished = DataFile::merge_finished_file(dir)?;
    let (record, _) = finished
        .read_record(0)?
        .ok_or(Error::DataDirectoryCorrupted)?;
    std::str::from_utf8(&record.value)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or(Error::DataDirectoryCorrupted)
}

/// Moves the merge artifacts (data segments, hint file, finished marker)
/// from `merge_path` into `dir`. Each rename atomically replaces any stale
/// file of the same name. Returns the ids of the data segments that moved.
///
/// The marker moves last: its presence in the side directory is what makes
/// a half-done swap resumable, so it must not disappear before everything
/// else is in place.
fn swap_in_merge_files(merge_path: &Path, dir: &Path) -> Result<Vec<u32>> {
    let mut moved_ids = Vec::new();
    let mut marker = None;
    for entry in std::fs::read_dir(merge_path)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };

        if let Some(stem) = name.strip_suffix(DATA_FILE_SUFFIX) {
            let file_id = stem
                .parse::<u32>()
                .map_err(|_| Error::DataDirectoryCorrupted)?;
            moved_ids.push(file_id);
        } else if name == MERGE_FINISHED_FILE_NAME {
            marker = Some(entry.path());
            continue;
        } else if name != HINT_FILE_NAME {
            // Scratch-engine leftovers (its seq-no file) stay behind.
            continue;
        }
        std::fs::rename(entry.path(), dir.join(name))?;
    }
    if let Some(marker_path) = marker {
        std::fs::rename(marker_path, dir.join(MERGE_FINISHED_FILE_NAME))?;
    }
    moved_ids.sort_unstable();
    Ok(moved_ids)
}
