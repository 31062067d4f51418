//! Cold-start recovery: segment enumeration and keydir rebuild.
//!
//! Replay walks every segment in ascending file-id order (skipping those
//! already covered by the hint file after a merge) and applies each record
//! to the keydir. Records carrying a transaction sequence are staged until
//! their commit marker appears; batches whose marker never made it to disk
//! are discarded wholesale.

use datafile::{DataFile, LogRecord, LogRecordType, RecordPos, DATA_FILE_SUFFIX, SEQ_NO_FILE_NAME};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::Ordering;

use crate::batch::{parse_record_key, NON_TXN_SEQ_NO};
use crate::{merge, Error, Result, DB};

/// Enumerates the `*.data` files of `dir`, sorted ascending by numeric id.
///
/// # Errors
///
/// [`Error::DataDirectoryCorrupted`] when a `.data` file name does not
/// parse as a number.
pub(crate) fn sorted_data_file_ids(dir: &Path) -> Result<Vec<u32>> {
    let mut file_ids = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(stem) = name.strip_suffix(DATA_FILE_SUFFIX) {
            let file_id = stem
                .parse::<u32>()
                .map_err(|_| Error::DataDirectoryCorrupted)?;
            file_ids.push(file_id);
        }
    }
    file_ids.sort_unstable();
    Ok(file_ids)
}

impl DB {
    /// Rebuilds the keydir by scanning the data files in `file_ids` order.
    ///
    /// Also recovers the transaction sequence counter (the maximum sequence
    /// seen anywhere in the log) and truncates a partial record off the
    /// active file's tail so future appends line up with `write_off`.
    pub(crate) fn load_index_from_data_files(&mut self, file_ids: &[u32]) -> Result<()> {
        if file_ids.is_empty() {
            return Ok(());
        }

        // Segments below the merge watermark were already loaded from the
        // hint file.
        let mut non_merge_file_id = None;
        if self
            .options
            .dir_path
            .join(datafile::MERGE_FINISHED_FILE_NAME)
            .is_file()
        {
            non_merge_file_id = Some(merge::non_merge_file_id(&self.options.dir_path)?);
        }

        let mut inner = self.inner.write();
        let mut staged: HashMap<u64, Vec<(LogRecord, RecordPos)>> = HashMap::new();
        let mut current_seq = NON_TXN_SEQ_NO;

        for (i, &file_id) in file_ids.iter().enumerate() {
            if non_merge_file_id.is_some_and(|watermark| file_id < watermark) {
                continue;
            }
            let is_active = i == file_ids.len() - 1;

            let mut offset = 0u64;
            {
                let data_file = if is_active {
                    inner.active_file.as_ref().ok_or(Error::DataFileNotFound)?
                } else {
                    inner
                        .older_files
                        .get(&file_id)
                        .ok_or(Error::DataFileNotFound)?
                };

                while let Some((mut record, size)) = data_file.read_record(offset)? {
                    let pos = RecordPos { file_id, offset };
                    let (real_key, seq_no) = parse_record_key(&record.key)?;

                    if seq_no == NON_TXN_SEQ_NO {
                        // Non-transactional writes apply immediately.
                        self.update_index(&real_key, record.rec_type, pos)?;
                    } else if record.rec_type == LogRecordType::TxnFinished {
                        // The batch committed: everything staged under this
                        // sequence becomes visible, in insertion order.
                        if let Some(batch) = staged.remove(&seq_no) {
                            for (rec, rec_pos) in batch {
                                self.update_index(&rec.key, rec.rec_type, rec_pos)?;
                            }
                        }
                    } else {
                        record.key = real_key;
                        staged.entry(seq_no).or_default().push((record, pos));
                    }

                    if seq_no > current_seq {
                        current_seq = seq_no;
                    }
                    offset += size;
                }
            }

            if is_active {
                let active = inner.active_file.as_mut().ok_or(Error::DataFileNotFound)?;
                if offset < active.size()? {
                    // Partial record from a crash; drop it so appends land
                    // exactly at write_off.
                    active.truncate(offset)?;
                }
                active.set_write_off(offset);
            }
        }

        if !staged.is_empty() {
            tracing::warn!(
                batches = staged.len(),
                "discarding uncommitted batches found during replay"
            );
        }

        self.seq_no.store(current_seq, Ordering::SeqCst);
        Ok(())
    }

    /// Applies one replayed record to the keydir.
    ///
    /// A tombstone for an already-absent key is not an error: a merge may
    /// have compacted away the put it shadowed.
    pub(crate) fn update_index(
        &self,
        key: &[u8],
        rec_type: LogRecordType,
        pos: RecordPos,
    ) -> Result<()> {
        match rec_type {
            LogRecordType::Normal => {
                if self.index.put(key.to_vec(), pos).is_err() {
                    return Err(Error::IndexUpdateFailed);
                }
            }
            LogRecordType::Deleted => {
                if self.index.delete(key).is_err() {
                    return Err(Error::IndexUpdateFailed);
                }
            }
            LogRecordType::TxnFinished => {}
        }
        Ok(())
    }

    /// Restores the sequence counter from the `seq-no` file.
    ///
    /// The file is deleted after loading: it is appended-to, so a stale
    /// copy left in place would shadow the value the next close writes.
    pub(crate) fn load_seq_no(&mut self) -> Result<()> {
        let path = self.options.dir_path.join(SEQ_NO_FILE_NAME);
        if !path.is_file() {
            return Ok(());
        }

        let seq_file = DataFile::seq_no_file(&self.options.dir_path)?;
        let (record, _) = seq_file
            .read_record(0)?
            .ok_or(Error::DataDirectoryCorrupted)?;
        if record.key != crate::SEQ_NO_KEY {
            return Err(Error::DataDirectoryCorrupted);
        }
        let seq_no = std::str::from_utf8(&record.value)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or(Error::DataDirectoryCorrupted)?;

        self.seq_no.store(seq_no, Ordering::SeqCst);
        self.seq_file_exists = true;
        std::fs::remove_file(&path)?;
        Ok(())
    }
}
