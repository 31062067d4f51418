//! # datafile — append-only segment files
//!
//! The on-disk layer of the DriftKV storage engine.
//!
//! A data directory holds a series of append-only segment files named
//! `000000000.data`, `000000001.data`, … — exactly one of them (the highest
//! id) accepts appends at any time. Every mutation is a [`LogRecord`]
//! framed by the codec in [`record`]; reads go straight to a byte offset
//! remembered by the in-memory keydir, verify the record's CRC, and return
//! the value.
//!
//! Three bookkeeping files reuse the same record framing under fixed names:
//!
//! | File | Contents |
//! |---|---|
//! | `hint-index` | `(key, encoded position)` records written by merge, so reopening skips full log replay. |
//! | `merge-finished` | Single record whose value is the first file id *not* covered by the last completed merge. |
//! | `seq-no` | Single record holding the last committed transaction sequence number. |
//!
//! ## Example
//!
//! ```rust,no_run
//! use datafile::{encode_log_record, DataFile, LogRecord, LogRecordType};
//!
//! let mut file = DataFile::open(std::path::Path::new("/tmp/db"), 0).unwrap();
//! let record = LogRecord {
//!     key: b"hello".to_vec(),
//!     value: b"world".to_vec(),
//!     rec_type: LogRecordType::Normal,
//! };
//! file.write(&encode_log_record(&record)).unwrap();
//! let (read_back, _len) = file.read_record(0).unwrap().unwrap();
//! assert_eq!(read_back.value, b"world");
//! ```

mod io;
mod record;

pub use io::{FileIo, StdFileIo};
pub use record::{
    decode_record_pos, encode_log_record, encode_record_pos, put_uvarint, put_varint,
    read_uvarint, read_varint, LogRecord, LogRecordType, RecordPos, MAX_HEADER_SIZE,
};

use crc32fast::Hasher as Crc32;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension carried by every numbered segment file.
pub const DATA_FILE_SUFFIX: &str = ".data";
/// Fixed name of the hint file produced by merge.
pub const HINT_FILE_NAME: &str = "hint-index";
/// Fixed name of the merge commit marker.
pub const MERGE_FINISHED_FILE_NAME: &str = "merge-finished";
/// Fixed name of the persisted sequence-number file.
pub const SEQ_NO_FILE_NAME: &str = "seq-no";

/// Errors from segment-file operations.
#[derive(Debug, Error)]
pub enum DataFileError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A record's stored checksum did not match its contents.
    #[error("invalid record crc")]
    InvalidCrc,

    /// A record carried a type byte outside the known set.
    #[error("unknown record type: {0}")]
    UnknownRecordType(u8),
}

/// One append-only file in the data directory.
///
/// `write_off` tracks where the next append lands and is what the engine
/// records into the keydir. Reads never consult it — they are purely
/// positional.
pub struct DataFile {
    file_id: u32,
    write_off: u64,
    io: Box<dyn FileIo>,
}

impl DataFile {
    /// Path of segment `file_id` inside `dir`.
    pub fn data_file_path(dir: &Path, file_id: u32) -> PathBuf {
        dir.join(format!("{:09}{}", file_id, DATA_FILE_SUFFIX))
    }

    /// Opens (or creates) segment `file_id` for read + append.
    ///
    /// The returned handle is positioned at end of file: `write_off` equals
    /// the current file length.
    pub fn open(dir: &Path, file_id: u32) -> Result<Self, DataFileError> {
        Self::open_path(Self::data_file_path(dir, file_id), file_id)
    }

    /// Opens the hint file of `dir`. Hint files use file id 0.
    pub fn hint_file(dir: &Path) -> Result<Self, DataFileError> {
        Self::open_path(dir.join(HINT_FILE_NAME), 0)
    }

    /// Opens the merge-finished marker file of `dir`.
    pub fn merge_finished_file(dir: &Path) -> Result<Self, DataFileError> {
        Self::open_path(dir.join(MERGE_FINISHED_FILE_NAME), 0)
    }

    /// Opens the sequence-number file of `dir`.
    pub fn seq_no_file(dir: &Path) -> Result<Self, DataFileError> {
        Self::open_path(dir.join(SEQ_NO_FILE_NAME), 0)
    }

    fn open_path(path: PathBuf, file_id: u32) -> Result<Self, DataFileError> {
        let io = StdFileIo::open(&path)?;
        let write_off = io.size()?;
        Ok(Self {
            file_id,
            write_off,
            io: Box::new(io),
        })
    }

    pub fn file_id(&self) -> u32 {
        self.file_id
    }

    pub fn write_off(&self) -> u64 {
        self.write_off
    }

    pub fn set_write_off(&mut self, offset: u64) {
        self.write_off = offset;
    }

    /// Current physical length of the file.
    pub fn size(&self) -> Result<u64, DataFileError> {
        Ok(self.io.size()?)
    }

    /// Decodes one record starting at `offset`.
    ///
    /// Returns `Ok(Some((record, len)))` with the total encoded length, so
    /// callers can scan a segment by advancing `offset` by `len`.
    ///
    /// Returns `Ok(None)` at end of file — which includes a truncated tail
    /// record (crash mid-append) and an all-zero header. Returns
    /// [`DataFileError::InvalidCrc`] when the stored checksum does not match.
    pub fn read_record(&self, offset: u64) -> Result<Option<(LogRecord, u64)>, DataFileError> {
        let file_size = self.io.size()?;
        if offset >= file_size {
            return Ok(None);
        }

        // Near the end of the file a full 15-byte header may not exist.
        let header_cap = (MAX_HEADER_SIZE as u64).min(file_size - offset);
        let mut header_buf = vec![0u8; header_cap as usize];
        let n = self.io.read(&mut header_buf, offset)?;
        header_buf.truncate(n);

        let Some((header, header_size)) = record::decode_header(&header_buf) else {
            return Ok(None);
        };
        if header.crc == 0 && header.key_size == 0 && header.value_size == 0 {
            return Ok(None);
        }

        let key_size = header.key_size as u64;
        let value_size = header.value_size as u64;
        let record_size = header_size as u64 + key_size + value_size;
        if offset + record_size > file_size {
            // Partial record at the tail.
            return Ok(None);
        }

        let mut body = vec![0u8; (key_size + value_size) as usize];
        if !body.is_empty() {
            let n = self.io.read(&mut body, offset + header_size as u64)?;
            if (n as u64) < key_size + value_size {
                return Ok(None);
            }
        }

        let mut hasher = Crc32::new();
        hasher.update(&header_buf[4..header_size]);
        hasher.update(&body);
        if hasher.finalize() != header.crc {
            return Err(DataFileError::InvalidCrc);
        }

        let rec_type = LogRecordType::from_u8(header.rec_type)
            .ok_or(DataFileError::UnknownRecordType(header.rec_type))?;
        let value = body.split_off(key_size as usize);

        Ok(Some((
            LogRecord {
                key: body,
                value,
                rec_type,
            },
            record_size,
        )))
    }

    /// Appends raw bytes and advances `write_off` by the count written.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, DataFileError> {
        let n = self.io.write(buf)?;
        self.write_off += n as u64;
        Ok(n)
    }

    /// Encodes and appends `record`, returning its encoded length.
    pub fn write_record(&mut self, record: &LogRecord) -> Result<usize, DataFileError> {
        self.write(&encode_log_record(record))
    }

    /// Appends a hint record: the plain user key with its encoded position
    /// as the value. Used only for hint files.
    pub fn write_hint_record(&mut self, key: &[u8], pos: RecordPos) -> Result<(), DataFileError> {
        let record = LogRecord {
            key: key.to_vec(),
            value: encode_record_pos(pos),
            rec_type: LogRecordType::Normal,
        };
        self.write_record(&record)?;
        Ok(())
    }

    /// Flushes appended data to durable storage.
    pub fn sync(&self) -> Result<(), DataFileError> {
        Ok(self.io.sync()?)
    }

    /// Drops everything past `len`. Used by replay to discard a partial
    /// tail record so later appends line up with `write_off`.
    pub fn truncate(&mut self, len: u64) -> Result<(), DataFileError> {
        self.io.truncate(len)?;
        self.write_off = len;
        Ok(())
    }

    pub fn close(&self) -> Result<(), DataFileError> {
        Ok(self.io.close()?)
    }
}
