//! Record codec for the append-only log.
//!
//! ## Binary Record Format
//!
//! ```text
//! +--------+------+----------+------------+-----+-------+
//! |  crc32 | type | key_size | value_size | key | value |
//! +--------+------+----------+------------+-----+-------+
//!    4B      1B    varint       varint     var    var
//! ```
//!
//! The CRC32 (IEEE) covers everything after itself: the type byte, both
//! size varints, the key, and the value. `key_size` and `value_size` are
//! zigzag-encoded signed varints, so the header is at most
//! `4 + 1 + 5 + 5 = 15` bytes.

use byteorder::{ByteOrder, LittleEndian};
use crc32fast::Hasher as Crc32;

/// Upper bound on the encoded header: crc + type + two 5-byte varints.
pub const MAX_HEADER_SIZE: usize = 15;

/// Discriminates what a log record means to the keydir.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// A live key-value pair.
    Normal = 0,
    /// A tombstone marking the key as deleted.
    Deleted = 1,
    /// Commit marker terminating a write batch.
    TxnFinished = 2,
}

impl LogRecordType {
    pub(crate) fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(LogRecordType::Normal),
            1 => Some(LogRecordType::Deleted),
            2 => Some(LogRecordType::TxnFinished),
            _ => None,
        }
    }
}

/// One entry of the append-only log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub rec_type: LogRecordType,
}

/// Where a record lives on disk: which segment, and at which byte offset.
///
/// Positions are stable for the lifetime of the segment file; they go stale
/// only when a merge deletes the file they point into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPos {
    pub file_id: u32,
    pub offset: u64,
}

/// Parsed fixed part of a record, before key and value bytes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RecordHeader {
    pub(crate) crc: u32,
    pub(crate) rec_type: u8,
    pub(crate) key_size: u32,
    pub(crate) value_size: u32,
}

/// Serializes `record` into its on-disk frame.
///
/// The returned buffer's length is the record's total encoded size.
pub fn encode_log_record(record: &LogRecord) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_HEADER_SIZE + record.key.len() + record.value.len());

    // Reserve the checksum slot; it is filled once the body is complete.
    buf.extend_from_slice(&[0u8; 4]);
    buf.push(record.rec_type as u8);
    put_varint(&mut buf, record.key.len() as i64);
    put_varint(&mut buf, record.value.len() as i64);
    buf.extend_from_slice(&record.key);
    buf.extend_from_slice(&record.value);

    let mut hasher = Crc32::new();
    hasher.update(&buf[4..]);
    let crc = hasher.finalize();
    LittleEndian::write_u32(&mut buf[..4], crc);

    buf
}

/// Parses a record header from the front of `buf`.
///
/// Returns `None` when `buf` is too short to hold a complete header — the
/// caller treats that as end of file (a truncated tail record).
pub(crate) fn decode_header(buf: &[u8]) -> Option<(RecordHeader, usize)> {
    if buf.len() < 5 {
        return None;
    }

    let crc = LittleEndian::read_u32(&buf[..4]);
    let rec_type = buf[4];
    let mut index = 5;

    let (key_size, n) = read_varint(&buf[index..])?;
    index += n;
    let (value_size, n) = read_varint(&buf[index..])?;
    index += n;

    Some((
        RecordHeader {
            crc,
            rec_type,
            key_size: key_size as u32,
            value_size: value_size as u32,
        },
        index,
    ))
}

/// Serializes a [`RecordPos`] as two unsigned varints (`file_id`, `offset`).
///
/// This is the value payload of hint records.
pub fn encode_record_pos(pos: RecordPos) -> Vec<u8> {
    let mut buf = Vec::with_capacity(15);
    put_uvarint(&mut buf, pos.file_id as u64);
    put_uvarint(&mut buf, pos.offset);
    buf
}

/// Inverse of [`encode_record_pos`]. `None` on malformed input.
pub fn decode_record_pos(buf: &[u8]) -> Option<RecordPos> {
    let (file_id, n) = read_uvarint(buf)?;
    let (offset, _) = read_uvarint(&buf[n..])?;
    Some(RecordPos {
        file_id: file_id as u32,
        offset,
    })
}

/// Appends the LEB128 encoding of `v` to `buf`, returning the byte count.
pub fn put_uvarint(buf: &mut Vec<u8>, mut v: u64) -> usize {
    let mut n = 1;
    while v >= 0x80 {
        buf.push((v as u8) | 0x80);
        v >>= 7;
        n += 1;
    }
    buf.push(v as u8);
    n
}

/// Reads a LEB128-encoded integer from the front of `buf`.
///
/// Returns the value and the number of bytes consumed, or `None` when the
/// buffer ends mid-varint or the encoding overflows 64 bits.
pub fn read_uvarint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut x: u64 = 0;
    let mut shift = 0u32;
    for (i, &b) in buf.iter().enumerate() {
        if shift >= 64 {
            return None;
        }
        if b < 0x80 {
            return Some((x | (u64::from(b) << shift), i + 1));
        }
        x |= u64::from(b & 0x7f) << shift;
        shift += 7;
    }
    None
}

/// Zigzag-encoded signed varint append.
pub fn put_varint(buf: &mut Vec<u8>, v: i64) -> usize {
    put_uvarint(buf, ((v << 1) ^ (v >> 63)) as u64)
}

/// Zigzag-encoded signed varint read; `None` on malformed input.
pub fn read_varint(buf: &[u8]) -> Option<(i64, usize)> {
    let (ux, n) = read_uvarint(buf)?;
    let v = ((ux >> 1) as i64) ^ -((ux & 1) as i64);
    Some((v, n))
}
