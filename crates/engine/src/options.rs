use keydir::IndexType;
use std::path::PathBuf;

use crate::{Error, Result};

/// Engine configuration, validated at [`DB::open`](crate::DB::open).
#[derive(Debug, Clone)]
pub struct Options {
    /// Directory holding all segment files and metadata.
    pub dir_path: PathBuf,

    /// Maximum bytes per segment before the active file rotates.
    pub data_file_size: u64,

    /// When `true`, every append is followed by an fsync before the write
    /// returns. Slower, but no acknowledged write can be lost to a crash.
    pub sync_writes: bool,

    /// Which keydir backend answers reads.
    pub index_type: IndexType,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dir_path: std::env::temp_dir().join("driftkv"),
            data_file_size: 256 * 1024 * 1024,
            sync_writes: false,
            index_type: IndexType::BTree,
        }
    }
}

/// Per-batch configuration.
#[derive(Debug, Clone)]
pub struct WriteBatchOptions {
    /// Maximum pending records a single commit may carry.
    pub max_batch_size: usize,

    /// Sync the active segment after the commit marker is appended. The
    /// commit also syncs when the engine itself has `sync_writes` set.
    pub sync_on_commit: bool,
}

impl Default for WriteBatchOptions {
    fn default() -> Self {
        Self {
            max_batch_size: 10_000,
            sync_on_commit: true,
        }
    }
}

/// Iterator configuration.
#[derive(Debug, Clone, Default)]
pub struct IteratorOptions {
    /// When non-empty, only keys starting with this prefix are yielded.
    pub prefix: Vec<u8>,

    /// Traverse in descending key order.
    pub reverse: bool,
}

pub(crate) fn check_options(options: &Options) -> Result<()> {
    if options.dir_path.as_os_str().is_empty() {
        return Err(Error::InvalidOptions("dir_path must not be empty"));
    }
    if options.data_file_size == 0 {
        return Err(Error::InvalidOptions("data_file_size must be greater than zero"));
    }
    Ok(())
}
