use crate::{IndexType, Options};
use std::fs;
use std::path::Path;

pub fn test_options(dir: &Path) -> Options {
    Options {
        dir_path: dir.to_path_buf(),
        data_file_size: 64 * 1024 * 1024,
        sync_writes: false,
        index_type: IndexType::BTree,
    }
}

pub fn data_file_count(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext == "data")
                .unwrap_or(false)
        })
        .count()
}

/// Total bytes across all `.data` segments in `dir`.
pub fn data_dir_size(dir: &Path) -> u64 {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext == "data")
                .unwrap_or(false)
        })
        .map(|e| e.metadata().map(|m| m.len()).unwrap_or(0))
        .sum()
}
