//! Byte-oriented file I/O driver.
//!
//! [`DataFile`](crate::DataFile) consumes the [`FileIo`] capability and never
//! touches the filesystem directly, so the backing can be swapped (buffered
//! files, memory maps, in-memory stubs for tests) without changing the
//! engine.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Positional reads plus appending writes over one on-disk file.
pub trait FileIo: Send + Sync {
    /// Reads up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes actually read; short reads happen only at
    /// end of file.
    fn read(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Appends `buf` to the end of the file, returning the bytes written.
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Flushes written data to durable storage.
    fn sync(&self) -> io::Result<()>;

    /// Current file length in bytes.
    fn size(&self) -> io::Result<u64>;

    /// Shrinks the file to `len` bytes.
    fn truncate(&self, len: u64) -> io::Result<()>;

    /// Releases the handle. Further calls are undefined.
    fn close(&self) -> io::Result<()>;
}

/// Standard-library file implementation of [`FileIo`].
///
/// The file is opened in append mode, so writes always land at the physical
/// end regardless of the read cursor. A mutex serializes the seek+read pairs
/// against each other; it never crosses a syscall boundary unlocked.
pub struct StdFileIo {
    file: Mutex<File>,
}

impl StdFileIo {
    /// Opens (or creates) `path` for reading and appending.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl FileIo for StdFileIo {
    fn read(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.file.lock();
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn sync(&self) -> io::Result<()> {
        self.file.lock().sync_all()
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.file.lock().metadata()?.len())
    }

    fn truncate(&self, len: u64) -> io::Result<()> {
        self.file.lock().set_len(len)
    }

    fn close(&self) -> io::Result<()> {
        // The handle itself is released on drop.
        self.file.lock().flush()
    }
}
