//! User-facing ordered traversal.
//!
//! The façade walks a point-in-time keydir snapshot and materializes values
//! on demand through the engine, so concurrent writes never invalidate an
//! in-flight cursor (they may or may not appear in it).

use keydir::IndexIterator;

use crate::{IteratorOptions, Result, DB};

/// Ordered cursor over the database.
///
/// Created by [`DB::iter`]. `key` and `value` must only be called while
/// [`valid`](Self::valid) returns `true`.
pub struct Iter<'a> {
    db: &'a DB,
    index_iter: IndexIterator,
    options: IteratorOptions,
}

impl DB {
    /// Opens a cursor positioned at the first matching entry.
    pub fn iter(&self, options: IteratorOptions) -> Result<Iter<'_>> {
        let index_iter = self.index.iterator(options.reverse)?;
        let mut iter = Iter {
            db: self,
            index_iter,
            options,
        };
        iter.skip_to_next();
        Ok(iter)
    }
}

impl Iter<'_> {
    /// Repositions before the first (or last, when reverse) entry.
    pub fn rewind(&mut self) {
        self.index_iter.rewind();
        self.skip_to_next();
    }

    /// Positions at the first entry whose key is `>= key` (forward) or
    /// `<= key` (reverse).
    pub fn seek(&mut self, key: &[u8]) {
        self.index_iter.seek(key);
        self.skip_to_next();
    }

    /// Advances to the next matching entry.
    pub fn next(&mut self) {
        self.index_iter.next();
        self.skip_to_next();
    }

    /// Whether the cursor currently points at an entry.
    pub fn valid(&self) -> bool {
        self.index_iter.valid()
    }

    /// Key of the current entry. Panics when the cursor is not valid.
    pub fn key(&self) -> &[u8] {
        self.index_iter.key()
    }

    /// Value of the current entry, read from the log.
    pub fn value(&self) -> Result<Vec<u8>> {
        let pos = self.index_iter.value();
        let inner = self.db.inner.read();
        self.db.read_at(&inner, pos)
    }

    /// Releases the keydir snapshot. The cursor is invalid afterwards.
    pub fn close(&mut self) {
        self.index_iter.close();
    }

    /// Skips entries outside the configured prefix.
    fn skip_to_next(&mut self) {
        if self.options.prefix.is_empty() {
            return;
        }
        while self.index_iter.valid() && !self.index_iter.key().starts_with(&self.options.prefix) {
            self.index_iter.next();
        }
    }
}
