//! Memory Table
//!
//! The in-memory write buffer of the storage engine. Every insert lands
//! here immediately after its journal record has been durably appended
//! (see [`crate::engine`]); reads consult it before any on-disk sorted
//! table, so it always holds the most recent value for a key.
//!
//! # Concurrency
//!
//! A single [`std::sync::RwLock`] guards both the key/value map and the
//! approximate size accumulator together, so readers never observe a
//! size that is inconsistent with the map contents. [`Memtable::get`]
//! takes a shared lock; [`Memtable::put`] and [`Memtable::drain`] take
//! an exclusive lock.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

/// Errors returned by [`Memtable`] operations.
#[derive(Debug, Error)]
pub enum MemtableError {
    /// Internal invariant violation (e.g. a poisoned lock).
    #[error("internal memtable error: {0}")]
    Internal(String),
}

struct Inner {
    data: HashMap<Vec<u8>, Vec<u8>>,
    size: usize,
}

/// A synchronized key → value mapping accumulating recent writes.
///
/// Tracks an approximate byte size (`sum(len(key) + len(value))` over
/// all entries) so callers can build flush-trigger policies on top of
/// the engine; the engine itself never consults it (flush is always
/// caller- or timer-driven, per [`crate::engine`]).
#[derive(Default)]
pub struct Memtable {
    inner: RwLock<Inner>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            data: HashMap::new(),
            size: 0,
        }
    }
}

impl Memtable {
    /// Creates a new, empty memory table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites `key` with `value`.
    ///
    /// The size accumulator grows by `len(key) + len(value)` for a new
    /// key, or adjusts by `len(value) - len(value_old)` when overwriting
    /// an existing key.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), MemtableError> {
        let mut inner = self.lock_mut()?;
        match inner.data.insert(key.clone(), value) {
            Some(old_value) => {
                let new_len = inner.data[&key].len() as i64;
                inner.size = (inner.size as i64 + new_len - old_value.len() as i64) as usize;
            }
            None => {
                let entry_len = inner.data[&key].len();
                inner.size += key.len() + entry_len;
            }
        }
        Ok(())
    }

    /// Returns `(value, true)` if `key` is present, or `(Vec::new(), false)`
    /// otherwise.
    pub fn get(&self, key: &[u8]) -> Result<(Vec<u8>, bool), MemtableError> {
        let inner = self.lock()?;
        match inner.data.get(key) {
            Some(value) => Ok((value.clone(), true)),
            None => Ok((Vec::new(), false)),
        }
    }

    /// Atomically returns the current contents and size, and clears the
    /// table. Used only by [`crate::engine::Engine::flush`], under the
    /// engine's write lock.
    pub fn drain(&self) -> Result<(HashMap<Vec<u8>, Vec<u8>>, usize), MemtableError> {
        let mut inner = self.lock_mut()?;
        let data = std::mem::take(&mut inner.data);
        let size = inner.size;
        inner.size = 0;
        Ok((data, size))
    }

    /// Approximate in-memory footprint in bytes.
    pub fn approximate_size(&self) -> Result<usize, MemtableError> {
        Ok(self.lock()?.size)
    }

    /// Number of distinct keys currently held.
    pub fn len(&self) -> Result<usize, MemtableError> {
        Ok(self.lock()?.data.len())
    }

    /// Whether the table currently holds no keys.
    pub fn is_empty(&self) -> Result<bool, MemtableError> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, MemtableError> {
        self.inner
            .read()
            .map_err(|_| MemtableError::Internal("memtable lock poisoned".into()))
    }

    fn lock_mut(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, MemtableError> {
        self.inner
            .write()
            .map_err(|_| MemtableError::Internal("memtable lock poisoned".into()))
    }
}
