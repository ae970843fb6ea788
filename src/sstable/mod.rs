//! Sorted Table
//!
//! An immutable, on-disk file holding a sorted key/value sequence
//! followed by an approximate-membership [`filter`](crate::filter) and
//! a [`SparseIndex`], closed out by a fixed 16-byte footer. This is the
//! on-disk unit the engine's active list is built from — every table
//! produced by a flush or a compaction cycle is exactly one of these
//! files, and once written it is never modified.
//!
//! # On-disk layout
//!
//! ```text
//! [data: records sorted ascending, journal-identical framing]
//! [filter: see crate::filter]
//! [index: see index::SparseIndex]
//! [footer: filter_len: u64 LE][index_len: u64 LE]
//! ```
//!
//! `data_end = file_size - 16 - filter_len - index_len` must be `>= 0`;
//! violating that is reported as [`SortedTableError::Corrupt`].
//!
//! # Reads
//!
//! The whole file is memory-mapped once on [`SortedTable::open`]; the
//! filter and sparse index are parsed eagerly and cached alongside the
//! mapping, so [`SortedTable::search`]'s filter short-circuit never
//! needs to touch the footer or re-read anything from disk.

pub mod index;

#[cfg(test)]
mod tests;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use thiserror::Error;
use tracing::{debug, trace};

use crate::filter::Filter;
use index::SparseIndex;

const FOOTER_SIZE: u64 = 16;
const LEN_FIELD_SIZE: usize = 4;
const RECORD_HEADER_SIZE: usize = LEN_FIELD_SIZE * 2;

/// Errors returned by [`SortedTable`] operations.
#[derive(Debug, Error)]
pub enum SortedTableError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A key or value was too large to frame with a signed 32-bit length.
    #[error("record too large to frame: {0}")]
    Invalid(String),

    /// The file violates a layout invariant from the module docs.
    #[error("corrupt sorted table: {0}")]
    Corrupt(String),

    /// Internal invariant violation.
    #[error("internal sorted table error: {0}")]
    Internal(String),
}

/// A handle to an immutable, on-disk sorted table.
///
/// Owns its file path, a read-only memory mapping of the whole file,
/// and the filter and sparse index parsed out of it — everything
/// [`SortedTable::search`] needs without further I/O beyond reading
/// the mapped data region.
pub struct SortedTable {
    path: PathBuf,
    mmap: Mmap,
    filter: Filter,
    index: SparseIndex,
    data_end: u64,
}

impl std::fmt::Debug for SortedTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortedTable")
            .field("path", &self.path)
            .field("data_end", &self.data_end)
            .field("index_len", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl SortedTable {
    /// Writes `data` out as a new sorted table at `path` and opens it.
    ///
    /// Keys are sorted ascending; a filter sized for the key count and a
    /// sparse index (every `stride`-th key) are built in the same pass.
    /// The file is written to a temporary sibling path and renamed into
    /// place only after being forced to stable storage, so a crash
    /// mid-write never leaves a partially-written `.db` file visible to
    /// [`crate::engine::Engine::open`]'s directory scan.
    pub fn write(
        data: &HashMap<Vec<u8>, Vec<u8>>,
        path: impl AsRef<Path>,
        stride: usize,
    ) -> Result<Self, SortedTableError> {
        Self::write_with_filter_params(
            data,
            path,
            stride,
            crate::filter::BITS_PER_KEY,
            crate::filter::HASH_COUNT,
        )
    }

    /// As [`SortedTable::write`], but with the filter's `bits_per_key`
    /// and `hash_count` overridden rather than defaulted — see
    /// [`crate::engine::EngineConfig`].
    pub fn write_with_filter_params(
        data: &HashMap<Vec<u8>, Vec<u8>>,
        path: impl AsRef<Path>,
        stride: usize,
        bits_per_key: u64,
        hash_count: u64,
    ) -> Result<Self, SortedTableError> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("db.tmp");
        let stride = stride.max(1);

        let mut keys: Vec<&Vec<u8>> = data.keys().collect();
        keys.sort();

        let mut filter = Filter::for_key_count_with(keys.len(), bits_per_key, hash_count);
        let mut sparse_index = SparseIndex::new();
        let mut body = Vec::new();
        let mut offset: u64 = 0;

        for (i, key) in keys.iter().enumerate() {
            let value = &data[*key];
            filter.add(key);
            if i % stride == 0 {
                sparse_index.push((*key).clone(), offset as i64);
            }

            let key_len = i32::try_from(key.len())
                .map_err(|_| SortedTableError::Invalid(format!("key length {} exceeds i32", key.len())))?;
            let value_len = i32::try_from(value.len()).map_err(|_| {
                SortedTableError::Invalid(format!("value length {} exceeds i32", value.len()))
            })?;

            body.extend_from_slice(&key_len.to_le_bytes());
            body.extend_from_slice(&value_len.to_le_bytes());
            body.extend_from_slice(key);
            body.extend_from_slice(value);
            offset += (RECORD_HEADER_SIZE + key.len() + value.len()) as u64;
        }

        let filter_bytes = filter.encode();
        let index_bytes = sparse_index.encode();

        body.extend_from_slice(&filter_bytes);
        body.extend_from_slice(&index_bytes);
        body.extend_from_slice(&(filter_bytes.len() as u64).to_le_bytes());
        body.extend_from_slice(&(index_bytes.len() as u64).to_le_bytes());

        let file = File::create(&tmp_path)?;
        {
            use std::io::Write;
            let mut writer = io::BufWriter::new(&file);
            writer.write_all(&body)?;
            writer.flush()?;
        }
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, path)?;

        debug!(
            path = %path.display(),
            records = keys.len(),
            data_end = offset,
            "sorted table written"
        );

        Self::open(path)
    }

    /// Opens an existing sorted table, memory-mapping the file and
    /// eagerly loading its filter and sparse index from the trailing
    /// footer (`LoadMetadata`, per the module's on-disk contract).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SortedTableError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        let (filter, index, data_end) = Self::load_metadata(&mmap)?;

        trace!(path = %path.display(), data_end, "sorted table opened");

        Ok(Self {
            path,
            mmap,
            filter,
            index,
            data_end,
        })
    }

    /// Parses the footer, then the filter and index regions it points
    /// to, from a fully memory-mapped file.
    fn load_metadata(mmap: &Mmap) -> Result<(Filter, SparseIndex, u64), SortedTableError> {
        let file_size = mmap.len() as u64;
        if file_size < FOOTER_SIZE {
            return Err(SortedTableError::Corrupt(format!(
                "file too small to contain a footer: {file_size} bytes"
            )));
        }

        let footer_start = (file_size - FOOTER_SIZE) as usize;
        let footer = &mmap[footer_start..];
        let filter_len = u64::from_le_bytes(footer[0..8].try_into().unwrap());
        let index_len = u64::from_le_bytes(footer[8..16].try_into().unwrap());

        let metadata_len = FOOTER_SIZE
            .checked_add(filter_len)
            .and_then(|v| v.checked_add(index_len))
            .ok_or_else(|| SortedTableError::Corrupt("footer lengths overflow".into()))?;
        if metadata_len > file_size {
            return Err(SortedTableError::Corrupt(format!(
                "footer claims {metadata_len} bytes of metadata but file is only {file_size} bytes"
            )));
        }

        let data_end = file_size - metadata_len;
        let filter_start = data_end as usize;
        let filter_end = filter_start + filter_len as usize;
        let index_end = filter_end + index_len as usize;

        let filter = Filter::decode(&mmap[filter_start..filter_end])
            .map_err(|e| SortedTableError::Corrupt(format!("filter: {e}")))?;
        let index = SparseIndex::decode(&mmap[filter_end..index_end])
            .map_err(|e| SortedTableError::Corrupt(format!("sparse index: {e}")))?;

        Ok((filter, index, data_end))
    }

    /// Looks up `key`, consulting the filter first.
    ///
    /// Returns `Ok(None)` both when the filter reports the key absent
    /// (no data-region I/O occurs) and when a sequential scan from the
    /// sparse index's seek point exhausts the data region or passes a
    /// lexicographically greater key without a match.
    pub fn search(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SortedTableError> {
        if !self.filter.contains(key) {
            return Ok(None);
        }

        let start = self.index.seek_offset(key).max(0) as u64;
        let mut pos = start;

        loop {
            if pos >= self.data_end {
                return Ok(None);
            }

            let (record_key, record_value, next_pos) = self.read_record_at(pos)?;

            match record_key.as_slice().cmp(key) {
                Ordering::Equal => return Ok(Some(record_value)),
                Ordering::Greater => return Ok(None),
                Ordering::Less => pos = next_pos,
            }
        }
    }

    /// Reads every record in the data region into a fresh map. Used by
    /// [`crate::compaction`] to merge tables.
    pub fn scan(&self) -> Result<HashMap<Vec<u8>, Vec<u8>>, SortedTableError> {
        let mut out = HashMap::new();
        let mut pos = 0u64;
        while pos < self.data_end {
            let (key, value, next_pos) = self.read_record_at(pos)?;
            out.insert(key, value);
            pos = next_pos;
        }
        Ok(out)
    }

    /// Path to the underlying file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes in the data region.
    pub fn data_len(&self) -> u64 {
        self.data_end
    }

    /// Total size of the file on disk, including filter, index, and footer.
    pub fn file_size(&self) -> u64 {
        self.mmap.len() as u64
    }

    /// Reads one record starting at byte offset `pos`, returning the
    /// key, the value, and the offset immediately past the record.
    fn read_record_at(&self, pos: u64) -> Result<(Vec<u8>, Vec<u8>, u64), SortedTableError> {
        let pos_usize = pos as usize;
        if pos_usize + RECORD_HEADER_SIZE > self.data_end as usize {
            return Err(SortedTableError::Corrupt(format!(
                "record header at offset {pos} extends past data end {}",
                self.data_end
            )));
        }

        let header = &self.mmap[pos_usize..pos_usize + RECORD_HEADER_SIZE];
        let key_len = i32::from_le_bytes(header[0..4].try_into().unwrap());
        let value_len = i32::from_le_bytes(header[4..8].try_into().unwrap());
        if key_len < 0 || value_len < 0 {
            return Err(SortedTableError::Corrupt(format!(
                "negative record length at offset {pos}"
            )));
        }

        let key_start = pos_usize + RECORD_HEADER_SIZE;
        let key_end = key_start + key_len as usize;
        let value_end = key_end + value_len as usize;
        if value_end > self.data_end as usize {
            return Err(SortedTableError::Corrupt(format!(
                "record body at offset {pos} extends past data end {}",
                self.data_end
            )));
        }

        let key = self.mmap[key_start..key_end].to_vec();
        let value = self.mmap[key_end..value_end].to_vec();
        Ok((key, value, value_end as u64))
    }
}
