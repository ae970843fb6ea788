//! Storage Engine
//!
//! Orchestrates the write path (journal then memtable), the flush
//! cycle (memtable → new sorted table, journal truncation), the read
//! path (memtable → active sorted tables, newest first), and recovery
//! (journal replay at startup). This is the engine front described in
//! spec.md §4.5, exposing [`Engine::insert_row`]/[`Engine::query`]/
//! [`Engine::flush`]/[`Engine::close`] to the SQL layer above it.
//!
//! # Storage directory layout
//!
//! ```text
//! <dir>/
//!   wal.log                      journal
//!   sst_<unix-nanos>.db          sorted table produced by flush
//!   compacted_<unix-nanos>.db    sorted table produced by compaction
//! ```
//!
//! # Locking
//!
//! - The journal serializes its own appends/truncates internally.
//! - The memtable serializes its own reads/writes internally.
//! - [`Engine`] adds two locks of its own: `active` (an
//!   [`std::sync::RwLock`] over the ordered, newest-first list of
//!   sorted-table handles, shared with the background
//!   [`crate::compaction::Compactor`]) and `flush_mutex` (serializing
//!   concurrent [`Engine::flush`] calls end to end, since a flush is a
//!   multi-step sequence with an ordering requirement — see
//!   [`Engine::flush`]'s docs — that the memtable's own lock alone
//!   can't express).

#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::compaction::{CompactionConfig, CompactionError, Compactor};
use crate::filter::{BITS_PER_KEY, HASH_COUNT};
use crate::journal::{Journal, JournalError};
use crate::memtable::{Memtable, MemtableError};
use crate::row::{self, Row, RowError};
use crate::sstable::index::DEFAULT_STRIDE;
use crate::sstable::{SortedTable, SortedTableError};

const JOURNAL_FILE_NAME: &str = "wal.log";
const SORTED_TABLE_SUFFIX: &str = ".db";
const FLUSH_PREFIX: &str = "sst_";
const COMPACTED_PREFIX: &str = "compacted_";

/// Errors returned by [`Engine`] operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Error from the write-ahead journal.
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    /// Error from the memory table.
    #[error("memtable error: {0}")]
    Memtable(#[from] MemtableError),

    /// Error from a sorted table read or write.
    #[error("sorted table error: {0}")]
    SortedTable(#[from] SortedTableError),

    /// Error forming or (de)serializing a row.
    #[error("row error: {0}")]
    Row(#[from] RowError),

    /// Error from the background compactor (surfaced only by
    /// [`Engine::compact_now`]; the periodic worker logs and retries
    /// instead of propagating).
    #[error("compaction error: {0}")]
    Compaction(#[from] CompactionError),

    /// Underlying filesystem I/O error not attributable to a specific
    /// lower component (directory creation, directory enumeration).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller-supplied input failed a structural precondition not
    /// already covered by [`RowError::Invalid`] (currently unused
    /// directly, reserved for engine-level validation).
    #[error("invalid input: {0}")]
    Invalid(String),

    /// Internal invariant violation (e.g. a poisoned lock).
    #[error("internal engine error: {0}")]
    Internal(String),
}

/// Configuration for an [`Engine`] instance.
///
/// Every field has a sensible default (see [`Default`]); tests
/// typically shrink `compaction_interval` and the filter parameters to
/// exercise behavior quickly against tiny key sets.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How often the background compactor wakes up to check whether a
    /// cycle is warranted (spec.md §4.6: "periodic timer, configurable
    /// interval").
    pub compaction_interval: Duration,

    /// How long a compaction cycle waits before unlinking the sorted
    /// tables it just replaced (spec.md §4.6 step 7, §5 "delayed
    /// unlink").
    pub compaction_grace_period: Duration,

    /// Every `index_stride`-th key in a sorted table is recorded into
    /// its sparse index (spec.md §4.3).
    pub index_stride: usize,

    /// Bits allocated per expected key when sizing a sorted table's
    /// filter (spec.md §4.2: `m = 10n` by default).
    pub filter_bits_per_key: u64,

    /// Hash-probe count for a sorted table's filter (spec.md §4.2:
    /// `k = 7` by default).
    pub filter_hash_count: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compaction_interval: Duration::from_secs(30),
            compaction_grace_period: Duration::from_secs(5),
            index_stride: DEFAULT_STRIDE,
            filter_bits_per_key: BITS_PER_KEY,
            filter_hash_count: HASH_COUNT,
        }
    }
}

/// A point-in-time snapshot of engine-level observability counters.
/// Purely informational — nothing in the engine consults these values
/// (spec.md §9: "no size-triggered flush").
#[derive(Debug, Clone, Copy)]
pub struct EngineStats {
    /// Number of sorted tables currently in the active list.
    pub active_table_count: usize,
    /// Sum of the active tables' on-disk file sizes, in bytes.
    pub active_table_bytes: u64,
    /// Approximate in-memory size of the memtable, in bytes.
    pub memtable_size: usize,
}

type ActiveList = RwLock<Vec<Arc<SortedTable>>>;

/// The embedded storage engine.
///
/// Construct with [`Engine::open`]; release resources with
/// [`Engine::close`] (or simply drop it — see the module docs on the
/// compactor's shutdown behavior).
pub struct Engine {
    dir: PathBuf,
    journal: Journal,
    memtable: Memtable,
    active: Arc<ActiveList>,
    flush_mutex: Mutex<()>,
    config: EngineConfig,
    compactor: Compactor,
}

impl Engine {
    /// Opens (or creates) an engine rooted at `dir`.
    ///
    /// 1. Creates `dir` if missing.
    /// 2. Opens the journal and replays it into a fresh memtable before
    ///    any new journal writes can occur.
    /// 3. Enumerates `*.db` files in `dir`; each is opened as a sorted
    ///    table. A file that fails metadata validation is logged and
    ///    skipped (spec.md §4.5 step 4, §7 Corrupt handling) rather
    ///    than failing `open`.
    /// 4. Installs the resulting handles as the active list, ordered
    ///    newest first by the nanosecond-epoch suffix embedded in each
    ///    filename (not a raw lexicographic sort of the full filename —
    ///    see the note on [`table_timestamp`]).
    /// 5. Spawns the background compactor.
    pub fn open(dir: impl AsRef<Path>, config: EngineConfig) -> Result<Self, EngineError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let journal = Journal::open(dir.join(JOURNAL_FILE_NAME))?;
        let memtable = Memtable::new();
        let mut replayed = 0u64;
        journal.replay(|key, value| {
            replayed += 1;
            memtable
                .put(key, value)
                .expect("memtable lock poisoned during journal replay");
        })?;
        info!(records = replayed, dir = %dir.display(), "journal replayed");

        let mut handles = Self::open_sorted_tables(&dir)?;
        handles.sort_by_key(|t| std::cmp::Reverse(table_timestamp(t.path())));

        let active = Arc::new(RwLock::new(handles));
        let compactor = Compactor::spawn(
            Arc::clone(&active),
            dir.clone(),
            CompactionConfig {
                interval: config.compaction_interval,
                grace_period: config.compaction_grace_period,
                index_stride: config.index_stride,
                filter_bits_per_key: config.filter_bits_per_key,
                filter_hash_count: config.filter_hash_count,
            },
        );

        Ok(Self {
            dir,
            journal,
            memtable,
            active,
            flush_mutex: Mutex::new(()),
            config,
            compactor,
        })
    }

    fn open_sorted_tables(dir: &Path) -> Result<Vec<Arc<SortedTable>>, EngineError> {
        let mut handles = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !is_sorted_table_path(&path) {
                continue;
            }
            match SortedTable::open(&path) {
                Ok(table) => handles.push(Arc::new(table)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping corrupt sorted table at startup");
                }
            }
        }
        Ok(handles)
    }

    /// Inserts `row` under the key `<table>:<row[0]>`.
    ///
    /// Fails with [`RowError::Invalid`] (wrapped in
    /// [`EngineError::Row`]) if `table` doesn't match `[A-Za-z0-9_]+`
    /// or `row` is empty or has an empty first element. On journal
    /// failure, the memtable is left untouched.
    pub fn insert_row(&self, table: &str, row: &Row) -> Result<(), EngineError> {
        let key = row::make_key(table, row)?;
        let value = row::encode_row(row)?;

        self.journal.append(&key, &value)?;
        self.memtable.put(key, value)?;
        Ok(())
    }

    /// Looks up the row with the given table and primary value.
    ///
    /// Consults the memtable first, then each active sorted table
    /// newest to oldest. Absence is not an error.
    pub fn query(&self, table: &str, primary_value: &str) -> Result<Option<Row>, EngineError> {
        let key = row::make_key_for_query(table, primary_value)?;

        let (value, present) = self.memtable.get(&key)?;
        if present {
            return Ok(Some(row::decode_row(&value)?));
        }

        let snapshot = {
            let guard = self
                .active
                .read()
                .map_err(|_| EngineError::Internal("active list lock poisoned".into()))?;
            guard.clone()
        };

        for table_handle in snapshot.iter() {
            if let Some(value) = table_handle.search(&key)? {
                return Ok(Some(row::decode_row(&value)?));
            }
        }

        Ok(None)
    }

    /// Flushes the memtable to a new sorted table and truncates the
    /// journal.
    ///
    /// A no-op if the memtable is empty: the active list is unchanged
    /// and no file is created (spec.md §8 property 8).
    ///
    /// Ordering requirement, preserved here: the journal is truncated
    /// only *after* the new sorted table has been durably written and
    /// installed in the active list. A crash between those two steps
    /// leaves the journal intact; the next `Engine::open`'s replay
    /// re-inserts the same records into the memtable, which is
    /// harmless — the memtable wins the read path, and the next flush
    /// simply overwrites the same keys in storage (spec.md §4.5).
    ///
    /// Concurrent `Flush` calls are serialized by `flush_mutex`; this
    /// is a stronger guarantee than spec.md's "memory-table write
    /// lock" literally held end to end, but is equivalent in effect —
    /// once `Memtable::drain` returns, the table is already cleared, so
    /// concurrent `Put`s land in fresh state and are safe for the same
    /// reason a crash mid-flush is (see `DESIGN.md`).
    pub fn flush(&self) -> Result<(), EngineError> {
        let _flush_guard = self
            .flush_mutex
            .lock()
            .map_err(|_| EngineError::Internal("flush mutex poisoned".into()))?;

        if self.memtable.approximate_size()? == 0 {
            return Ok(());
        }

        let (data, size) = self.memtable.drain()?;
        if data.is_empty() {
            return Ok(());
        }

        let filename = format!("{FLUSH_PREFIX}{}.db", crate::timestamp::next_nanos());
        let path = self.dir.join(&filename);
        let table = SortedTable::write_with_filter_params(
            &data,
            &path,
            self.config.index_stride,
            self.config.filter_bits_per_key,
            self.config.filter_hash_count,
        )?;

        {
            let mut active = self
                .active
                .write()
                .map_err(|_| EngineError::Internal("active list lock poisoned".into()))?;
            active.insert(0, Arc::new(table));
        }

        self.journal.truncate()?;

        debug!(records = data.len(), flushed_bytes = size, path = %path.display(), "flush committed");
        Ok(())
    }

    /// Runs one compaction cycle synchronously, bypassing the
    /// background timer. Mainly useful for tests and for callers that
    /// want a compaction to happen now rather than waiting for the
    /// next tick.
    pub fn compact_now(&self) -> Result<(), EngineError> {
        let config = CompactionConfig {
            interval: self.config.compaction_interval,
            grace_period: self.config.compaction_grace_period,
            index_stride: self.config.index_stride,
            filter_bits_per_key: self.config.filter_bits_per_key,
            filter_hash_count: self.config.filter_hash_count,
        };
        crate::compaction::run_cycle(&self.active, &self.dir, &config)?;
        Ok(())
    }

    /// Returns a snapshot of engine-level counters. Pure observability
    /// — nothing in the engine consults these values to drive behavior.
    pub fn stats(&self) -> Result<EngineStats, EngineError> {
        let active = self
            .active
            .read()
            .map_err(|_| EngineError::Internal("active list lock poisoned".into()))?;
        let active_table_bytes = active.iter().map(|t| t.file_size()).sum();

        Ok(EngineStats {
            active_table_count: active.len(),
            active_table_bytes,
            memtable_size: self.memtable.approximate_size()?,
        })
    }

    /// Stops the background compactor (cooperatively, blocking until
    /// its current cycle if any finishes) and closes the journal.
    ///
    /// Not calling `close` is not unsound: the journal's own `Drop`
    /// still syncs and releases its handle, and the compactor thread
    /// simply keeps running until process exit, per spec.md §5 and §9.
    pub fn close(&mut self) -> Result<(), EngineError> {
        self.compactor.stop();
        self.journal.close()?;
        Ok(())
    }
}

fn is_sorted_table_path(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(SORTED_TABLE_SUFFIX) && !n.ends_with(".db.tmp"))
}

/// Extracts the nanosecond-epoch suffix from a sorted table's filename
/// (`sst_<n>.db` or `compacted_<n>.db`), for ordering the active list
/// by true creation time at startup.
///
/// A plain lexicographic sort of the full filename, as a literal
/// reading of spec.md §6 might suggest, is unsound across the two
/// filename prefixes: `"compacted_"` < `"sst_"` byte-for-byte
/// regardless of the embedded timestamp, which would put every
/// compacted table ahead of every flushed one irrespective of actual
/// age. Comparing the parsed suffix instead honors the invariant
/// spec.md §6 is actually after — "filenames are monotone with
/// creation time" — without being fooled by the prefix text. See
/// `DESIGN.md` for this Open Question's resolution.
fn table_timestamp(path: &Path) -> u64 {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(SORTED_TABLE_SUFFIX))
        .and_then(|stem| {
            stem.strip_prefix(FLUSH_PREFIX)
                .or_else(|| stem.strip_prefix(COMPACTED_PREFIX))
        })
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0)
}
