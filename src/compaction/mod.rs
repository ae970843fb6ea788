//! Compaction
//!
//! A background worker that periodically merges the engine's active
//! sorted tables into one, bounding the number of files a
//! [`crate::engine::Engine::query`] must consult. One cycle:
//!
//! 1. Snapshot the active list under a shared lock; bail if it holds
//!    at most one table.
//! 2. Scan every snapshotted table in parallel into an independent map.
//! 3. Merge the scans oldest-to-newest, so a newer table's value for a
//!    key always overwrites an older one (newest-wins).
//! 4. Write the merged map as a new `compacted_<epoch-nanos>.db` table.
//! 5. Swap it into the active list under an exclusive lock, preserving
//!    any table prepended by a flush that raced the cycle.
//! 6. Schedule the input files for deletion after a grace period, so a
//!    reader holding a pre-swap snapshot can finish an in-flight read.
//!
//! The worker owns nothing but the active list, the storage directory,
//! and its tuning knobs — it has no dependency on the journal or
//! memtable, matching the dependency order in spec.md §2 (the
//! compactor sits above the sorted table but independent of the write
//! path).


use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::sstable::{SortedTable, SortedTableError};

/// Errors from a compaction cycle.
#[derive(Debug, Error)]
pub enum CompactionError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A scan or write against a sorted table failed.
    #[error("sorted table error: {0}")]
    SortedTable(#[from] SortedTableError),

    /// Internal invariant violation (e.g. a poisoned lock, a panicked
    /// scan thread).
    #[error("internal compaction error: {0}")]
    Internal(String),
}

/// Tuning knobs for the background compaction worker.
#[derive(Debug, Clone)]
pub struct CompactionConfig {
    /// How long to wait between compaction cycles.
    pub interval: Duration,
    /// How long to wait after a swap before unlinking superseded
    /// input files, so in-flight readers holding a stale active-list
    /// snapshot can finish.
    pub grace_period: Duration,
    /// Sparse-index stride used when writing the merged table.
    pub index_stride: usize,
    /// Filter sizing for the merged table.
    pub filter_bits_per_key: u64,
    /// Filter hash-probe count for the merged table.
    pub filter_hash_count: u64,
}

/// The engine's active list: sorted-table handles, newest first,
/// shared between [`crate::engine::Engine`] and the background
/// [`Compactor`] behind a single lock.
pub type ActiveList = RwLock<Vec<Arc<SortedTable>>>;

/// A handle to the running background compaction thread.
///
/// Dropping this handle does **not** stop the thread — per spec.md §9,
/// "the compactor is stopped only by process exit" is the baseline
/// behavior; [`Compactor::stop`] is the supplemental, cooperative way
/// to shut it down (used by [`crate::engine::Engine::close`]).
pub struct Compactor {
    shutdown: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Compactor {
    /// Spawns the background worker. `active` is the engine's active
    /// list, shared by reference; `dir` is the storage directory new
    /// compacted tables are written into.
    pub fn spawn(active: Arc<ActiveList>, dir: PathBuf, config: CompactionConfig) -> Self {
        let (shutdown, signal) = channel::bounded(0);

        let handle = thread::Builder::new()
            .name("stratumdb-compactor".into())
            .spawn(move || run_worker(&active, &dir, &config, &signal))
            .expect("failed to spawn compaction worker thread");

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Signals the worker to stop and blocks until it has exited.
    ///
    /// Safe to call even if a cycle is in flight: the worker finishes
    /// its current cycle (compaction is not interruptible mid-cycle,
    /// per spec.md §5's "no cooperative suspension points") before
    /// observing the shutdown signal.
    pub fn stop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_worker(active: &ActiveList, dir: &Path, config: &CompactionConfig, signal: &channel::Receiver<()>) {
    loop {
        match signal.recv_timeout(config.interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                debug!("compaction worker shutting down");
                return;
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Err(e) = run_cycle(active, dir, config) {
                    warn!(error = %e, "compaction cycle failed, will retry next tick");
                }
            }
        }
    }
}

/// Runs one compaction cycle to completion. Exposed at crate-module
/// visibility so tests can drive a cycle synchronously instead of
/// waiting on the timer.
pub(crate) fn run_cycle(
    active: &ActiveList,
    dir: &Path,
    config: &CompactionConfig,
) -> Result<(), CompactionError> {
    let snapshot: Vec<Arc<SortedTable>> = {
        let guard = active
            .read()
            .map_err(|_| CompactionError::Internal("active list lock poisoned".into()))?;
        if guard.len() <= 1 {
            return Ok(());
        }
        guard.clone()
    };
    let old_count = snapshot.len();

    let scanned = scan_in_parallel(&snapshot)?;

    // Newest-wins: iterate the snapshot oldest to newest (it is stored
    // newest-first) so a later table's entry overwrites an earlier one.
    let mut merged: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();
    for table_data in scanned.into_iter().rev() {
        merged.extend(table_data);
    }

    let filename = format!("compacted_{}.db", crate::timestamp::next_nanos());
    let path = dir.join(filename);
    let merged_count = merged.len();
    let new_table = Arc::new(SortedTable::write_with_filter_params(
        &merged,
        &path,
        config.index_stride,
        config.filter_bits_per_key,
        config.filter_hash_count,
    )?);

    let input_paths: Vec<PathBuf> = snapshot.iter().map(|t| t.path().to_path_buf()).collect();

    {
        let mut guard = active
            .write()
            .map_err(|_| CompactionError::Internal("active list lock poisoned".into()))?;
        let new_arrivals = guard.len().saturating_sub(old_count);
        let mut next = Vec::with_capacity(new_arrivals + 1);
        next.extend(guard[..new_arrivals].iter().cloned());
        next.push(new_table);
        *guard = next;
    }

    info!(
        inputs = old_count,
        merged_keys = merged_count,
        path = %path.display(),
        "compaction cycle complete"
    );

    schedule_unlink(input_paths, config.grace_period);
    Ok(())
}

fn scan_in_parallel(
    snapshot: &[Arc<SortedTable>],
) -> Result<Vec<HashMap<Vec<u8>, Vec<u8>>>, CompactionError> {
    crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = snapshot
            .iter()
            .map(|table| scope.spawn(move |_| table.scan()))
            .collect();

        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .map_err(|_| CompactionError::Internal("scan thread panicked".into()))?
                    .map_err(CompactionError::from)
            })
            .collect()
    })
    .map_err(|_| CompactionError::Internal("scan scope panicked".into()))?
}

/// Deletes the superseded input files after `grace_period`, detached
/// from the calling thread so the compaction cycle itself does not
/// block on the wait.
fn schedule_unlink(paths: Vec<PathBuf>, grace_period: Duration) {
    thread::spawn(move || {
        thread::sleep(grace_period);
        for path in &paths {
            if let Err(e) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "failed to unlink superseded sorted table");
            }
        }
        debug!(count = paths.len(), "superseded sorted tables unlinked");
    });
}
