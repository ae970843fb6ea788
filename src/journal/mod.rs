//! Write-Ahead Journal
//!
//! An append-only byte log that is the durability root for
//! [`crate::memtable::Memtable`]. Every write is appended here — and
//! forced to stable storage — before it is applied in memory, so a
//! crash between the two can never lose an acknowledged write.
//!
//! # On-disk layout
//!
//! ```text
//! [key_len: i32 LE][value_len: i32 LE][key bytes][value bytes]
//! [key_len: i32 LE][value_len: i32 LE][key bytes][value bytes]
//! ...
//! ```
//!
//! No header, no footer, no checksum — the journal is truncated to zero
//! length on every successful flush, so it never grows unbounded, and
//! the only recovery concern is a torn write at the tail left by a
//! mid-record crash.
//!
//! # Concurrency
//!
//! All access is serialized through a single [`Mutex`] around the file
//! handle: concurrent [`Journal::append`] calls never interleave their
//! bytes, and [`Journal::truncate`] cannot race a concurrent append.


use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use thiserror::Error;
use tracing::{debug, trace, warn};

const LEN_FIELD_SIZE: usize = 4;
const HEADER_SIZE: usize = LEN_FIELD_SIZE * 2;

/// Errors returned by [`Journal`] operations.
#[derive(Debug, Error)]
pub enum JournalError {
    /// Underlying I/O error (write, sync, seek, or read failure).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A key or value was too large to frame with a signed 32-bit length.
    #[error("record too large to frame: {0}")]
    Invalid(String),

    /// The journal's length framing was malformed before any complete
    /// record could be recovered.
    #[error("corrupt journal: {0}")]
    Corrupt(String),

    /// Internal invariant violation (e.g. a poisoned lock).
    #[error("internal journal error: {0}")]
    Internal(String),
}

/// Append-only, crash-durable record log.
///
/// See the [module-level documentation](self) for the on-disk format
/// and concurrency model.
#[derive(Debug)]
pub struct Journal {
    file: Mutex<File>,
    path: PathBuf,
}

/// Outcome of attempting to read one record from the current file
/// position.
enum RecordRead {
    /// A fully-framed record was read.
    Complete(Vec<u8>, Vec<u8>),
    /// End of journal: either a clean boundary or a torn tail left by a
    /// crash mid-write. Both are treated identically — stop, discard.
    Eof,
    /// The length framing itself decoded to a nonsensical value (e.g. a
    /// negative length). Distinguished from [`RecordRead::Eof`] because
    /// the header bytes were fully present — this is not a truncation.
    Malformed,
}

impl Journal {
    /// Opens (creating if necessary) the journal file at `path` for
    /// appending and replay.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        debug!(path = %path.display(), "journal opened");

        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    /// Appends one `(key, value)` record, durably.
    ///
    /// Returns only after the record's bytes have been written and the
    /// file has been forced to stable storage via `fsync`. Concurrent
    /// callers are serialized; records never interleave.
    pub fn append(&self, key: &[u8], value: &[u8]) -> Result<(), JournalError> {
        let key_len = i32::try_from(key.len())
            .map_err(|_| JournalError::Invalid(format!("key length {} exceeds i32", key.len())))?;
        let value_len = i32::try_from(value.len()).map_err(|_| {
            JournalError::Invalid(format!("value length {} exceeds i32", value.len()))
        })?;

        let mut file = self.lock()?;
        file.write_all(&key_len.to_le_bytes())?;
        file.write_all(&value_len.to_le_bytes())?;
        file.write_all(key)?;
        file.write_all(value)?;
        file.sync_all()?;

        trace!(key_len, value_len, "journal record appended");
        Ok(())
    }

    /// Truncates the journal to zero length, rewinding the write
    /// position. Must only be called after the corresponding flush's
    /// sorted table has been durably written and installed.
    pub fn truncate(&self) -> Result<(), JournalError> {
        let mut file = self.lock()?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.sync_all()?;

        debug!(path = %self.path.display(), "journal truncated");
        Ok(())
    }

    /// Replays every complete record from the start of the journal,
    /// invoking `callback` with each `(key, value)` pair in order.
    ///
    /// A short read at any record boundary — a torn write left by a
    /// crash — ends replay silently; records beyond the last complete
    /// one are discarded. Malformed length framing (a header that is
    /// fully present but decodes to an invalid value) ends replay the
    /// same way *if* at least one record has already been recovered;
    /// otherwise it is reported as [`JournalError::Corrupt`], since
    /// nothing could be recovered at all.
    pub fn replay(&self, mut callback: impl FnMut(Vec<u8>, Vec<u8>)) -> Result<(), JournalError> {
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start(0))?;

        let mut any_complete = false;
        let mut records = 0u64;

        loop {
            match read_one(&mut file)? {
                RecordRead::Complete(key, value) => {
                    callback(key, value);
                    any_complete = true;
                    records += 1;
                }
                RecordRead::Eof => break,
                RecordRead::Malformed => {
                    if any_complete {
                        warn!(
                            path = %self.path.display(),
                            records,
                            "journal tail malformed after recovering prior records; discarding tail"
                        );
                        break;
                    }
                    return Err(JournalError::Corrupt(
                        "malformed length framing before any complete record".into(),
                    ));
                }
            }
        }

        debug!(path = %self.path.display(), records, "journal replay complete");
        Ok(())
    }

    /// Flushes and releases the underlying file handle.
    pub fn close(&self) -> Result<(), JournalError> {
        let file = self.lock()?;
        file.sync_all()?;
        debug!(path = %self.path.display(), "journal closed");
        Ok(())
    }

    /// Path to the journal file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, File>, JournalError> {
        self.file
            .lock()
            .map_err(|_| JournalError::Internal("journal mutex poisoned".into()))
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        if let Ok(file) = self.file.lock()
            && let Err(e) = file.sync_all()
        {
            warn!(path = %self.path.display(), error = %e, "journal sync failed on drop");
        }
    }
}

/// Reads one record starting at the file's current position, advancing
/// it past the record (or to the point where truncation was detected).
fn read_one(file: &mut File) -> io::Result<RecordRead> {
    let mut header = [0u8; HEADER_SIZE];
    if let Some(outcome) = try_read_exact(file, &mut header)? {
        return Ok(outcome);
    }

    let key_len = i32::from_le_bytes(header[0..LEN_FIELD_SIZE].try_into().unwrap());
    let value_len = i32::from_le_bytes(header[LEN_FIELD_SIZE..HEADER_SIZE].try_into().unwrap());
    if key_len < 0 || value_len < 0 {
        return Ok(RecordRead::Malformed);
    }

    let mut key = vec![0u8; key_len as usize];
    if let Some(outcome) = try_read_exact(file, &mut key)? {
        return Ok(outcome);
    }

    let mut value = vec![0u8; value_len as usize];
    if let Some(outcome) = try_read_exact(file, &mut value)? {
        return Ok(outcome);
    }

    Ok(RecordRead::Complete(key, value))
}

/// Reads exactly `buf.len()` bytes, translating a clean or torn EOF
/// into `Some(RecordRead::Eof)` and propagating any other I/O error.
/// Returns `None` when the read fully succeeded.
fn try_read_exact(file: &mut File, buf: &mut [u8]) -> io::Result<Option<RecordRead>> {
    match file.read_exact(buf) {
        Ok(()) => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(Some(RecordRead::Eof)),
        Err(e) => Err(e),
    }
}
