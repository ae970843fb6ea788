//! Row encoding and key formation for the engine front.
//!
//! A row is an ordered sequence of strings, opaque to the storage tier
//! below [`crate::engine`]; this module only knows how to turn one into
//! the bytes a [`crate::memtable::Memtable`]/[`crate::sstable::SortedTable`]
//! can store, and back, plus how a row's key is formed.

use thiserror::Error;

use crate::encoding::{self, EncodingError};

/// An ordered sequence of column values. The storage tier never
/// interprets these strings; only the engine front and its callers do.
pub type Row = Vec<String>;

/// Errors from row encoding/decoding or key formation.
#[derive(Debug, Error)]
pub enum RowError {
    /// The row or table name failed a structural precondition.
    #[error("invalid row: {0}")]
    Invalid(String),

    /// The row's byte encoding was rejected by the wire format.
    #[error("row encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

/// Serializes `row` as `[u32 count][String]...`, reusing the generic
/// `Vec<T>` wire format from [`crate::encoding`].
pub fn encode_row(row: &Row) -> Result<Vec<u8>, RowError> {
    let mut buf = Vec::new();
    encoding::encode_vec(row, &mut buf)?;
    Ok(buf)
}

/// Parses a row previously produced by [`encode_row`]. Trailing bytes
/// beyond the decoded row are ignored by the caller, not by this
/// function — a stored row occupies exactly one value, with no
/// sibling data appended after it.
pub fn decode_row(bytes: &[u8]) -> Result<Row, RowError> {
    let (row, _consumed) = encoding::decode_vec::<String>(bytes)?;
    Ok(row)
}

/// Validates a table name against the engine front's contract: non-empty,
/// matching `[A-Za-z0-9_]+`.
pub fn validate_table_name(table: &str) -> Result<(), RowError> {
    if table.is_empty() {
        return Err(RowError::Invalid("table name is empty".into()));
    }
    if !table
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        return Err(RowError::Invalid(format!(
            "table name {table:?} does not match [A-Za-z0-9_]+"
        )));
    }
    Ok(())
}

/// Forms the storage key `<table>:<primary-value>` from a table name
/// and a row's first element.
///
/// Fails with [`RowError::Invalid`] if the table name is invalid, or if
/// `row` is empty or its first element is empty, per the engine front's
/// key-formation contract.
pub fn make_key(table: &str, row: &Row) -> Result<Vec<u8>, RowError> {
    let primary = row
        .first()
        .ok_or_else(|| RowError::Invalid("row has no elements".into()))?;
    if primary.is_empty() {
        return Err(RowError::Invalid(
            "row's first element (primary value) is empty".into(),
        ));
    }
    make_key_from_parts(table, primary)
}

/// Forms the storage key for a point lookup, given a table name and the
/// primary value directly (no row in hand, as at `Query` time).
pub fn make_key_for_query(table: &str, primary_value: &str) -> Result<Vec<u8>, RowError> {
    if primary_value.is_empty() {
        return Err(RowError::Invalid("primary value is empty".into()));
    }
    make_key_from_parts(table, primary_value)
}

fn make_key_from_parts(table: &str, primary: &str) -> Result<Vec<u8>, RowError> {
    validate_table_name(table)?;
    let mut key = Vec::with_capacity(table.len() + 1 + primary.len());
    key.extend_from_slice(table.as_bytes());
    key.push(b':');
    key.extend_from_slice(primary.as_bytes());
    Ok(key)
}
