//! # StratumDB
//!
//! An embedded, single-node, crash-durable key-value storage engine
//! built on a **Log-Structured Merge Tree** architecture. Writes are
//! absorbed by an in-memory table backed by a write-ahead journal;
//! periodic flushes emit immutable on-disk sorted tables; a background
//! worker merges accumulated tables to bound read amplification.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                          Engine                           │
//! │  ┌─────────────┐        ┌──────────────────────────────┐  │
//! │  │  Memtable    │        │         Active List          │  │
//! │  │  + Journal   │ flush  │  sorted tables, newest first │  │
//! │  │  (write path)│───────►│  (search newest → oldest)     │  │
//! │  └──────────────┘        └───────────────┬──────────────┘  │
//! │                                           │                 │
//! │                                  ┌────────▼─────────┐       │
//! │                                  │    Compactor      │       │
//! │                                  │ (periodic merge)  │       │
//! │                                  └───────────────────┘       │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scope
//!
//! This crate is a point-lookup key-value engine with a row-shaped
//! value. It deliberately does **not** provide range scans, secondary
//! indexes, multi-key transactions, or deletes — see `DESIGN.md` for
//! the rationale. The engine exposes a typed operation API; a SQL
//! dialect, an HTTP surface, or a multi-table directory abstraction are
//! untrusted clients layered on top, out of scope for this crate.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`engine`] | Orchestrates writes, flush, reads, and recovery |
//! | [`journal`] | Append-only, crash-durable write-ahead log |
//! | [`memtable`] | Synchronized in-memory write buffer |
//! | [`sstable`] | Immutable, on-disk sorted tables with a filter and sparse index |
//! | [`filter`] | Approximate-membership (Bloom-style) filter |
//! | [`compaction`] | Background worker merging sorted tables, newest-wins |
//! | [`row`] | Row encoding and key formation for the engine front |
//! | [`encoding`] | Hand-written, byte-stable wire format for on-disk structures |
//!
//! ## Key properties
//!
//! - **Write-ahead logging** — every insert is durably appended to the
//!   journal, synced, before it lands in the memtable.
//! - **Crash recovery** — `Engine::open` replays the journal before
//!   accepting new writes.
//! - **Bloom-style filter per sorted table** — a point lookup against
//!   a table that provably doesn't hold the key never touches its data
//!   region.
//! - **Sparse index** — bounds the sequential scan a lookup needs after
//!   its binary-search seek.
//! - **Background compaction** — periodically merges the active tables
//!   into one, newest-wins, swapping the result in atomically.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use stratumdb::engine::{Engine, EngineConfig};
//!
//! let mut engine = Engine::open("/tmp/stratumdb-example", EngineConfig::default()).unwrap();
//!
//! engine.insert_row("users", &vec!["7".to_string(), "Alice".to_string(), "a@x".to_string()]).unwrap();
//!
//! let row = engine.query("users", "7").unwrap();
//! assert_eq!(row, Some(vec!["7".to_string(), "Alice".to_string(), "a@x".to_string()]));
//!
//! engine.flush().unwrap();
//! engine.close().unwrap();
//! ```

#![allow(dead_code)]

pub mod compaction;
pub mod encoding;
pub mod engine;
pub mod filter;
pub mod journal;
pub mod memtable;
pub mod row;
pub mod sstable;

mod timestamp;
