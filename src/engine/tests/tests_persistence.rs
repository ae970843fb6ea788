//! Write-read and crash-durability properties (spec §8, properties 1-3, 10;
//! scenario S1).

use tempfile::TempDir;

use super::helpers::{quiescent_config, row, row_versioned};
use crate::engine::Engine;

#[test]
fn write_then_read_returns_the_written_value() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(dir.path(), quiescent_config()).unwrap();

    engine.insert_row("users", &row("7")).unwrap();

    assert_eq!(engine.query("users", "7").unwrap(), Some(row("7")));
}

#[test]
fn overwrite_wins_over_the_original_value() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(dir.path(), quiescent_config()).unwrap();

    engine.insert_row("u", &row_versioned("1", "v1")).unwrap();
    engine.insert_row("u", &row_versioned("1", "v2")).unwrap();

    assert_eq!(engine.query("u", "1").unwrap(), Some(row_versioned("1", "v2")));
}

#[test]
fn missing_key_is_absent_not_an_error() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(dir.path(), quiescent_config()).unwrap();

    engine.insert_row("users", &row("7")).unwrap();

    assert_eq!(engine.query("users", "missing").unwrap(), None);
    assert_eq!(engine.query("nonexistent_table", "7").unwrap(), None);
}

/// S1: a durable write survives a simulated crash (drop the `Engine` handle
/// without flushing) and a fresh `Engine::open` against the same directory.
#[test]
fn s1_durable_write_survives_a_crash_before_flush() {
    let dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(dir.path(), quiescent_config()).unwrap();
        engine
            .insert_row("users", &vec!["7".into(), "Alice".into(), "a@x".into()])
            .unwrap();
        // No flush, no explicit close: simulates a crash right after the
        // journal-durable write returned.
    }

    let engine = Engine::open(dir.path(), quiescent_config()).unwrap();
    assert_eq!(
        engine.query("users", "7").unwrap(),
        Some(vec!["7".to_string(), "Alice".to_string(), "a@x".to_string()])
    );
}

/// Property 10: every prefix of a durable insert sequence survives a
/// restart, in order, with no partial-record admission.
#[test]
fn crash_boundary_preserves_every_prior_complete_write() {
    let dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(dir.path(), quiescent_config()).unwrap();
        for i in 0..50 {
            engine
                .insert_row("users", &row(&i.to_string()))
                .unwrap();
        }
    }

    let engine = Engine::open(dir.path(), quiescent_config()).unwrap();
    for i in 0..50 {
        assert_eq!(
            engine.query("users", &i.to_string()).unwrap(),
            Some(row(&i.to_string())),
            "key {i} missing after restart"
        );
    }
}
