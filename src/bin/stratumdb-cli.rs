//! A REPL-style command-line demo driving [`stratumdb::engine::Engine`]
//! directly. Not part of the crate's API surface (see the crate's `Non-goals`
//! — no SQL dialect, no wire protocol here); it exists purely so the engine
//! can be exercised end to end from a shell without pulling in the SQL layer
//! that is this engine's intended consumer.
//!
//! ## Commands
//!
//! ```text
//! INSERT <table> <col1> [col2 ...]   Insert a row; col1 is the primary value
//! QUERY <table> <primary-value>      Look up a row
//! FLUSH                              Force the memtable to a new sorted table
//! COMPACT                            Run one compaction cycle synchronously
//! STATS                              Print active table count/bytes, memtable size
//! EXIT / QUIT                        Close the engine and exit
//! ```
//!
//! ## Example
//!
//! ```text
//! $ stratumdb-cli /tmp/demo-db
//! stratumdb opened at /tmp/demo-db
//! > INSERT users 7 Alice a@x
//! OK
//! > QUERY users 7
//! 7,Alice,a@x
//! > FLUSH
//! OK
//! > EXIT
//! bye
//! ```

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use stratumdb::engine::{Engine, EngineConfig};

fn main() -> Result<()> {
    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./stratumdb-data"));

    let mut engine = Engine::open(&dir, EngineConfig::default())
        .with_context(|| format!("opening engine at {}", dir.display()))?;
    println!("stratumdb opened at {}", dir.display());

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    print!("> ");
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        match run_command(&engine, &line) {
            Ok(Some(output)) => println!("{output}"),
            Ok(None) => {}
            Err(e) if e.to_string() == EXIT_SENTINEL => {
                println!("bye");
                break;
            }
            Err(e) => println!("error: {e}"),
        }
        print!("> ");
        stdout.flush()?;
    }

    engine.close().context("closing engine")?;
    Ok(())
}

const EXIT_SENTINEL: &str = "__stratumdb_cli_exit__";

fn run_command(engine: &Engine, line: &str) -> Result<Option<String>> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(None);
    };

    match command.to_ascii_uppercase().as_str() {
        "INSERT" => {
            let table = parts.next().context("INSERT requires a table name")?;
            let row: Vec<String> = parts.map(str::to_string).collect();
            if row.is_empty() {
                bail!("INSERT requires at least a primary value column");
            }
            engine.insert_row(table, &row)?;
            Ok(Some("OK".to_string()))
        }
        "QUERY" => {
            let table = parts.next().context("QUERY requires a table name")?;
            let primary_value = parts.next().context("QUERY requires a primary value")?;
            match engine.query(table, primary_value)? {
                Some(row) => Ok(Some(row.join(","))),
                None => Ok(Some("(nil)".to_string())),
            }
        }
        "FLUSH" => {
            engine.flush()?;
            Ok(Some("OK".to_string()))
        }
        "COMPACT" => {
            engine.compact_now()?;
            Ok(Some("OK".to_string()))
        }
        "STATS" => {
            let stats = engine.stats()?;
            Ok(Some(format!(
                "active_tables={} active_bytes={} memtable_bytes={}",
                stats.active_table_count, stats.active_table_bytes, stats.memtable_size
            )))
        }
        "EXIT" | "QUIT" => bail!(EXIT_SENTINEL),
        other => bail!("unknown command: {other}"),
    }
}
