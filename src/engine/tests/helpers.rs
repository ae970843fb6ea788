use std::path::Path;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::engine::EngineConfig;
use crate::row::Row;

/// Initializes a tracing subscriber controlled by `RUST_LOG`. Safe to call
/// more than once per process — only the first call takes effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A config whose background compactor never fires on its own — tests that
/// want compaction drive it explicitly via `Engine::compact_now`.
pub fn quiescent_config() -> EngineConfig {
    init_tracing();
    EngineConfig {
        compaction_interval: Duration::from_secs(3600),
        compaction_grace_period: Duration::from_millis(0),
        index_stride: 4,
        ..EngineConfig::default()
    }
}

/// A row with the given primary value and a couple of filler columns.
pub fn row(primary: &str) -> Row {
    vec![primary.to_string(), format!("name-{primary}"), "e".to_string()]
}

/// A row whose non-primary columns are stamped with `suffix`, so tests can
/// tell which write "won" after an overwrite or a compaction.
pub fn row_versioned(primary: &str, suffix: &str) -> Row {
    vec![primary.to_string(), format!("name-{primary}_{suffix}"), "e".to_string()]
}

/// Lists the `*.db` sorted-table files directly in `dir`, sorted by name.
pub fn sorted_table_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".db"))
        .collect();
    names.sort();
    names
}
