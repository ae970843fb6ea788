use super::*;
use tempfile::TempDir;

fn sample_data(n: usize) -> HashMap<Vec<u8>, Vec<u8>> {
    (0..n)
        .map(|i| (format!("key{i:05}").into_bytes(), format!("value{i}").into_bytes()))
        .collect()
}

#[test]
fn write_then_search_finds_every_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t1.db");
    let data = sample_data(250);
    let table = SortedTable::write(&data, &path, index::DEFAULT_STRIDE).unwrap();

    for (key, value) in &data {
        let found = table.search(key).unwrap();
        assert_eq!(found.as_ref(), Some(value));
    }
}

#[test]
fn search_missing_key_returns_none() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t2.db");
    let data = sample_data(50);
    let table = SortedTable::write(&data, &path, index::DEFAULT_STRIDE).unwrap();

    assert_eq!(table.search(b"not-present-anywhere").unwrap(), None);
}

#[test]
fn empty_table_round_trips_and_always_misses() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.db");
    let data = HashMap::new();
    let table = SortedTable::write(&data, &path, index::DEFAULT_STRIDE).unwrap();

    assert_eq!(table.data_len(), 0);
    assert_eq!(table.search(b"anything").unwrap(), None);
    assert!(table.scan().unwrap().is_empty());
}

#[test]
fn scan_recovers_every_record() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t3.db");
    let data = sample_data(120);
    let table = SortedTable::write(&data, &path, index::DEFAULT_STRIDE).unwrap();

    let scanned = table.scan().unwrap();
    assert_eq!(scanned, data);
}

#[test]
fn reopen_from_disk_preserves_contents() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t4.db");
    let data = sample_data(300);
    {
        SortedTable::write(&data, &path, index::DEFAULT_STRIDE).unwrap();
    }

    let reopened = SortedTable::open(&path).unwrap();
    for (key, value) in &data {
        assert_eq!(reopened.search(key).unwrap().as_ref(), Some(value));
    }
}

#[test]
fn sparse_index_spans_more_than_one_stride() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t5.db");
    let data = sample_data(index::DEFAULT_STRIDE * 3 + 17);
    let table = SortedTable::write(&data, &path, index::DEFAULT_STRIDE).unwrap();

    for (key, value) in &data {
        assert_eq!(table.search(key).unwrap().as_ref(), Some(value));
    }
}

#[test]
fn open_rejects_file_too_small_for_footer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tiny.db");
    fs::write(&path, b"short").unwrap();

    let err = SortedTable::open(&path).unwrap_err();
    assert!(matches!(err, SortedTableError::Corrupt(_)));
}

#[test]
fn open_rejects_footer_claiming_more_than_file_size() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad_footer.db");

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1_000_000u64.to_le_bytes());
    bytes.extend_from_slice(&0u64.to_le_bytes());
    fs::write(&path, &bytes).unwrap();

    let err = SortedTable::open(&path).unwrap_err();
    assert!(matches!(err, SortedTableError::Corrupt(_)));
}

#[test]
fn negative_record_length_in_data_region_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("negative.db");

    let mut body = Vec::new();
    body.extend_from_slice(&(-1i32).to_le_bytes());
    body.extend_from_slice(&0i32.to_le_bytes());
    let data_end = body.len() as u64;

    let filter = Filter::for_key_count(0);
    let filter_bytes = filter.encode();
    let index_bytes = SparseIndex::new().encode();
    body.extend_from_slice(&filter_bytes);
    body.extend_from_slice(&index_bytes);
    body.extend_from_slice(&(filter_bytes.len() as u64).to_le_bytes());
    body.extend_from_slice(&(index_bytes.len() as u64).to_le_bytes());
    fs::write(&path, &body).unwrap();

    let table = SortedTable::open(&path).unwrap();
    assert_eq!(table.data_len(), data_end);
    let err = table.scan().unwrap_err();
    assert!(matches!(err, SortedTableError::Corrupt(_)));
}

#[test]
fn filter_short_circuits_before_touching_data_region() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("filtered.db");
    let mut data = HashMap::new();
    data.insert(b"present".to_vec(), b"value".to_vec());
    let table = SortedTable::write(&data, &path, index::DEFAULT_STRIDE).unwrap();

    // A key the filter almost certainly reports absent never reaches
    // read_record_at, so no Corrupt can surface even if the data region
    // were hand-mangled; this exercises the early return path itself.
    assert_eq!(table.search(b"definitely-not-a-member-xyz").unwrap(), None);
}
