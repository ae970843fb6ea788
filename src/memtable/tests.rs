use super::*;

#[test]
fn put_then_get_round_trips() {
    let table = Memtable::new();
    table.put(b"k1".to_vec(), b"v1".to_vec()).unwrap();

    let (value, present) = table.get(b"k1").unwrap();
    assert!(present);
    assert_eq!(value, b"v1");
}

#[test]
fn get_missing_key_reports_absent() {
    let table = Memtable::new();
    let (value, present) = table.get(b"missing").unwrap();
    assert!(!present);
    assert!(value.is_empty());
}

#[test]
fn overwrite_replaces_value() {
    let table = Memtable::new();
    table.put(b"k".to_vec(), b"v1".to_vec()).unwrap();
    table.put(b"k".to_vec(), b"v2".to_vec()).unwrap();

    let (value, present) = table.get(b"k").unwrap();
    assert!(present);
    assert_eq!(value, b"v2");
    assert_eq!(table.len().unwrap(), 1);
}

#[test]
fn size_accumulates_on_new_key() {
    let table = Memtable::new();
    table.put(b"ab".to_vec(), b"cde".to_vec()).unwrap();
    assert_eq!(table.approximate_size().unwrap(), 2 + 3);

    table.put(b"x".to_vec(), b"y".to_vec()).unwrap();
    assert_eq!(table.approximate_size().unwrap(), 2 + 3 + 1 + 1);
}

#[test]
fn size_adjusts_on_overwrite() {
    let table = Memtable::new();
    table.put(b"k".to_vec(), b"short".to_vec()).unwrap();
    let after_insert = table.approximate_size().unwrap();

    table.put(b"k".to_vec(), b"a much longer value".to_vec()).unwrap();
    let after_overwrite = table.approximate_size().unwrap();

    assert!(after_overwrite > after_insert);
    assert_eq!(
        after_overwrite,
        1 /* key */ + "a much longer value".len()
    );
}

#[test]
fn drain_returns_contents_and_clears_state() {
    let table = Memtable::new();
    table.put(b"a".to_vec(), b"1".to_vec()).unwrap();
    table.put(b"b".to_vec(), b"2".to_vec()).unwrap();

    let (data, size) = table.drain().unwrap();
    assert_eq!(data.len(), 2);
    assert!(size > 0);

    assert!(table.is_empty().unwrap());
    assert_eq!(table.approximate_size().unwrap(), 0);
    let (_, present) = table.get(b"a").unwrap();
    assert!(!present);
}

#[test]
fn drain_on_empty_table_is_a_no_op_result() {
    let table = Memtable::new();
    let (data, size) = table.drain().unwrap();
    assert!(data.is_empty());
    assert_eq!(size, 0);
}

#[test]
fn concurrent_readers_and_single_writer_do_not_corrupt_state() {
    use std::sync::Arc;
    use std::thread;

    let table = Arc::new(Memtable::new());
    for i in 0..100 {
        table
            .put(format!("k{i}").into_bytes(), format!("v{i}").into_bytes())
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..8 {
        let table = Arc::clone(&table);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                let (value, present) = table.get(format!("k{i}").as_bytes()).unwrap();
                if present {
                    assert_eq!(value, format!("v{i}").into_bytes());
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
}
